//! Life-stage agents.

use crate::models::Models;
use crate::space::Space;
use cutworm_core::{
    AgentType, DeathCause, Error, Genotype, Location, Result, Sex, StageDepths, UniqueId,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Eggs laid together by one female
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EggMassState {
    /// Ids of the eggs still attached, sorted
    pub eggs: Vec<UniqueId>,
    pub mass_per_egg: f64,
}

impl EggMassState {
    pub fn biomass(&self) -> f64 {
        self.eggs.len() as f64 * self.mass_per_egg
    }

    /// Number of eggs a feeder requesting `amount` takes from `available`
    /// eggs of mass `mass_per_egg`. Rounds up when enough eggs remain,
    /// otherwise down.
    pub fn eggs_to_remove(
        egg_mass: &UniqueId,
        amount: f64,
        mass_per_egg: f64,
        available: usize,
    ) -> Result<usize> {
        let insufficient = || Error::InsufficientBiomass {
            egg_mass: egg_mass.to_string(),
            requested: amount,
            mass_per_egg,
            available,
        };
        if amount < 0.0 || mass_per_egg <= 0.0 {
            return Err(insufficient());
        }

        // Strip float noise so exact multiples do not round up an extra egg.
        let ratio = ((amount / mass_per_egg) * 1e9).round() / 1e9;
        let ceil = ratio.ceil() as usize;
        let floor = ratio.floor() as usize;
        if ceil <= available {
            Ok(ceil)
        } else if floor <= available {
            Ok(floor)
        } else {
            Err(insufficient())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EggState {
    /// Non-owning link to the egg mass, cleared when the egg leaves it
    pub egg_mass: Option<UniqueId>,
}

/// Food held in a larva's gut, by source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gut {
    pub plant: f64,
    pub egg: f64,
    pub larva: f64,
    pub capacity: f64,
}

impl Gut {
    pub fn total(&self) -> f64 {
        self.plant + self.egg + self.larva
    }

    pub fn room(&self) -> f64 {
        (self.capacity - self.total()).max(0.0)
    }

    pub fn empty(&mut self) -> f64 {
        let eaten = self.total();
        self.plant = 0.0;
        self.egg = 0.0;
        self.larva = 0.0;
        eaten
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LarvaState {
    pub gut: Gut,
    pub full: bool,
    pub starve: bool,
    /// Larva this one attacked during its last forage
    pub target: Option<UniqueId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdultState {
    pub sex: Sex,
    /// Eggs left to lay
    pub num_eggs: u32,
    /// Genotype of the male a female mated with
    pub mate: Option<Genotype>,
    /// Matings a male has performed
    pub matings: u32,
    /// Counter for egg mass ids
    pub next_child: u64,
}

/// Stage-specific state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    EggMass(EggMassState),
    Egg(EggState),
    Larva(LarvaState),
    Pupa,
    Adult(AdultState),
}

/// One insect (or egg mass) in the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: UniqueId,
    pub location: Location,
    pub alive: bool,
    pub mass: f64,
    pub genotype: Genotype,
    pub age: u32,
    pub death_cause: Option<DeathCause>,
    pub stage: Stage,
}

impl Agent {
    fn with_stage(
        id: UniqueId,
        location: Location,
        genotype: Genotype,
        mass: f64,
        stage: Stage,
    ) -> Self {
        Self {
            id,
            location,
            alive: true,
            mass,
            genotype,
            age: 0,
            death_cause: None,
            stage,
        }
    }

    pub fn egg_mass(
        id: UniqueId,
        location: Location,
        genotype: Genotype,
        mass_per_egg: f64,
        mut eggs: Vec<UniqueId>,
    ) -> Self {
        eggs.sort();
        let state = EggMassState { eggs, mass_per_egg };
        let mass = state.biomass();
        Self::with_stage(id, location, genotype, mass, Stage::EggMass(state))
    }

    pub fn egg(
        id: UniqueId,
        location: Location,
        genotype: Genotype,
        mass: f64,
        egg_mass: Option<UniqueId>,
    ) -> Self {
        Self::with_stage(id, location, genotype, mass, Stage::Egg(EggState { egg_mass }))
    }

    pub fn larva(id: UniqueId, location: Location, genotype: Genotype, mass: f64) -> Self {
        Self::with_stage(id, location, genotype, mass, Stage::Larva(LarvaState::default()))
    }

    pub fn pupa(id: UniqueId, location: Location, genotype: Genotype, mass: f64) -> Self {
        Self::with_stage(id, location, genotype, mass, Stage::Pupa)
    }

    pub fn adult(
        id: UniqueId,
        location: Location,
        genotype: Genotype,
        mass: f64,
        sex: Sex,
        num_eggs: u32,
        mate: Option<Genotype>,
    ) -> Self {
        Self::with_stage(
            id,
            location,
            genotype,
            mass,
            Stage::Adult(AdultState {
                sex,
                num_eggs,
                mate,
                matings: 0,
                next_child: 0,
            }),
        )
    }

    pub fn agent_type(&self) -> AgentType {
        match self.stage {
            Stage::EggMass(_) => AgentType::EggMass,
            Stage::Egg(_) => AgentType::Egg,
            Stage::Larva(_) => AgentType::Larva,
            Stage::Pupa => AgentType::Pupa,
            Stage::Adult(_) => AgentType::Adult,
        }
    }

    /// Alive, and for an egg mass still holding eggs
    pub fn is_active(&self) -> bool {
        match &self.stage {
            Stage::EggMass(state) => self.alive && !state.eggs.is_empty(),
            _ => self.alive,
        }
    }

    /// Mark dead; the first recorded cause wins
    pub fn die(&mut self, cause: DeathCause) {
        if self.alive {
            self.alive = false;
            self.death_cause = Some(cause);
        }
    }

    /// Leave the population without dying, e.g. after developing
    pub fn retire(&mut self) {
        self.alive = false;
    }

    pub fn is_female(&self) -> bool {
        matches!(&self.stage, Stage::Adult(state) if state.sex == Sex::Female)
    }

    pub fn is_male(&self) -> bool {
        matches!(&self.stage, Stage::Adult(state) if state.sex == Sex::Male)
    }

    /// The next life stage, keeping this agent's id.
    ///
    /// Adults move to the adult depth; the old agent must be retired by the caller.
    pub fn advanced<R: Rng + ?Sized>(
        &self,
        models: &Models,
        space: &Space,
        depths: StageDepths,
        rng: &mut R,
    ) -> Result<Agent> {
        let mass = models.development.next_mass(self);
        let id = self.id.clone();
        let location = self.location.clone();

        match &self.stage {
            Stage::Egg(_) => Ok(Agent::larva(id, location, self.genotype, mass)),
            Stage::Larva(_) => Ok(Agent::pupa(id, location, self.genotype, mass)),
            Stage::Pupa => {
                let sex = if rng.gen_bool(0.5) {
                    Sex::Female
                } else {
                    Sex::Male
                };
                let location = space.relocate(&location, depths.adult, rng)?;
                let mut adult = Agent::adult(id, location, self.genotype, mass, sex, 0, None);
                if sex == Sex::Female {
                    let fecundity = models.reproduction.fecundity(&adult);
                    if let Stage::Adult(state) = &mut adult.stage {
                        state.num_eggs = fecundity;
                    }
                }
                Ok(adult)
            }
            Stage::EggMass(_) | Stage::Adult(_) => Err(Error::InvalidState(format!(
                "{} {} has no next stage",
                self.agent_type(),
                self.id
            ))),
        }
    }
}
