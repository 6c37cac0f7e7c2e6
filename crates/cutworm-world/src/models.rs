//! Capability submodels and the registry that resolves them once at setup.

use crate::agent::{Agent, Stage};
use crate::environment::Environment;
use cutworm_core::{
    DevelopmentConfig, EncounterConfig, Error, ForageConfig, GrowthConfig, ModelsConfig,
    ReproductionConfig, Result, SurvivalConfig,
};
use std::sync::Arc;
use tracing::debug;

/// Larval mass gain from food eaten
pub trait Growth: Send + Sync {
    fn grow(&self, larva: &Agent, eaten: f64) -> f64;
}

pub trait Development: Send + Sync {
    fn is_developed(&self, agent: &Agent) -> bool;

    /// Mass of the stage `agent` develops into
    fn next_mass(&self, agent: &Agent) -> f64;
}

pub trait Survival: Send + Sync {
    /// Probability of surviving the current tick
    fn survival_probability(&self, agent: &Agent, environment: &Environment) -> f64;
}

pub trait Forage: Send + Sync {
    fn gut_capacity(&self, larva: &Agent) -> f64;

    /// Amount eaten from a source holding `available` when `room` is left in the gut
    fn intake(&self, room: f64, available: f64) -> f64 {
        room.min(available).max(0.0)
    }
}

pub trait Reproduction: Send + Sync {
    fn fecundity(&self, adult: &Agent) -> u32;
    fn clutch_size(&self, adult: &Agent) -> u32;
    fn mass_per_egg(&self, adult: &Agent) -> f64;
}

/// Larva-on-larva attack chance
pub trait Encounter: Send + Sync {
    fn attack_probability(&self, predator_mass: f64, prey_mass: f64) -> f64;
}

/// Mass grows linearly with food eaten
#[derive(Debug, Clone)]
pub struct LinearGrowth {
    pub conversion: f64,
}

impl From<&GrowthConfig> for LinearGrowth {
    fn from(config: &GrowthConfig) -> Self {
        Self {
            conversion: config.conversion,
        }
    }
}

impl Growth for LinearGrowth {
    fn grow(&self, larva: &Agent, eaten: f64) -> f64 {
        larva.mass + self.conversion * eaten
    }
}

/// Stage duration thresholds, larvae also need a minimum mass
#[derive(Debug, Clone)]
pub struct ThresholdDevelopment {
    pub config: DevelopmentConfig,
}

impl Development for ThresholdDevelopment {
    fn is_developed(&self, agent: &Agent) -> bool {
        match &agent.stage {
            Stage::Egg(_) => agent.age >= self.config.egg_ticks,
            Stage::Larva(_) => {
                agent.age >= self.config.larva_ticks && agent.mass >= self.config.larva_min_mass
            }
            Stage::Pupa => agent.age >= self.config.pupa_ticks,
            Stage::EggMass(_) | Stage::Adult(_) => false,
        }
    }

    fn next_mass(&self, agent: &Agent) -> f64 {
        match &agent.stage {
            Stage::Egg(_) => self.config.hatch_mass,
            Stage::Larva(_) => agent.mass * self.config.pupa_mass_ratio,
            _ => agent.mass,
        }
    }
}

/// Constant daily survival per stage, with Bt and starvation penalties for larvae
#[derive(Debug, Clone)]
pub struct StageSurvival {
    pub config: SurvivalConfig,
}

impl Survival for StageSurvival {
    fn survival_probability(&self, agent: &Agent, environment: &Environment) -> f64 {
        match &agent.stage {
            Stage::EggMass(_) => 1.0,
            Stage::Egg(_) => self.config.egg,
            Stage::Pupa => self.config.pupa,
            Stage::Adult(_) => self.config.adult,
            Stage::Larva(larva) => {
                let mut probability = self.config.larva;
                if environment.is_bt() {
                    probability *= 1.0 - self.config.bt_mortality[agent.genotype.index()];
                }
                if larva.starve {
                    probability *= self.config.starvation;
                }
                probability
            }
        }
    }
}

/// Gut capacity proportional to body mass
#[derive(Debug, Clone)]
pub struct GutForage {
    pub gut_ratio: f64,
    pub min_gut: f64,
}

impl From<&ForageConfig> for GutForage {
    fn from(config: &ForageConfig) -> Self {
        Self {
            gut_ratio: config.gut_ratio,
            min_gut: config.min_gut,
        }
    }
}

impl Forage for GutForage {
    fn gut_capacity(&self, larva: &Agent) -> f64 {
        (larva.mass * self.gut_ratio).max(self.min_gut)
    }
}

#[derive(Debug, Clone)]
pub struct FixedReproduction {
    pub config: ReproductionConfig,
}

impl Reproduction for FixedReproduction {
    fn fecundity(&self, _adult: &Agent) -> u32 {
        self.config.fecundity
    }

    fn clutch_size(&self, _adult: &Agent) -> u32 {
        self.config.clutch_size
    }

    fn mass_per_egg(&self, _adult: &Agent) -> f64 {
        self.config.egg_mass
    }
}

/// Attacks only smaller prey, with a fixed probability
#[derive(Debug, Clone)]
pub struct SizeEncounter {
    pub probability: f64,
}

impl From<&EncounterConfig> for SizeEncounter {
    fn from(config: &EncounterConfig) -> Self {
        Self {
            probability: config.probability,
        }
    }
}

impl Encounter for SizeEncounter {
    fn attack_probability(&self, predator_mass: f64, prey_mass: f64) -> f64 {
        if prey_mass < predator_mass {
            self.probability
        } else {
            0.0
        }
    }
}

/// Resolved submodels shared read-only by every action
#[derive(Clone)]
pub struct Models {
    pub growth: Arc<dyn Growth>,
    pub development: Arc<dyn Development>,
    pub survival: Arc<dyn Survival>,
    pub forage: Arc<dyn Forage>,
    pub reproduction: Arc<dyn Reproduction>,
    /// Cannibalism is disabled when absent
    pub encounter: Option<Arc<dyn Encounter>>,
}

impl Models {
    pub fn from_config(config: &ModelsConfig) -> Result<Self> {
        let mut registry = ModelRegistry::new()
            .with_growth(LinearGrowth::from(&config.growth))
            .with_development(ThresholdDevelopment {
                config: config.development.clone(),
            })
            .with_survival(StageSurvival {
                config: config.survival.clone(),
            })
            .with_forage(GutForage::from(&config.forage))
            .with_reproduction(FixedReproduction {
                config: config.reproduction.clone(),
            });
        if let Some(encounter) = &config.encounter {
            registry = registry.with_encounter(SizeEncounter::from(encounter));
        }
        registry.build()
    }
}

impl std::fmt::Debug for Models {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Models")
            .field("encounter", &self.encounter.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder collecting submodels before a run
#[derive(Default)]
pub struct ModelRegistry {
    growth: Option<Arc<dyn Growth>>,
    development: Option<Arc<dyn Development>>,
    survival: Option<Arc<dyn Survival>>,
    forage: Option<Arc<dyn Forage>>,
    reproduction: Option<Arc<dyn Reproduction>>,
    encounter: Option<Arc<dyn Encounter>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_growth(mut self, model: impl Growth + 'static) -> Self {
        self.growth = Some(Arc::new(model));
        self
    }

    pub fn with_development(mut self, model: impl Development + 'static) -> Self {
        self.development = Some(Arc::new(model));
        self
    }

    pub fn with_survival(mut self, model: impl Survival + 'static) -> Self {
        self.survival = Some(Arc::new(model));
        self
    }

    pub fn with_forage(mut self, model: impl Forage + 'static) -> Self {
        self.forage = Some(Arc::new(model));
        self
    }

    pub fn with_reproduction(mut self, model: impl Reproduction + 'static) -> Self {
        self.reproduction = Some(Arc::new(model));
        self
    }

    pub fn with_encounter(mut self, model: impl Encounter + 'static) -> Self {
        self.encounter = Some(Arc::new(model));
        self
    }

    pub fn build(self) -> Result<Models> {
        fn required<T: ?Sized>(model: Option<Arc<T>>, name: &str) -> Result<Arc<T>> {
            model.ok_or_else(|| Error::NotFound(format!("{} model", name)))
        }

        if self.encounter.is_none() {
            debug!("No encounter model registered, larval cannibalism disabled");
        }

        Ok(Models {
            growth: required(self.growth, "growth")?,
            development: required(self.development, "development")?,
            survival: required(self.survival, "survival")?,
            forage: required(self.forage, "forage")?,
            reproduction: required(self.reproduction, "reproduction")?,
            encounter: self.encounter,
        })
    }
}
