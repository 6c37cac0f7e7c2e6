//! Simulation engine driving one population run.

use crate::agent::Agent;
use crate::bins::Agents;
use crate::migration::{Emigration, Immigration};
use crate::models::Models;
use crate::schedule::{Schedule, TickContext};
use crate::space::Space;
use cutworm_core::{
    cross, percent_resistant, AgentType, DeathCause, Error, Genotype, PopulationConfig, Result,
    Sex, SimulationConfig, UniqueId,
};
use cutworm_store::Database;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, event, info, instrument, Level};

const EGG_MASS_ROW: usize = 0;
const LARVA_ROW: usize = 1;
const PUPA_ROW: usize = 2;
const ADULT_ROW: usize = 3;
const PREGNANT_ROW: usize = 4;

pub struct Simulation {
    config: SimulationConfig,
    space: Space,
    agents: Agents,
    schedule: Schedule,
    models: Models,
    emigration: Option<Emigration>,
    immigration: Option<Immigration>,
    database: Option<Database>,
    rng: ChaCha8Rng,
    /// Only orders locations and groups, so shuffling never shifts other draws
    shuffle_rng: ChaCha8Rng,
    timestep: u64,
    founders: u64,
}

impl Simulation {
    /// Build a run with the bundled submodels and seed the initial population
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let models = Models::from_config(&config.models)?;
        Self::with_models(config, models)
    }

    pub fn with_models(config: SimulationConfig, models: Models) -> Result<Self> {
        config.validate()?;

        let space = Space::from_config(&config.space)?;
        let schedule = Schedule::new(&config.schedule)?;
        schedule.check_depths(&space)?;
        let agents = Agents::new(&space, &config.environment);

        let emigration = config.emigration.as_ref().map(Emigration::from);
        let immigration = config
            .immigration
            .as_ref()
            .map(Immigration::try_from)
            .transpose()?;
        let database = config.database.as_ref().map(Database::new).transpose()?;

        let mut sim = Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            shuffle_rng: ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1)),
            config,
            space,
            agents,
            schedule,
            models,
            emigration,
            immigration,
            database,
            timestep: 0,
            founders: 0,
        };

        let population = sim.config.population;
        sim.populate(&population)?;
        info!(
            seed = sim.config.seed,
            agents = sim.agents.len(),
            locations = sim.space.locations().len(),
            "Simulation initialized"
        );
        Ok(sim)
    }

    /// Seed founders: rows are egg mass, larva, pupa, adult and pregnant adult,
    /// columns RR, RS, SS
    pub fn populate(&mut self, population: &PopulationConfig) -> Result<()> {
        for genotype in Genotype::ALL {
            for _ in 0..population.count(EGG_MASS_ROW, genotype) {
                self.add_egg_mass(genotype)?;
            }
            for _ in 0..population.count(LARVA_ROW, genotype) {
                let id = self.founder_id(AgentType::Larva);
                let location = self.space.new_location(self.config.depths.juvenile, &mut self.rng)?;
                let mass = self.config.models.development.hatch_mass;
                self.agents.activate(Agent::larva(id, location, genotype, mass))?;
            }
            for _ in 0..population.count(PUPA_ROW, genotype) {
                let id = self.founder_id(AgentType::Pupa);
                let location = self.space.new_location(self.config.depths.juvenile, &mut self.rng)?;
                self.agents
                    .activate(Agent::pupa(id, location, genotype, self.founder_mass()))?;
            }
            for _ in 0..population.count(ADULT_ROW, genotype) {
                let sex = if self.rng.gen_bool(0.5) {
                    Sex::Female
                } else {
                    Sex::Male
                };
                self.add_adult(genotype, sex, None)?;
            }
            for _ in 0..population.count(PREGNANT_ROW, genotype) {
                let mut parents = genotype.parental_pair();
                parents.shuffle(&mut self.rng);
                self.add_adult(parents[0], Sex::Female, Some(parents[1]))?;
            }
        }
        Ok(())
    }

    fn founder_id(&mut self, agent_type: AgentType) -> UniqueId {
        let id = UniqueId::new(format!("{}_{}", agent_type, self.founders));
        self.founders += 1;
        id
    }

    fn founder_mass(&self) -> f64 {
        let development = &self.config.models.development;
        development.larva_min_mass * development.pupa_mass_ratio
    }

    fn add_adult(&mut self, genotype: Genotype, sex: Sex, mate: Option<Genotype>) -> Result<()> {
        let id = self.founder_id(AgentType::Adult);
        let location = self.space.new_location(self.config.depths.adult, &mut self.rng)?;
        let mut adult = Agent::adult(id, location, genotype, self.founder_mass(), sex, 0, mate);
        if sex == Sex::Female {
            let fecundity = self.models.reproduction.fecundity(&adult);
            if let crate::agent::Stage::Adult(state) = &mut adult.stage {
                state.num_eggs = fecundity;
            }
        }
        self.agents.activate(adult)
    }

    /// A founder egg mass whose eggs all carry `genotype`
    fn add_egg_mass(&mut self, genotype: Genotype) -> Result<()> {
        let id = self.founder_id(AgentType::EggMass);
        let location = self.space.new_location(self.config.depths.juvenile, &mut self.rng)?;
        let [mother, father] = genotype.parental_pair();
        let layer = Agent::adult(id.clone(), location.clone(), mother, 0.0, Sex::Female, 0, Some(father));
        let clutch = self.models.reproduction.clutch_size(&layer) as u64;
        let mass_per_egg = self.models.reproduction.mass_per_egg(&layer);

        let eggs: Vec<Agent> = (0..clutch)
            .map(|i| {
                Agent::egg(
                    id.child(i),
                    location.clone(),
                    cross(mother, father, &mut self.rng),
                    mass_per_egg,
                    Some(id.clone()),
                )
            })
            .collect();
        let egg_ids = eggs.iter().map(|egg| egg.id.clone()).collect();

        self.agents
            .activate(Agent::egg_mass(id, location, genotype, mass_per_egg, egg_ids))?;
        for egg in eggs {
            self.agents.activate(egg)?;
        }
        Ok(())
    }

    /// Run the simulation for the configured number of ticks
    #[instrument(skip(self), fields(ticks = self.config.ticks, seed = self.config.seed))]
    pub fn run(&mut self) -> Result<SimulationSummary> {
        info!("Starting simulation for {} ticks", self.config.ticks);

        for _ in 0..self.config.ticks {
            self.step()?;

            if self.config.report_interval > 0 && self.timestep % self.config.report_interval == 0 {
                self.emit_population_gauges();
            }
        }

        let summary = self.summary();
        info!(
            event = "run_summary",
            ticks = summary.tick,
            live = summary.total_live(),
            deaths = summary.deaths.values().sum::<u64>(),
            percent_resistant = summary.percent_resistant(AgentType::Adult),
            "Simulation complete"
        );
        Ok(summary)
    }

    /// Advance one tick
    pub fn step(&mut self) -> Result<()> {
        self.timestep += 1;
        let tick = TickContext {
            seed: self.config.seed,
            tick: self.timestep,
            depths: self.config.depths,
            male_mating_limit: self.config.male_mating_limit,
        };

        self.schedule.perform(
            &self.space,
            &mut self.agents,
            &self.models,
            &tick,
            &mut self.shuffle_rng,
        )?;
        self.agents.age_all();

        if let Some(immigration) = self.immigration.as_mut() {
            immigration.immigration(
                &self.space,
                &mut self.agents,
                &self.models,
                self.config.depths,
                self.timestep,
                &mut self.rng,
            )?;
        }
        if let Some(emigration) = &self.emigration {
            emigration.emigration(&mut self.agents, &mut self.rng)?;
        }

        self.agents.record(self.timestep);

        if let Some(database) = self.database.as_mut() {
            let agents = &self.agents;
            if database.save(self.timestep, || agents.dataframes())?.is_some() {
                self.agents.refresh();
            }
        }

        debug!(tick = self.timestep, agents = self.agents.len(), "Tick complete");
        Ok(())
    }

    fn emit_population_gauges(&self) {
        for agent_type in AgentType::ALL {
            event!(
                Level::INFO,
                gauge_name = "population",
                gauge_value = self.agents.count(agent_type),
                agent_type = %agent_type,
                tick = self.timestep,
                "Population gauge"
            );
        }

        let adults = self.summary().percent_resistant(AgentType::Adult);
        if !adults.is_nan() {
            event!(
                Level::INFO,
                gauge_name = "adult_percent_resistant",
                gauge_value = adults,
                tick = self.timestep,
                "Resistance gauge"
            );
        }
    }

    /// Live counts per type and genotype plus deaths by cause
    pub fn summary(&self) -> SimulationSummary {
        let root = self.agents.bin(&cutworm_core::Location::root());
        let live = AgentType::ALL
            .iter()
            .map(|&agent_type| {
                let counts = Genotype::ALL.map(|genotype| {
                    root.and_then(|bin| bin.bin(agent_type))
                        .map_or(0, |bin| bin.counts().get(genotype))
                });
                (agent_type, counts)
            })
            .collect();

        SimulationSummary {
            tick: self.timestep,
            live,
            deaths: self.agents.deaths().clone(),
        }
    }

    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn agents(&self) -> &Agents {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut Agents {
        &mut self.agents
    }

    pub fn models(&self) -> &Models {
        &self.models
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    /// Add one agent after setup, e.g. a hand-placed founder
    pub fn insert(&mut self, agent: Agent) -> Result<()> {
        if !self.space.contains(&agent.location) {
            return Err(Error::UnknownLocation(agent.location.to_string()));
        }
        self.agents.activate(agent)
    }
}

/// Population state at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub tick: u64,
    /// RR, RS, SS counts per type
    pub live: BTreeMap<AgentType, [u64; 3]>,
    pub deaths: BTreeMap<DeathCause, u64>,
}

impl SimulationSummary {
    pub fn total_live(&self) -> u64 {
        self.live.values().flatten().sum()
    }

    pub fn percent_resistant(&self, agent_type: AgentType) -> f64 {
        match self.live.get(&agent_type) {
            Some(&[rr, rs, ss]) => percent_resistant(rr, rs, ss),
            None => f64::NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutworm_core::{EmigrationConfig, Location};

    fn config(nums: [[u32; 3]; 5]) -> SimulationConfig {
        SimulationConfig {
            seed: 42,
            ticks: 5,
            population: PopulationConfig { nums },
            emigration: None,
            database: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_populate_rows() {
        let sim = Simulation::new(config([
            [1, 0, 0],
            [0, 2, 0],
            [0, 0, 3],
            [4, 0, 0],
            [0, 5, 0],
        ]))
        .unwrap();

        let agents = sim.agents();
        assert_eq!(agents.count(AgentType::EggMass), 1);
        assert_eq!(agents.count(AgentType::Egg), 20);
        assert_eq!(agents.count(AgentType::Larva), 2);
        assert_eq!(agents.count(AgentType::Pupa), 3);
        assert_eq!(agents.count(AgentType::Adult), 9);

        // Pregnant RS rows become homozygous females carrying the other allele.
        let pregnant: Vec<&Agent> = agents
            .agents(AgentType::Adult)
            .into_iter()
            .filter(|adult| match &adult.stage {
                crate::agent::Stage::Adult(state) => state.mate.is_some(),
                _ => false,
            })
            .collect();
        assert_eq!(pregnant.len(), 5);
        for adult in pregnant {
            assert!(adult.is_female());
            assert_ne!(adult.genotype, Genotype::RS);
        }
    }

    #[test]
    fn test_founder_depths() {
        let sim = Simulation::new(config([
            [0, 0, 0],
            [1, 0, 0],
            [0, 0, 0],
            [1, 0, 0],
            [0, 0, 0],
        ]))
        .unwrap();
        for agent in sim.agents().iter() {
            let expected = match agent.agent_type() {
                AgentType::Adult => 2,
                _ => 3,
            };
            assert_eq!(agent.location.depth(), expected);
        }
    }

    #[test]
    fn test_aging_without_schedule() {
        let mut cfg = config([[0; 3], [0; 3], [0; 3], [0; 3], [3, 0, 3]]);
        cfg.schedule = Vec::new();
        let mut sim = Simulation::new(cfg).unwrap();
        for _ in 0..4 {
            sim.step().unwrap();
        }
        assert!(sim.agents().iter().all(|agent| agent.age == 4));
        assert_eq!(sim.summary().live[&AgentType::Adult], [3, 0, 3]);
    }

    #[test]
    fn test_emigration_caps_population() {
        let mut cfg = config([[0; 3], [0; 3], [0; 3], [200, 0, 0], [0; 3]]);
        cfg.schedule = Vec::new();
        cfg.emigration = Some(EmigrationConfig {
            mu: 50.0,
            sigma: 5.0,
            agent_types: vec![AgentType::Adult],
        });
        let mut sim = Simulation::new(cfg).unwrap();
        sim.step().unwrap();

        let adults = sim.agents().count(AgentType::Adult);
        assert!(adults < 80, "{} adults remain", adults);
        assert_eq!(
            sim.summary().deaths[&DeathCause::Emigration],
            200 - adults as u64
        );
    }

    #[test]
    fn test_insert_rejects_unknown_location() {
        let mut sim = Simulation::new(config([[0; 3]; 5])).unwrap();
        let stray = Agent::pupa(UniqueId::new("p"), Location::new(vec![0, 7]), Genotype::SS, 1.0);
        assert!(matches!(sim.insert(stray), Err(Error::UnknownLocation(_))));
    }

    #[test]
    fn test_run_summary() {
        let mut sim = Simulation::new(config([[0; 3], [0; 3], [0; 3], [0; 3], [2, 2, 2]])).unwrap();
        let summary = sim.run().unwrap();
        assert_eq!(summary.tick, 5);
        assert!(summary.total_live() > 0);
    }
}
