//! Density-driven emigration and immigration.

use crate::agent::{Agent, Stage};
use crate::bins::Agents;
use crate::models::Models;
use crate::space::Space;
use cutworm_core::{
    AgentType, DeathCause, EmigrationConfig, Error, Genotype, ImmigrationConfig, Result, Sex,
    StageDepths, UniqueId,
};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::f64::consts::SQRT_2;
use tracing::debug;

/// Body mass given to arriving adults
const IMMIGRANT_MASS: f64 = 1.0;

/// Standard normal cumulative distribution
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + libm::erf(z / SQRT_2))
}

/// Chance one agent leaves when `population` share the pool
pub fn removal_probability(population: usize, mu: f64, sigma: f64) -> f64 {
    normal_cdf((population as f64 - mu) / sigma)
}

/// Which of the pool leave, given one uniform draw per agent.
///
/// The probability is recomputed after every departure.
pub fn emigrants(population: usize, draws: &[f64], mu: f64, sigma: f64) -> Vec<bool> {
    let mut remaining = population;
    draws
        .iter()
        .take(population)
        .map(|&draw| {
            let leaves = draw <= removal_probability(remaining, mu, sigma);
            if leaves {
                remaining -= 1;
            }
            leaves
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Emigration {
    pub mu: f64,
    pub sigma: f64,
    pub agent_types: Vec<AgentType>,
}

impl From<&EmigrationConfig> for Emigration {
    fn from(config: &EmigrationConfig) -> Self {
        Self {
            mu: config.mu,
            sigma: config.sigma,
            agent_types: config.agent_types.clone(),
        }
    }
}

impl Emigration {
    /// Kill emigrants among the tracked types and remove them from their bins.
    /// Returns how many left.
    pub fn emigration<R: Rng + ?Sized>(&self, agents: &mut Agents, rng: &mut R) -> Result<usize> {
        let mut pool: Vec<UniqueId> = self
            .agent_types
            .iter()
            .flat_map(|&agent_type| agents.agents(agent_type))
            .map(|agent| agent.id.clone())
            .collect();
        pool.sort();

        let draws: Vec<f64> = pool.iter().map(|_| rng.gen()).collect();
        let leaving = emigrants(pool.len(), &draws, self.mu, self.sigma);

        let mut departed = 0;
        for (id, leaves) in pool.iter().zip(leaving) {
            if !leaves {
                continue;
            }
            if let Some(agent) = agents.get_mut(id) {
                agent.die(DeathCause::Emigration);
                departed += 1;
            }
        }
        if departed > 0 {
            agents.sweep()?;
            debug!(departed, pool = pool.len(), "Emigration");
        }
        Ok(departed)
    }
}

#[derive(Debug, Clone)]
pub struct Immigration {
    pub mu: f64,
    pub sigma: f64,
    pub agent_type: AgentType,
    pub genotype_weights: [f64; 3],
    pub max_per_tick: usize,
    arrived: u64,
}

impl TryFrom<&ImmigrationConfig> for Immigration {
    type Error = Error;

    fn try_from(config: &ImmigrationConfig) -> Result<Self> {
        if config.agent_type != AgentType::Adult {
            return Err(Error::Config(format!(
                "immigrants must be adults, got {}",
                config.agent_type
            )));
        }
        WeightedIndex::new(config.genotype_weights)
            .map_err(|e| Error::Config(format!("immigrant genotype weights: {}", e)))?;
        Ok(Self {
            mu: config.mu,
            sigma: config.sigma,
            agent_type: config.agent_type,
            genotype_weights: config.genotype_weights,
            max_per_tick: config.max_per_tick,
            arrived: 0,
        })
    }
}

impl Immigration {
    /// Chance another immigrant arrives at the current population
    pub fn arrival_probability(&self, population: usize) -> f64 {
        1.0 - removal_probability(population, self.mu, self.sigma)
    }

    /// Inject adults at random adult-depth locations while draws succeed,
    /// up to `max_per_tick`. Returns how many arrived.
    pub fn immigration<R: Rng + ?Sized>(
        &mut self,
        space: &Space,
        agents: &mut Agents,
        models: &Models,
        depths: StageDepths,
        tick: u64,
        rng: &mut R,
    ) -> Result<usize> {
        let genotypes = WeightedIndex::new(self.genotype_weights)
            .map_err(|e| Error::Config(format!("immigrant genotype weights: {}", e)))?;
        let mut population = agents.count(self.agent_type);
        let mut injected = 0;

        while injected < self.max_per_tick {
            if rng.gen::<f64>() > self.arrival_probability(population) {
                break;
            }

            let genotype = Genotype::ALL[genotypes.sample(rng)];
            let location = space.new_location(depths.adult, rng)?;
            let sex = if rng.gen_bool(0.5) {
                Sex::Female
            } else {
                Sex::Male
            };
            let id = UniqueId::new(format!("immigrant_{}_{}", tick, self.arrived));
            let mut adult = Agent::adult(id, location, genotype, IMMIGRANT_MASS, sex, 0, None);
            if sex == Sex::Female {
                let fecundity = models.reproduction.fecundity(&adult);
                if let Stage::Adult(state) = &mut adult.stage {
                    state.num_eggs = fecundity;
                }
            }

            agents.activate(adult)?;
            self.arrived += 1;
            injected += 1;
            population += 1;
        }

        if injected > 0 {
            debug!(injected, population, "Immigration");
        }
        Ok(injected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!(normal_cdf(-8.0) < 1e-10);
    }

    #[test]
    fn test_self_limiting() {
        // A draw of one half leaves exactly while the pool is at least mu.
        let leaving = emigrants(100, &[0.5; 100], 50.0, 1.0);
        let departed = leaving.iter().filter(|&&l| l).count();
        assert_eq!(departed, 51);
        assert!(leaving[..51].iter().all(|&l| l));
    }

    proptest! {
        #[test]
        fn prop_removal_probability_is_monotone(
            population in 0usize..2000,
            mu in 0.0f64..1000.0,
            sigma in 0.1f64..200.0,
        ) {
            prop_assert!(
                removal_probability(population + 1, mu, sigma)
                    >= removal_probability(population, mu, sigma)
            );
        }

        #[test]
        fn prop_larger_pool_keeps_no_fewer_leaving(
            draws in proptest::collection::vec(0.0f64..1.0, 1..200),
            extra in 1usize..50,
            mu in 0.0f64..200.0,
            sigma in 1.0f64..50.0,
        ) {
            // Same draws for the first agents: a larger starting pool never
            // makes any of them less likely to leave.
            let small = draws.len();
            let mut longer = draws.clone();
            longer.extend(std::iter::repeat(1.0).take(extra));

            let base = emigrants(small, &draws, mu, sigma);
            let crowded = emigrants(small + extra, &longer, mu, sigma);
            let base_left = base.iter().filter(|&&l| l).count();
            let crowded_left = crowded[..small].iter().filter(|&&l| l).count();
            prop_assert!(crowded_left >= base_left);
        }
    }
}
