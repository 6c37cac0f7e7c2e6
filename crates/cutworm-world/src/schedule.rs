//! Tick schedule: ordered steps of per-type action groups.

use crate::agent::Agent;
use crate::behavior::{perform, ActionContext};
use crate::bins::Agents;
use crate::census::Census;
use crate::command::{self, Batch, BarrierReport};
use crate::models::Models;
use crate::space::Space;
use cutworm_core::{
    AgentType, Behavior, Error, Location, Result, StageDepths, StepConfig, UniqueId,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use tracing::{debug, trace};

/// Behaviors applied, in order, to every agent of one type
#[derive(Debug, Clone, PartialEq)]
pub struct Actions {
    pub agent_type: AgentType,
    pub behaviors: Vec<Behavior>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub actions: Vec<Actions>,
    pub repeat: usize,
    pub shuffle: bool,
    pub parallel_agents: bool,
    pub parallel_locations: bool,
    /// Depth of the locations iterated over
    pub depth: usize,
}

/// Per-tick values every pass needs
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub seed: u64,
    pub tick: u64,
    pub depths: StageDepths,
    pub male_mating_limit: Option<u32>,
}

/// Totals over every barrier of a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub passes: usize,
    pub activated: usize,
    pub deactivated: usize,
    pub deaths: usize,
}

impl ScheduleReport {
    fn add(&mut self, barrier: BarrierReport) {
        self.passes += 1;
        self.activated += barrier.activated;
        self.deactivated += barrier.deactivated;
        self.deaths += barrier.deaths;
    }
}

/// Identifies one repetition of one step
#[derive(Debug, Clone, Copy)]
struct Pass {
    seed: u64,
    tick: u64,
    step: usize,
    repetition: usize,
}

impl Pass {
    /// Randomness for one agent's group of actions, independent of
    /// iteration order and of which worker runs it
    fn agent_rng(&self, group: usize, id: &UniqueId) -> ChaCha8Rng {
        let mut hasher = DefaultHasher::new();
        (self.seed, self.tick, self.step, self.repetition, group, id).hash(&mut hasher);
        ChaCha8Rng::seed_from_u64(hasher.finish())
    }
}

/// Agents of one location moved out of the arena for a pass
struct LocationWork {
    location: Location,
    agents: Vec<Agent>,
}

impl Step {
    pub fn new(config: &StepConfig) -> Result<Self> {
        if config.parallel_agents && config.parallel_locations {
            return Err(Error::Config(
                "a step cannot be parallel over both agents and locations".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for actions in &config.actions {
            if !seen.insert(actions.agent_type) {
                return Err(Error::Config(format!(
                    "{} listed twice in one step",
                    actions.agent_type
                )));
            }
            for &behavior in &actions.behaviors {
                if !actions.agent_type.supports(behavior) {
                    return Err(Error::UnsupportedBehavior {
                        agent_type: actions.agent_type.to_string(),
                        behavior: behavior.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            actions: config
                .actions
                .iter()
                .map(|actions| Actions {
                    agent_type: actions.agent_type,
                    behaviors: actions.behaviors.clone(),
                })
                .collect(),
            repeat: config.repeat,
            shuffle: config.shuffle,
            parallel_agents: config.parallel_agents,
            parallel_locations: config.parallel_locations,
            depth: config.depth,
        })
    }

    fn perform<R: Rng + ?Sized>(
        &self,
        pass: Pass,
        space: &Space,
        agents: &mut Agents,
        models: &Models,
        tick: &TickContext,
        shuffle_rng: &mut R,
    ) -> Result<BarrierReport> {
        let census = Census::take(agents);

        let mut locations = space.keys_at_depth(self.depth)?.to_vec();
        let mut groups: Vec<usize> = (0..self.actions.len()).collect();
        if self.shuffle {
            locations.shuffle(shuffle_rng);
            groups.shuffle(shuffle_rng);
        }

        let types: BTreeSet<AgentType> = self.actions.iter().map(|a| a.agent_type).collect();
        let members: Vec<(Location, Vec<UniqueId>)> = locations
            .into_iter()
            .filter_map(|location| {
                let bin = agents.bin(&location)?;
                let ids: Vec<UniqueId> = types
                    .iter()
                    .flat_map(|&agent_type| bin.members(agent_type).cloned())
                    .collect();
                (!ids.is_empty()).then_some((location, ids))
            })
            .collect();
        let mut works: Vec<LocationWork> = members
            .into_iter()
            .map(|(location, ids)| LocationWork {
                agents: agents.take(&ids),
                location,
            })
            .collect();

        let outcome = {
            let ctx = ActionContext {
                space,
                agents: &*agents,
                census: &census,
                models,
                depths: tick.depths,
            };
            if self.parallel_locations {
                works
                    .par_iter_mut()
                    .map(|work| self.run_location(work, &groups, &ctx, pass))
                    .collect::<Result<Vec<_>>>()
            } else {
                works
                    .iter_mut()
                    .map(|work| self.run_location(work, &groups, &ctx, pass))
                    .collect::<Result<Vec<_>>>()
            }
        };

        agents.restore(works.into_iter().flat_map(|work| work.agents));
        let batches: Vec<Batch> = outcome?.into_iter().flatten().collect();
        command::apply(agents, batches, tick.male_mating_limit)
    }

    fn run_location(
        &self,
        work: &mut LocationWork,
        groups: &[usize],
        ctx: &ActionContext<'_>,
        pass: Pass,
    ) -> Result<Vec<Batch>> {
        let mut batches = Vec::new();

        for &group in groups {
            let actions = &self.actions[group];
            let run = |agent: &mut Agent| -> Result<Batch> {
                let mut rng = pass.agent_rng(group, &agent.id);
                let mut commands = Vec::new();
                for &behavior in &actions.behaviors {
                    commands.extend(perform(agent, behavior, ctx, &mut rng)?);
                }
                Ok(Batch {
                    issuer: agent.id.clone(),
                    group,
                    commands,
                })
            };

            let mut members: Vec<&mut Agent> = work
                .agents
                .iter_mut()
                .filter(|agent| agent.agent_type() == actions.agent_type)
                .collect();
            let group_batches = if self.parallel_agents {
                members
                    .par_iter_mut()
                    .map(|agent| run(&mut **agent))
                    .collect::<Result<Vec<_>>>()?
            } else {
                members
                    .iter_mut()
                    .map(|agent| run(&mut **agent))
                    .collect::<Result<Vec<_>>>()?
            };
            batches.extend(group_batches.into_iter().filter(|batch| !batch.commands.is_empty()));
        }

        trace!(location = %work.location, batches = batches.len(), "Location pass done");
        Ok(batches)
    }
}

/// Ordered steps run once per tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    steps: Vec<Step>,
}

impl Schedule {
    pub fn new(configs: &[StepConfig]) -> Result<Self> {
        let steps = configs.iter().map(Step::new).collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Fail early when a step iterates a depth the space does not have
    pub fn check_depths(&self, space: &Space) -> Result<()> {
        for step in &self.steps {
            space.keys_at_depth(step.depth)?;
        }
        Ok(())
    }

    /// Run every step for one tick, applying commands after each repetition
    pub fn perform<R: Rng + ?Sized>(
        &self,
        space: &Space,
        agents: &mut Agents,
        models: &Models,
        tick: &TickContext,
        shuffle_rng: &mut R,
    ) -> Result<ScheduleReport> {
        let mut report = ScheduleReport::default();

        for (index, step) in self.steps.iter().enumerate() {
            for repetition in 0..step.repeat {
                let pass = Pass {
                    seed: tick.seed,
                    tick: tick.tick,
                    step: index,
                    repetition,
                };
                let barrier = step.perform(pass, space, agents, models, tick, shuffle_rng)?;
                report.add(barrier);
            }
        }

        debug!(
            tick = tick.tick,
            passes = report.passes,
            activated = report.activated,
            deactivated = report.deactivated,
            deaths = report.deaths,
            "Schedule performed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutworm_core::{default_schedule, ActionsConfig};

    fn step(actions: Vec<ActionsConfig>) -> StepConfig {
        StepConfig::new(actions)
    }

    #[test]
    fn test_default_schedule_builds() {
        let schedule = Schedule::new(&default_schedule()).unwrap();
        assert_eq!(schedule.steps().len(), 2);
        assert_eq!(schedule.steps()[1].actions.len(), 4);
    }

    #[test]
    fn test_both_parallel_flags_rejected() {
        let mut config = step(vec![ActionsConfig {
            agent_type: AgentType::Egg,
            behaviors: vec![Behavior::Survive],
        }]);
        config.parallel_agents = true;
        config.parallel_locations = true;
        assert!(matches!(Step::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_unsupported_behavior_rejected() {
        let config = step(vec![ActionsConfig {
            agent_type: AgentType::Pupa,
            behaviors: vec![Behavior::Survive, Behavior::Lay],
        }]);
        match Schedule::new(&[config]) {
            Err(Error::UnsupportedBehavior {
                agent_type,
                behavior,
            }) => {
                assert_eq!(agent_type, "pupa");
                assert_eq!(behavior, "lay");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_agent_type_rejected() {
        let actions = ActionsConfig {
            agent_type: AgentType::Larva,
            behaviors: vec![Behavior::Grow],
        };
        let config = step(vec![actions.clone(), actions]);
        assert!(matches!(Step::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_agent_rng_is_order_free() {
        let pass = Pass {
            seed: 9,
            tick: 4,
            step: 1,
            repetition: 0,
        };
        let id = UniqueId::new("larva_3");
        let a: u64 = pass.agent_rng(0, &id).gen();
        let b: u64 = pass.agent_rng(0, &id).gen();
        let c: u64 = pass.agent_rng(1, &id).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
