//! Deferred effects produced by actions and applied at the step barrier.

use crate::agent::{Agent, Stage};
use crate::bins::Agents;
use cutworm_core::{AgentType, DeathCause, Result, UniqueId};
use tracing::{debug, trace};

/// An effect an action cannot apply to its own agent
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A newly created agent, e.g. an egg mass or its eggs
    Spawn(Agent),
    /// The next life stage of the issuer, which is already retired
    Advance(Agent),
    /// Eat eggs worth `amount` from an egg mass
    FeedOnEggMass {
        issuer: UniqueId,
        egg_mass: UniqueId,
        amount: f64,
    },
    /// Eat a whole larva
    Consume { issuer: UniqueId, prey: UniqueId },
    /// A female chose `male`; the pairing is settled at the barrier
    Mated { issuer: UniqueId, male: UniqueId },
}

/// Commands issued by one agent for one actions group, in issue order
#[derive(Debug, Clone)]
pub struct Batch {
    pub issuer: UniqueId,
    pub group: usize,
    pub commands: Vec<Command>,
}

/// What a barrier changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarrierReport {
    pub activated: usize,
    pub deactivated: usize,
    pub deaths: usize,
}

/// Apply batches in (issuer, group) order, then swap out retired and dead
/// agents for the newly created ones.
pub fn apply(
    agents: &mut Agents,
    mut batches: Vec<Batch>,
    male_mating_limit: Option<u32>,
) -> Result<BarrierReport> {
    batches.sort_by(|a, b| (&a.issuer, a.group).cmp(&(&b.issuer, b.group)));

    let mut pending = Vec::new();
    for batch in batches {
        for command in batch.commands {
            match command {
                Command::Spawn(agent) | Command::Advance(agent) => pending.push(agent),
                Command::FeedOnEggMass {
                    issuer,
                    egg_mass,
                    amount,
                } => feed(agents, &issuer, &egg_mass, amount)?,
                Command::Consume { issuer, prey } => consume(agents, &issuer, &prey),
                Command::Mated { issuer, male } => mated(agents, &issuer, &male, male_mating_limit),
            }
        }
    }

    let removed = agents.sweep()?;
    let deaths = removed.iter().filter(|agent| agent.death_cause.is_some()).count();

    pending.sort_by(|a, b| a.id.cmp(&b.id));
    let activated = pending.len();
    for agent in pending {
        agents.activate(agent)?;
    }

    let report = BarrierReport {
        activated,
        deactivated: removed.len(),
        deaths,
    };
    debug!(
        activated = report.activated,
        deactivated = report.deactivated,
        deaths = report.deaths,
        "Barrier applied"
    );
    Ok(report)
}

/// Feeding is clamped to what is left; another larva may have eaten first.
fn feed(agents: &mut Agents, issuer: &UniqueId, egg_mass: &UniqueId, amount: f64) -> Result<()> {
    if !agents.get(issuer).map_or(false, |agent| agent.alive) {
        return Ok(());
    }
    let available = agents.egg_mass_biomass(egg_mass);
    let amount = amount.min(available);
    if amount <= 0.0 {
        return Ok(());
    }

    let eaten = agents.feed_on_egg_mass(egg_mass, amount)?;
    if let Some(Agent {
        stage: Stage::Larva(larva),
        ..
    }) = agents.get_mut(issuer)
    {
        larva.gut.egg += eaten;
    }
    trace!(%issuer, %egg_mass, eaten, "Fed on egg mass");
    Ok(())
}

fn consume(agents: &mut Agents, issuer: &UniqueId, prey: &UniqueId) {
    let predator_alive = agents.get(issuer).map_or(false, |agent| agent.alive);
    let prey_mass = match agents.get_mut(prey) {
        Some(agent) if predator_alive && agent.alive && agent.agent_type() == AgentType::Larva => {
            agent.die(DeathCause::Cannibalism);
            agent.mass
        }
        _ => return,
    };

    if let Some(Agent {
        stage: Stage::Larva(larva),
        ..
    }) = agents.get_mut(issuer)
    {
        larva.gut.larva += prey_mass;
        larva.target = None;
    }
    trace!(%issuer, %prey, prey_mass, "Consumed larva");
}

/// The female only takes the male's genotype if he is still alive and under
/// his limit once earlier issuers have been applied.
fn mated(agents: &mut Agents, issuer: &UniqueId, male: &UniqueId, limit: Option<u32>) {
    if !agents.get(issuer).map_or(false, |agent| agent.alive) {
        return;
    }
    let genotype = match agents.get_mut(male) {
        Some(agent) if agent.alive => {
            let genotype = agent.genotype;
            let Stage::Adult(state) = &mut agent.stage else {
                return;
            };
            if limit.map_or(false, |limit| state.matings >= limit) {
                return;
            }
            state.matings += 1;
            if limit.map_or(false, |limit| state.matings >= limit) {
                agent.die(DeathCause::Mated);
                trace!(%issuer, %male, "Male retired after mating");
            }
            genotype
        }
        _ => {
            trace!(%issuer, %male, "Mate no longer available");
            return;
        }
    };

    if let Some(Agent {
        stage: Stage::Adult(female),
        ..
    }) = agents.get_mut(issuer)
    {
        female.mate = Some(genotype);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{GridSource, Space};
    use cutworm_core::{EnvironmentConfig, Genotype, GridSpec, LatticeKind, Location, Sex};

    fn agents() -> Agents {
        let space = Space::setup(
            vec![GridSource::Spec(GridSpec::Lattice {
                kind: LatticeKind::Square,
                rows: 1,
                cols: 2,
            })],
            None,
        )
        .unwrap();
        Agents::new(&space, &EnvironmentConfig::default())
    }

    fn mated(female: &str) -> Batch {
        Batch {
            issuer: UniqueId::new(female),
            group: 0,
            commands: vec![Command::Mated {
                issuer: UniqueId::new(female),
                male: UniqueId::new("m"),
            }],
        }
    }

    fn adult(id: &str, sex: Sex, genotype: Genotype) -> Agent {
        Agent::adult(UniqueId::new(id), Location::new(vec![0, 1]), genotype, 1.0, sex, 0, None)
    }

    fn mate_of(agents: &Agents, female: &str) -> Option<Genotype> {
        match agents.get(&UniqueId::new(female)).map(|agent| &agent.stage) {
            Some(Stage::Adult(state)) => state.mate,
            _ => None,
        }
    }

    #[test]
    fn test_male_dies_at_mating_limit() {
        let mut agents = agents();
        for agent in [
            adult("m", Sex::Male, Genotype::RR),
            adult("f1", Sex::Female, Genotype::SS),
            adult("f2", Sex::Female, Genotype::SS),
        ] {
            agents.activate(agent).unwrap();
        }

        let report = apply(&mut agents, vec![mated("f1")], Some(2)).unwrap();
        assert_eq!(report.deaths, 0);
        assert_eq!(mate_of(&agents, "f1"), Some(Genotype::RR));
        assert_eq!(agents.count(AgentType::Adult), 3);

        let report = apply(&mut agents, vec![mated("f2")], Some(2)).unwrap();
        assert_eq!(report.deaths, 1);
        assert_eq!(mate_of(&agents, "f2"), Some(Genotype::RR));
        assert_eq!(agents.count(AgentType::Adult), 2);
        assert_eq!(agents.deaths()[&DeathCause::Mated], 1);
    }

    #[test]
    fn test_spent_male_fathers_one_clutch_per_limit() {
        let mut agents = agents();
        agents.activate(adult("m", Sex::Male, Genotype::RR)).unwrap();
        for female in ["f1", "f2", "f3"] {
            agents.activate(adult(female, Sex::Female, Genotype::SS)).unwrap();
        }

        // Issue order does not matter; the lowest female id wins.
        let batches = vec![mated("f3"), mated("f1"), mated("f2")];
        let report = apply(&mut agents, batches, Some(1)).unwrap();

        assert_eq!(report.deaths, 1);
        assert_eq!(mate_of(&agents, "f1"), Some(Genotype::RR));
        assert_eq!(mate_of(&agents, "f2"), None);
        assert_eq!(mate_of(&agents, "f3"), None);
        assert!(agents.get(&UniqueId::new("m")).is_none());
    }

    #[test]
    fn test_dead_male_does_not_mate() {
        let mut agents = agents();
        agents.activate(adult("m", Sex::Male, Genotype::RR)).unwrap();
        agents.activate(adult("f1", Sex::Female, Genotype::SS)).unwrap();
        agents
            .get_mut(&UniqueId::new("m"))
            .unwrap()
            .die(DeathCause::Survival);

        apply(&mut agents, vec![mated("f1")], None).unwrap();
        assert_eq!(mate_of(&agents, "f1"), None);
        assert_eq!(agents.deaths()[&DeathCause::Survival], 1);
    }

    #[test]
    fn test_spawns_activate_after_sweep() {
        let mut agents = agents();
        let location = Location::new(vec![0, 0]);
        let pupa = Agent::pupa(UniqueId::new("p"), location.clone(), Genotype::SS, 1.0);
        agents.activate(pupa.clone()).unwrap();

        // The pupa retires and its adult form takes over the same id.
        agents.get_mut(&pupa.id).unwrap().retire();
        let adult = Agent::adult(pupa.id.clone(), location, Genotype::SS, 1.0, Sex::Female, 0, None);
        let batch = Batch {
            issuer: pupa.id.clone(),
            group: 0,
            commands: vec![Command::Advance(adult)],
        };

        let report = apply(&mut agents, vec![batch], None).unwrap();
        assert_eq!(report.activated, 1);
        assert_eq!(report.deactivated, 1);
        assert_eq!(report.deaths, 0);
        assert_eq!(agents.count(AgentType::Pupa), 0);
        assert_eq!(agents.count(AgentType::Adult), 1);
    }
}
