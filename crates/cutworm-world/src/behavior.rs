//! Actions an agent performs on itself.
//!
//! An action may mutate only the agent it runs on. Anything touching another
//! agent or the bins is returned as a [`Command`] for the barrier.

use crate::agent::{Agent, Stage};
use crate::bins::Agents;
use crate::census::Census;
use crate::command::Command;
use crate::models::Models;
use crate::space::Space;
use cutworm_core::{cross, Behavior, DeathCause, Error, Result, Sex, StageDepths};
use rand::seq::SliceRandom;
use rand::Rng;

/// Shared read-only state for one pass
pub struct ActionContext<'a> {
    pub space: &'a Space,
    pub agents: &'a Agents,
    pub census: &'a Census,
    pub models: &'a Models,
    pub depths: StageDepths,
}

/// Run one behavior on `agent`; dead agents do nothing
pub fn perform<R: Rng + ?Sized>(
    agent: &mut Agent,
    behavior: Behavior,
    ctx: &ActionContext<'_>,
    rng: &mut R,
) -> Result<Vec<Command>> {
    if !agent.alive {
        return Ok(Vec::new());
    }
    if !agent.agent_type().supports(behavior) {
        return Err(Error::UnsupportedBehavior {
            agent_type: agent.agent_type().to_string(),
            behavior: behavior.to_string(),
        });
    }

    match behavior {
        Behavior::Survive => survive(agent, ctx, rng),
        Behavior::Develop => develop(agent, ctx, rng),
        Behavior::Grow => grow(agent, ctx),
        Behavior::Forage => forage(agent, ctx, rng),
        Behavior::Mate => mate(agent, ctx, rng),
        Behavior::Lay => lay(agent, ctx, rng),
    }
}

fn survive<R: Rng + ?Sized>(
    agent: &mut Agent,
    ctx: &ActionContext<'_>,
    rng: &mut R,
) -> Result<Vec<Command>> {
    let environment = ctx.agents.environment(&agent.location)?;
    let probability = ctx.models.survival.survival_probability(agent, environment);
    if rng.gen::<f64>() >= probability {
        let cause = match &agent.stage {
            Stage::Larva(larva) if larva.starve => DeathCause::Starvation,
            _ => DeathCause::Survival,
        };
        agent.die(cause);
    }
    Ok(Vec::new())
}

fn develop<R: Rng + ?Sized>(
    agent: &mut Agent,
    ctx: &ActionContext<'_>,
    rng: &mut R,
) -> Result<Vec<Command>> {
    if !ctx.models.development.is_developed(agent) {
        return Ok(Vec::new());
    }
    let next = agent.advanced(ctx.models, ctx.space, ctx.depths, rng)?;
    agent.retire();
    Ok(vec![Command::Advance(next)])
}

fn grow(agent: &mut Agent, ctx: &ActionContext<'_>) -> Result<Vec<Command>> {
    let eaten = match &mut agent.stage {
        Stage::Larva(larva) => larva.gut.empty(),
        _ => return Ok(Vec::new()),
    };
    agent.mass = ctx.models.growth.grow(agent, eaten);
    Ok(Vec::new())
}

/// Plants first, then egg masses, then smaller larvae.
///
/// Egg and larva food is credited to the gut at the barrier.
fn forage<R: Rng + ?Sized>(
    agent: &mut Agent,
    ctx: &ActionContext<'_>,
    rng: &mut R,
) -> Result<Vec<Command>> {
    let capacity = ctx.models.forage.gut_capacity(agent);
    let plant_food = ctx.agents.environment(&agent.location)?.food_biomass;
    let id = agent.id.clone();
    let mass = agent.mass;
    let location = agent.location.clone();

    let Stage::Larva(larva) = &mut agent.stage else {
        return Ok(Vec::new());
    };
    larva.gut.capacity = capacity;
    larva.target = None;

    let mut commands = Vec::new();
    let mut room = larva.gut.room();
    let plant = ctx.models.forage.intake(room, plant_food);
    larva.gut.plant += plant;
    room -= plant;
    let mut eaten = plant;

    if room > 0.0 {
        if let Some(egg_mass) = ctx.census.egg_masses(&location).choose(rng) {
            let amount = ctx.models.forage.intake(room, egg_mass.biomass);
            if amount > 0.0 {
                commands.push(Command::FeedOnEggMass {
                    issuer: id.clone(),
                    egg_mass: egg_mass.id.clone(),
                    amount,
                });
                room -= amount;
                eaten += amount;
            }
        }
    }

    if room > 0.0 {
        if let Some(encounter) = &ctx.models.encounter {
            let prey: Vec<_> = ctx
                .census
                .larvae(&location)
                .iter()
                .filter(|prey| prey.id != id)
                .collect();
            if let Some(prey) = prey.choose(rng) {
                let probability = encounter.attack_probability(mass, prey.mass);
                if rng.gen::<f64>() < probability {
                    larva.target = Some(prey.id.clone());
                    commands.push(Command::Consume {
                        issuer: id.clone(),
                        prey: prey.id.clone(),
                    });
                    eaten += prey.mass;
                    room -= prey.mass;
                }
            }
        }
    }

    larva.full = room <= 0.0;
    larva.starve = eaten <= 0.0 && larva.gut.total() <= 0.0;
    Ok(commands)
}

/// A female without a mate picks a random male at her location. The barrier
/// decides whether he can still father her clutch.
fn mate<R: Rng + ?Sized>(
    agent: &mut Agent,
    ctx: &ActionContext<'_>,
    rng: &mut R,
) -> Result<Vec<Command>> {
    let Stage::Adult(adult) = &agent.stage else {
        return Ok(Vec::new());
    };
    if adult.sex != Sex::Female || adult.mate.is_some() {
        return Ok(Vec::new());
    }

    Ok(ctx
        .census
        .males(&agent.location)
        .choose(rng)
        .map(|male| Command::Mated {
            issuer: agent.id.clone(),
            male: male.id.clone(),
        })
        .into_iter()
        .collect())
}

/// A mated female lays one clutch as a new egg mass at a deeper location
fn lay<R: Rng + ?Sized>(
    agent: &mut Agent,
    ctx: &ActionContext<'_>,
    rng: &mut R,
) -> Result<Vec<Command>> {
    let clutch_size = ctx.models.reproduction.clutch_size(agent);
    let mass_per_egg = ctx.models.reproduction.mass_per_egg(agent);
    let genotype = agent.genotype;
    let id = agent.id.clone();
    let location = agent.location.clone();

    let Stage::Adult(adult) = &mut agent.stage else {
        return Ok(Vec::new());
    };
    let Some(mate) = adult.mate else {
        return Ok(Vec::new());
    };
    let clutch = clutch_size.min(adult.num_eggs);
    if clutch == 0 {
        return Ok(Vec::new());
    }
    let site = ctx.space.relocate(&location, ctx.depths.juvenile, rng)?;

    let egg_mass_id = id.child(adult.next_child);
    adult.next_child += 1;
    adult.num_eggs -= clutch;

    let eggs: Vec<Agent> = (0..clutch as u64)
        .map(|i| {
            Agent::egg(
                egg_mass_id.child(i),
                site.clone(),
                cross(genotype, mate, rng),
                mass_per_egg,
                Some(egg_mass_id.clone()),
            )
        })
        .collect();
    let egg_ids = eggs.iter().map(|egg| egg.id.clone()).collect();

    let mut commands = Vec::with_capacity(eggs.len() + 1);
    commands.push(Command::Spawn(Agent::egg_mass(
        egg_mass_id,
        site,
        genotype,
        mass_per_egg,
        egg_ids,
    )));
    commands.extend(eggs.into_iter().map(Command::Spawn));
    Ok(commands)
}
