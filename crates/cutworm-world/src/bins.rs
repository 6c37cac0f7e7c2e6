//! Per-location agent pools and their genotype counters.
//!
//! An agent is a member of the bin of every ancestor of its location, so a
//! single activation touches one bin per depth. The agents themselves live in
//! one arena keyed by id; bins only hold ids plus counts.

use crate::agent::{Agent, EggMassState, Stage};
use crate::environment::Environment;
use crate::space::Space;
use cutworm_core::{
    AgentType, DeathCause, EnvironmentConfig, Error, Frame, Genotype, Location, Result, UniqueId,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::trace;

/// Running genotype tallies plus their recorded time series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counts {
    tallies: BTreeMap<Genotype, u64>,
    series: BTreeMap<Genotype, Vec<u64>>,
    ticks: Vec<u64>,
}

impl Counts {
    pub fn increment(&mut self, genotype: Genotype) {
        *self.tallies.entry(genotype).or_insert(0) += 1;
    }

    pub fn decrement(&mut self, genotype: Genotype) -> Result<()> {
        match self.tallies.get_mut(&genotype) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Ok(())
            }
            _ => Err(Error::InvalidState(format!(
                "count of {} would drop below zero",
                genotype
            ))),
        }
    }

    pub fn get(&self, genotype: Genotype) -> u64 {
        self.tallies.get(&genotype).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.tallies.values().sum()
    }

    pub fn tallies(&self) -> &BTreeMap<Genotype, u64> {
        &self.tallies
    }

    /// Append the current tallies to the series.
    ///
    /// Genotypes seen for the first time are backfilled with zeros.
    pub fn record(&mut self, tick: u64) {
        let rows = self.ticks.len();
        for (&genotype, &count) in &self.tallies {
            self.series
                .entry(genotype)
                .or_insert_with(|| vec![0; rows])
                .push(count);
        }
        self.ticks.push(tick);
    }

    /// Drop the recorded series, keeping the tallies
    pub fn refresh(&mut self) {
        self.series.clear();
        self.ticks.clear();
    }

    pub fn frame(&self, name: String) -> Frame {
        let mut frame = Frame::new(name);
        frame.ticks = self.ticks.clone();
        frame.columns = self.series.clone();
        frame
    }
}

/// Members of one (location, agent type) pair
#[derive(Debug, Clone, Default)]
pub struct AgentBin {
    members: BTreeSet<UniqueId>,
    counts: Counts,
}

impl AgentBin {
    pub fn activate(&mut self, id: &UniqueId, genotype: Genotype) -> Result<()> {
        if !self.members.insert(id.clone()) {
            return Err(Error::AlreadyExists(format!("agent {} in bin", id)));
        }
        self.counts.increment(genotype);
        Ok(())
    }

    pub fn deactivate(&mut self, id: &UniqueId, genotype: Genotype) -> Result<()> {
        if !self.members.remove(id) {
            return Err(Error::NotFound(format!("agent {} in bin", id)));
        }
        self.counts.decrement(genotype)
    }

    pub fn members(&self) -> &BTreeSet<UniqueId> {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn counts(&self) -> &Counts {
        &self.counts
    }
}

/// All bins of one location
#[derive(Debug, Clone)]
pub struct AgentsBin {
    pub location: Location,
    pub environment: Environment,
    bins: BTreeMap<AgentType, AgentBin>,
}

impl AgentsBin {
    pub fn new(location: Location, environment: Environment) -> Self {
        let bins = AgentType::ALL
            .iter()
            .map(|&agent_type| (agent_type, AgentBin::default()))
            .collect();
        Self {
            location,
            environment,
            bins,
        }
    }

    pub fn bin(&self, agent_type: AgentType) -> Option<&AgentBin> {
        self.bins.get(&agent_type)
    }

    fn bin_mut(&mut self, agent_type: AgentType) -> &mut AgentBin {
        self.bins.entry(agent_type).or_default()
    }

    pub fn members(&self, agent_type: AgentType) -> impl Iterator<Item = &UniqueId> {
        self.bins
            .get(&agent_type)
            .into_iter()
            .flat_map(|bin| bin.members.iter())
    }

    /// Count tables named `"{location}_{agent_type}"`, empty ones dropped
    pub fn dataframes(&self) -> Vec<Frame> {
        self.bins
            .iter()
            .map(|(agent_type, bin)| bin.counts.frame(format!("{}_{}", self.location, agent_type)))
            .filter(|frame| !frame.is_empty())
            .collect()
    }
}

/// Every location's bins plus the agent arena
#[derive(Debug, Clone)]
pub struct Agents {
    bins: HashMap<Location, AgentsBin>,
    arena: BTreeMap<UniqueId, Agent>,
    deaths: BTreeMap<DeathCause, u64>,
}

impl Agents {
    pub fn new(space: &Space, config: &EnvironmentConfig) -> Self {
        let bins = space
            .locations()
            .iter()
            .map(|location| {
                let environment = Environment::for_location(location, space, config);
                (location.clone(), AgentsBin::new(location.clone(), environment))
            })
            .collect();
        Self {
            bins,
            arena: BTreeMap::new(),
            deaths: BTreeMap::new(),
        }
    }

    /// Add `agent` to its location and every ancestor
    pub fn activate(&mut self, agent: Agent) -> Result<()> {
        if !self.bins.contains_key(&agent.location) {
            return Err(Error::UnknownLocation(agent.location.to_string()));
        }
        if self.arena.contains_key(&agent.id) {
            return Err(Error::AlreadyExists(format!("agent {}", agent.id)));
        }

        let agent_type = agent.agent_type();
        for key in agent.location.ancestry() {
            self.bins
                .get_mut(&key)
                .ok_or_else(|| Error::UnknownLocation(key.to_string()))?
                .bin_mut(agent_type)
                .activate(&agent.id, agent.genotype)?;
        }
        trace!(id = %agent.id, agent_type = %agent_type, location = %agent.location, "Activated");
        self.arena.insert(agent.id.clone(), agent);
        Ok(())
    }

    /// Remove the agent from every bin it was counted in.
    ///
    /// An egg is detached from its egg mass; deaths are tallied by cause.
    pub fn deactivate(&mut self, id: &UniqueId) -> Result<Agent> {
        let agent = self
            .arena
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("agent {}", id)))?;

        let agent_type = agent.agent_type();
        for key in agent.location.ancestry() {
            self.bins
                .get_mut(&key)
                .ok_or_else(|| Error::UnknownLocation(key.to_string()))?
                .bin_mut(agent_type)
                .deactivate(&agent.id, agent.genotype)?;
        }

        if let Some(cause) = agent.death_cause {
            *self.deaths.entry(cause).or_insert(0) += 1;
        }
        if let Stage::Egg(egg) = &agent.stage {
            if let Some(mass_id) = &egg.egg_mass {
                self.detach_egg(mass_id, &agent.id);
            }
        }
        trace!(id = %agent.id, agent_type = %agent_type, cause = ?agent.death_cause, "Deactivated");
        Ok(agent)
    }

    fn detach_egg(&mut self, mass_id: &UniqueId, egg: &UniqueId) {
        if let Some(mass) = self.arena.get_mut(mass_id) {
            if let Stage::EggMass(state) = &mut mass.stage {
                state.eggs.retain(|e| e != egg);
                mass.mass = state.biomass();
            }
        }
    }

    /// Deactivate every agent that is no longer active, cascading to egg
    /// masses whose last egg left. Returns the removed agents.
    pub fn sweep(&mut self) -> Result<Vec<Agent>> {
        let mut removed = Vec::new();
        loop {
            let inactive: Vec<UniqueId> = self
                .arena
                .values()
                .filter(|agent| !agent.is_active())
                .map(|agent| agent.id.clone())
                .collect();
            if inactive.is_empty() {
                break;
            }
            for id in inactive {
                if self.arena.contains_key(&id) {
                    removed.push(self.deactivate(&id)?);
                }
            }
        }
        Ok(removed)
    }

    /// Live agents of a type, from the root bin
    pub fn agents(&self, agent_type: AgentType) -> Vec<&Agent> {
        self.bins
            .get(&Location::root())
            .into_iter()
            .flat_map(|bin| bin.members(agent_type))
            .filter_map(|id| self.arena.get(id))
            .collect()
    }

    /// Number of agents of a type in the whole population
    pub fn count(&self, agent_type: AgentType) -> usize {
        self.bin(&Location::root())
            .and_then(|bin| bin.bin(agent_type))
            .map_or(0, AgentBin::len)
    }

    pub fn bin(&self, location: &Location) -> Option<&AgentsBin> {
        self.bins.get(location)
    }

    pub fn environment(&self, location: &Location) -> Result<&Environment> {
        self.bins
            .get(location)
            .map(|bin| &bin.environment)
            .ok_or_else(|| Error::UnknownLocation(location.to_string()))
    }

    pub fn get(&self, id: &UniqueId) -> Option<&Agent> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: &UniqueId) -> Option<&mut Agent> {
        self.arena.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.arena.values()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn deaths(&self) -> &BTreeMap<DeathCause, u64> {
        &self.deaths
    }

    pub fn age_all(&mut self) {
        for agent in self.arena.values_mut().filter(|agent| agent.alive) {
            agent.age += 1;
        }
    }

    /// Append current counts of every bin to its time series
    pub fn record(&mut self, tick: u64) {
        for location_bin in self.bins.values_mut() {
            for bin in location_bin.bins.values_mut() {
                bin.counts.record(tick);
            }
        }
    }

    pub fn refresh(&mut self) {
        for location_bin in self.bins.values_mut() {
            for bin in location_bin.bins.values_mut() {
                bin.counts.refresh();
            }
        }
    }

    /// Count tables of every location, ordered by location
    pub fn dataframes(&self) -> Vec<Frame> {
        let mut locations: Vec<&Location> = self.bins.keys().collect();
        locations.sort();
        locations
            .into_iter()
            .filter_map(|location| self.bins.get(location))
            .flat_map(AgentsBin::dataframes)
            .collect()
    }

    /// Kill eggs of an egg mass worth `amount` of biomass.
    ///
    /// Only eggs still alive count as available. Returns the biomass eaten.
    pub fn feed_on_egg_mass(&mut self, egg_mass: &UniqueId, amount: f64) -> Result<f64> {
        let (eggs, mass_per_egg) = match self.arena.get(egg_mass).map(|agent| &agent.stage) {
            Some(Stage::EggMass(state)) => (state.eggs.clone(), state.mass_per_egg),
            Some(_) => {
                return Err(Error::InvalidState(format!("{} is not an egg mass", egg_mass)))
            }
            None => return Err(Error::NotFound(format!("egg mass {}", egg_mass))),
        };

        let live: Vec<UniqueId> = eggs
            .into_iter()
            .filter(|id| self.arena.get(id).map_or(false, |egg| egg.alive))
            .collect();
        let removed = EggMassState::eggs_to_remove(egg_mass, amount, mass_per_egg, live.len())?;

        for id in live.iter().take(removed) {
            if let Some(egg) = self.arena.get_mut(id) {
                egg.die(DeathCause::Cannibalism);
            }
        }
        Ok(amount.min(removed as f64 * mass_per_egg))
    }

    /// Live biomass of an egg mass
    pub fn egg_mass_biomass(&self, egg_mass: &UniqueId) -> f64 {
        match self.arena.get(egg_mass).map(|agent| &agent.stage) {
            Some(Stage::EggMass(state)) => {
                let live = state
                    .eggs
                    .iter()
                    .filter(|id| self.arena.get(id).map_or(false, |egg| egg.alive))
                    .count();
                live as f64 * state.mass_per_egg
            }
            _ => 0.0,
        }
    }

    /// Move the given agents out of the arena; bin membership is untouched
    pub(crate) fn take(&mut self, ids: &[UniqueId]) -> Vec<Agent> {
        ids.iter().filter_map(|id| self.arena.remove(id)).collect()
    }

    pub(crate) fn restore(&mut self, agents: impl IntoIterator<Item = Agent>) {
        for agent in agents {
            self.arena.insert(agent.id.clone(), agent);
        }
    }
}
