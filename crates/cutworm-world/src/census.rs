//! Read-only view of prey and mates per location, taken before each pass.

use crate::agent::Stage;
use crate::bins::Agents;
use cutworm_core::{Genotype, Location, UniqueId};
use std::collections::HashMap;

/// What a forager or a female sees of another agent
#[derive(Debug, Clone, PartialEq)]
pub struct PreyInfo {
    pub id: UniqueId,
    pub mass: f64,
    pub genotype: Genotype,
    /// Live egg biomass for egg masses, body mass otherwise
    pub biomass: f64,
}

#[derive(Debug, Clone, Default)]
pub struct LocationCensus {
    pub egg_masses: Vec<PreyInfo>,
    pub larvae: Vec<PreyInfo>,
    pub males: Vec<PreyInfo>,
}

/// Census keyed by exact location, entries sorted by id
#[derive(Debug, Clone, Default)]
pub struct Census {
    locations: HashMap<Location, LocationCensus>,
}

impl Census {
    pub fn take(agents: &Agents) -> Self {
        let mut locations: HashMap<Location, LocationCensus> = HashMap::new();

        // The arena iterates in id order, so every list comes out sorted.
        for agent in agents.iter().filter(|agent| agent.is_active()) {
            let entry = || PreyInfo {
                id: agent.id.clone(),
                mass: agent.mass,
                genotype: agent.genotype,
                biomass: agent.mass,
            };
            match &agent.stage {
                Stage::EggMass(_) => {
                    let biomass = agents.egg_mass_biomass(&agent.id);
                    if biomass > 0.0 {
                        locations
                            .entry(agent.location.clone())
                            .or_default()
                            .egg_masses
                            .push(PreyInfo { biomass, ..entry() });
                    }
                }
                Stage::Larva(_) => locations
                    .entry(agent.location.clone())
                    .or_default()
                    .larvae
                    .push(entry()),
                Stage::Adult(_) if agent.is_male() => locations
                    .entry(agent.location.clone())
                    .or_default()
                    .males
                    .push(entry()),
                _ => {}
            }
        }

        Self { locations }
    }

    pub fn at(&self, location: &Location) -> Option<&LocationCensus> {
        self.locations.get(location)
    }

    pub fn egg_masses(&self, location: &Location) -> &[PreyInfo] {
        self.at(location)
            .map(|census| census.egg_masses.as_slice())
            .unwrap_or(&[])
    }

    pub fn larvae(&self, location: &Location) -> &[PreyInfo] {
        self.at(location)
            .map(|census| census.larvae.as_slice())
            .unwrap_or(&[])
    }

    pub fn males(&self, location: &Location) -> &[PreyInfo] {
        self.at(location)
            .map(|census| census.males.as_slice())
            .unwrap_or(&[])
    }
}
