//! Core type definitions for the simulation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for an agent.
///
/// Children of an agent (eggs of an egg mass, egg masses of an adult) get the
/// parent's id with a per-parent counter appended.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UniqueId(pub String);

impl UniqueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id of the `index`-th child spawned by this agent
    pub fn child(&self, index: u64) -> Self {
        Self(format!("{}.{}", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single resistance allele
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Allele {
    R,
    S,
}

/// Resistance genotype of an insect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Genotype {
    RR,
    RS,
    SS,
}

impl Genotype {
    pub const ALL: [Genotype; 3] = [Genotype::RR, Genotype::RS, Genotype::SS];

    pub fn alleles(&self) -> [Allele; 2] {
        match self {
            Genotype::RR => [Allele::R, Allele::R],
            Genotype::RS => [Allele::R, Allele::S],
            Genotype::SS => [Allele::S, Allele::S],
        }
    }

    pub fn from_alleles(first: Allele, second: Allele) -> Self {
        match (first, second) {
            (Allele::R, Allele::R) => Genotype::RR,
            (Allele::S, Allele::S) => Genotype::SS,
            _ => Genotype::RS,
        }
    }

    /// Homozygous parents whose cross always yields this genotype.
    pub fn parental_pair(&self) -> [Genotype; 2] {
        match self {
            Genotype::RR => [Genotype::RR, Genotype::RR],
            Genotype::RS => [Genotype::RR, Genotype::SS],
            Genotype::SS => [Genotype::SS, Genotype::SS],
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Genotype::RR => 0,
            Genotype::RS => 1,
            Genotype::SS => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Genotype::RR => "RR",
            Genotype::RS => "RS",
            Genotype::SS => "SS",
        }
    }
}

impl FromStr for Genotype {
    type Err = Error;

    fn from_str(key: &str) -> Result<Self> {
        match key {
            "RR" => Ok(Genotype::RR),
            "RS" | "SR" => Ok(Genotype::RS),
            "SS" => Ok(Genotype::SS),
            other => Err(Error::UnknownGenotype(other.to_string())),
        }
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Life stage tag of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    EggMass,
    Egg,
    Larva,
    Pupa,
    Adult,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        AgentType::EggMass,
        AgentType::Egg,
        AgentType::Larva,
        AgentType::Pupa,
        AgentType::Adult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::EggMass => "egg_mass",
            AgentType::Egg => "egg",
            AgentType::Larva => "larva",
            AgentType::Pupa => "pupa",
            AgentType::Adult => "adult",
        }
    }

    /// Behaviors an agent of this stage can perform
    pub fn behaviors(&self) -> &'static [Behavior] {
        match self {
            AgentType::EggMass => &[],
            AgentType::Egg => &[Behavior::Survive, Behavior::Develop],
            AgentType::Larva => &[
                Behavior::Forage,
                Behavior::Grow,
                Behavior::Survive,
                Behavior::Develop,
            ],
            AgentType::Pupa => &[Behavior::Survive, Behavior::Develop],
            AgentType::Adult => &[Behavior::Survive, Behavior::Mate, Behavior::Lay],
        }
    }

    pub fn supports(&self, behavior: Behavior) -> bool {
        self.behaviors().contains(&behavior)
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named action an agent can be scheduled to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Survive,
    Develop,
    Grow,
    Forage,
    Mate,
    Lay,
}

impl Behavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Behavior::Survive => "survive",
            Behavior::Develop => "develop",
            Behavior::Grow => "grow",
            Behavior::Forage => "forage",
            Behavior::Mate => "mate",
            Behavior::Lay => "lay",
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

/// Why an insect left the population
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Survival,
    Starvation,
    Cannibalism,
    Emigration,
    /// Male retired after exhausting its matings
    Mated,
}

/// Bt toxin exposure class of a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toxin {
    None,
    Present,
    Absent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_ids() {
        let parent = UniqueId::new("adult_4");
        assert_eq!(parent.child(0).as_str(), "adult_4.0");
        assert_eq!(parent.child(7).child(2).as_str(), "adult_4.7.2");
    }

    #[test]
    fn test_genotype_lookup() {
        assert_eq!("RR".parse::<Genotype>().unwrap(), Genotype::RR);
        assert_eq!("SR".parse::<Genotype>().unwrap(), Genotype::RS);
        assert!(matches!(
            "RX".parse::<Genotype>(),
            Err(Error::UnknownGenotype(_))
        ));
    }

    #[test]
    fn test_alleles_round_trip() {
        for genotype in Genotype::ALL {
            let [a, b] = genotype.alleles();
            assert_eq!(Genotype::from_alleles(a, b), genotype);
            assert_eq!(Genotype::from_alleles(b, a), genotype);
        }
    }

    #[test]
    fn test_stage_behaviors() {
        assert!(AgentType::Adult.supports(Behavior::Lay));
        assert!(!AgentType::Egg.supports(Behavior::Lay));
        assert!(AgentType::EggMass.behaviors().is_empty());
    }

    #[test]
    fn test_behavior_names() {
        let behavior: Behavior = serde_json::from_str("\"forage\"").unwrap();
        assert_eq!(behavior, Behavior::Forage);
        assert!(serde_json::from_str::<Behavior>("\"fly\"").is_err());
    }
}
