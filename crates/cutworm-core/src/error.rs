//! Error types for the simulation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown genotype: {0}")]
    UnknownGenotype(String),

    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Egg mass {egg_mass} holds {available} eggs of biomass {mass_per_egg}, cannot supply {requested}")]
    InsufficientBiomass {
        egg_mass: String,
        requested: f64,
        mass_per_egg: f64,
        available: usize,
    },

    #[error("Behavior {behavior} is not supported by {agent_type}")]
    UnsupportedBehavior { agent_type: String, behavior: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
