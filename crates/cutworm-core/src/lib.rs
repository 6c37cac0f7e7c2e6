//! Core types and utilities for the cutworm population simulation engine.

pub mod config;
pub mod error;
pub mod frame;
pub mod genetics;
pub mod location;
pub mod types;

pub use config::*;
pub use error::{Error, Result};
pub use frame::{percent_resistant, Frame};
pub use genetics::cross;
pub use location::Location;
pub use types::*;
