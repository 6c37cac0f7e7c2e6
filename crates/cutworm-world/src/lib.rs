//! Population simulation engine.
//!
//! Agents live in a hierarchy of spatial graphs (root, fields, plants). Each
//! tick runs a schedule of per-stage behaviors whose cross-agent effects are
//! applied at a barrier, so sequential and parallel passes agree.

pub mod agent;
pub mod behavior;
pub mod bins;
pub mod census;
pub mod command;
pub mod environment;
pub mod graph;
pub mod migration;
pub mod models;
pub mod schedule;
pub mod simulation;
pub mod space;

pub use agent::{Agent, Stage};
pub use bins::{AgentBin, Agents, AgentsBin, Counts};
pub use command::Command;
pub use environment::Environment;
pub use graph::{Graph, GraphLibrary};
pub use migration::{Emigration, Immigration};
pub use models::{ModelRegistry, Models};
pub use schedule::{Actions, Schedule, ScheduleReport, Step, TickContext};
pub use simulation::{Simulation, SimulationSummary};
pub use space::{GridSource, Space};
