//! Runs one simulation from a JSON configuration file.

mod telemetry;

use anyhow::{Context, Result};
use cutworm_core::{DatabaseConfig, SimulationConfig};
use cutworm_store::reconcile;
use cutworm_world::Simulation;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

fn main() -> Result<()> {
    telemetry::init_telemetry(telemetry::LogFormat::from_env())?;

    let mut config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::from_file(Path::new(&path))
            .with_context(|| format!("loading configuration from {}", path))?,
        None => {
            info!("No configuration file given, using defaults");
            SimulationConfig::default()
        }
    };

    // Untagged runs get a unique tag so parallel runs never share snapshot names
    if let Some(database) = config.database.as_mut() {
        if database.file_name == DatabaseConfig::default().file_name {
            database.file_name = format!("run-{}", Uuid::new_v4().simple());
        }
    }

    info!(seed = config.seed, ticks = config.ticks, "Starting cutworm run");

    let mut sim = Simulation::new(config.clone())?;
    let summary = sim.run()?;
    info!(summary = %serde_json::to_string(&summary)?, "Run summary");

    if let Some(database) = &config.database {
        check_snapshots(database, config.ticks)?;
    }

    Ok(())
}

/// Confirm the run left a contiguous set of snapshot files
fn check_snapshots(database: &DatabaseConfig, ticks: u64) -> Result<()> {
    let expected = ticks - ticks % database.spacing;
    let runs = reconcile(&[database.output_dir.clone()], Some(expected))?;

    match runs.iter().find(|run| run.run == database.file_name) {
        Some(run) => info!(
            run = %run.run,
            files = run.files.len(),
            last_tick = run.last_tick,
            complete = run.complete,
            "Snapshot coverage"
        ),
        None if expected > 0 => warn!(run = %database.file_name, "No snapshots found"),
        None => {}
    }
    Ok(())
}
