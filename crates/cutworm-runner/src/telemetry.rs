//! Log subscriber setup.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,cutworm_world=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    /// `CUTWORM_LOG_FORMAT=json` selects structured output
    pub fn from_env() -> Self {
        match std::env::var("CUTWORM_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Human,
        }
    }
}

pub fn init_telemetry(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (human, json) = match format {
        LogFormat::Human => (Some(fmt::layer().with_target(true)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_target(true))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(human)
        .with(json)
        .try_init()?;

    info!(format = ?format, "Telemetry initialized");
    Ok(())
}
