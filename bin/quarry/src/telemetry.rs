//! Tracing subscriber setup.

use crate::config::LogConfig;
use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Installs the global tracing subscriber per the log config.
pub fn init(config: &LogConfig) -> Result<()> {
    let level = match config.level.as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(anyhow!("unknown log level `{other}`")),
    };
    let filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    match config.format.as_str() {
        "json" => {
            let layer = tracing_subscriber::fmt::layer().json().with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init().map_err(|e| anyhow!(e))?;
        }
        "console" => {
            let layer = tracing_subscriber::fmt::layer().with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init().map_err(|e| anyhow!(e))?;
        }
        other => return Err(anyhow!("unknown log format `{other}`")),
    }
    Ok(())
}
