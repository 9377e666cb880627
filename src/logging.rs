//! `tracing` subscriber setup for binaries embedding the engine.
//!
//! The library only emits events; installing a subscriber is left to the
//! application, typically with [`init`] right after loading the configuration.

use crate::config::Config;
use crate::error::{EngineError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const DEFAULT_FILTER: &str = "warn";

/// Picks the filter: `RUST_LOG` first, then the configured level, then `warn`.
pub fn filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        configured
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
    })
}

/// Installs a global fmt subscriber writing to stderr, or appending to the
/// configured log file.
pub fn init(config: &Config) -> Result<()> {
    let writer = match config.log_file_path() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    EngineError::ConfigError(format!("could not open log file {}: {e}", path.display()))
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter(config.log_level.as_deref()))
        .with_writer(writer)
        .with_target(false)
        .with_ansi(config.log_file.is_none())
        .try_init()
        .map_err(|e| EngineError::ConfigError(format!("could not install logger: {e}")))?;

    tracing::debug!("log started");
    Ok(())
}
