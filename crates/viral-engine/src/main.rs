//! Server binary for the viral agent-based model.
//!
//! Loads configuration, initializes logging, and serves the simulation API
//! until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `viral-config.yaml` (or `VIRAL_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Apply `VIRAL_HOST` / `VIRAL_PORT` overrides
//! 4. Build the shared application state
//! 5. Serve HTTP until shutdown

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use viral_core::config::{AppConfig, LogFormat, LoggingConfig};
use viral_server::{AppState, ServerConfig};

use crate::error::EngineError;

/// Config file looked up in the working directory.
const DEFAULT_CONFIG_PATH: &str = "viral-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the server fails
/// to bind.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // Logging is configured from the file, so load it first.
    let (mut config, config_path) = load_config()?;
    init_logging(&config.logging);

    if !config_path.exists() {
        info!(config_path = %config_path.display(), "Config file not found, using defaults");
    }
    for ignored in config.server.apply_env_overrides() {
        warn!("{ignored}");
    }

    info!(
        config_path = %config_path.display(),
        host = config.server.host,
        port = config.server.port,
        max_layers = config.simulation.max_layers,
        neighborhood = ?config.rules.neighborhood,
        hours_per_step = config.rules.hours_per_step,
        "viral-engine starting"
    );

    let state = Arc::new(AppState::new(config.simulation, config.rules));
    let server_config = ServerConfig {
        host: config.server.host,
        port: config.server.port,
        static_dir: config.server.static_dir,
    };

    viral_server::start_server(&server_config, state).await?;

    info!("viral-engine shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Load the configuration file, falling back to defaults if it is absent.
///
/// Reads `VIRAL_CONFIG` when set, otherwise `viral-config.yaml` in the
/// working directory. A missing file is not an error; a malformed one is.
fn load_config() -> Result<(AppConfig, PathBuf), EngineError> {
    let path = std::env::var_os("VIRAL_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        let config = AppConfig::from_file(&path)?;
        Ok((config, path))
    } else {
        Ok((AppConfig::default(), path))
    }
}
