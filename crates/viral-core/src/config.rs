//! Configuration loading and typed config structures for the viral ABM.
//!
//! The canonical configuration lives in `viral-config.yaml` next to the
//! binary's working directory. This module defines strongly-typed structs
//! that mirror the YAML structure, and provides a loader that reads and
//! validates the file. Every field has a default, so an empty or missing
//! file yields a runnable server.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::rules::RuleSettings;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The file parsed but a value is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level application configuration.
///
/// Mirrors the structure of `viral-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Defaults and limits applied to `/start` requests.
    #[serde(default)]
    pub simulation: SimulationDefaults,

    /// Transition rule policy shared by every session.
    #[serde(default)]
    pub rules: RuleSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment overrides are not applied here; the binary calls
    /// [`ServerSettings::apply_env_overrides`] once logging is up.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every section for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.rules
            .validate()
            .map_err(|e| ConfigError::Invalid {
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Address to bind (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the browser client (`index.html`, `script.js`).
    /// Served at `/` when set.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl ServerSettings {
    /// Override listener values with environment variables when set:
    /// - `VIRAL_HOST` overrides `host`
    /// - `VIRAL_PORT` overrides `port`
    ///
    /// Returns one message per value that was ignored.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        let port = std::env::var("VIRAL_PORT").ok();
        self.apply_overrides(std::env::var("VIRAL_HOST").ok(), port.as_deref())
    }

    /// Apply explicit host and port overrides.
    ///
    /// An unparseable port is reported and the current value kept.
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<&str>) -> Vec<String> {
        let mut ignored = Vec::new();
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(val) = port {
            match val.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(e) => ignored.push(format!("ignoring invalid VIRAL_PORT {val:?}: {e}")),
            }
        }
        ignored
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation defaults
// ---------------------------------------------------------------------------

/// Values used when a `/start` body omits a field, plus hard limits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationDefaults {
    /// Grid side length when `layers` is missing or non-numeric.
    #[serde(default = "default_layers")]
    pub default_layers: u32,

    /// Infection probability when `probi` is missing or non-numeric.
    #[serde(default = "default_probi")]
    pub default_probi: f64,

    /// Fusion probability when `fusion_prob` is missing or non-numeric.
    #[serde(default = "default_fusion_prob")]
    pub default_fusion_prob: f64,

    /// Display boundary in simulated hours when `end_time` is missing.
    #[serde(default = "default_end_time")]
    pub default_end_time: f64,

    /// Largest accepted grid side length.
    #[serde(default = "default_max_layers")]
    pub max_layers: u32,

    /// Cells infected at time 0. One seeds the centre cell; more are
    /// drawn at random from the session RNG.
    #[serde(default = "default_initial_infected")]
    pub initial_infected: u32,
}

impl SimulationDefaults {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            reason: reason.to_owned(),
        };
        if self.max_layers == 0 {
            return Err(invalid("simulation.max_layers must be at least 1"));
        }
        if self.default_layers == 0 || self.default_layers > self.max_layers {
            return Err(invalid(
                "simulation.default_layers must be between 1 and max_layers",
            ));
        }
        if !(0.0..=1.0).contains(&self.default_probi) {
            return Err(invalid("simulation.default_probi must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.default_fusion_prob) {
            return Err(invalid(
                "simulation.default_fusion_prob must be within [0, 1]",
            ));
        }
        if self.initial_infected == 0 {
            return Err(invalid("simulation.initial_infected must be at least 1"));
        }
        if !self.default_end_time.is_finite() || self.default_end_time <= 0.0 {
            return Err(invalid("simulation.default_end_time must be positive"));
        }
        Ok(())
    }
}

impl Default for SimulationDefaults {
    fn default() -> Self {
        Self {
            default_layers: default_layers(),
            default_probi: default_probi(),
            default_fusion_prob: default_fusion_prob(),
            default_end_time: default_end_time(),
            max_layers: default_max_layers(),
            initial_infected: default_initial_infected(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Pretty,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (used by serde)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    5000
}

const fn default_layers() -> u32 {
    20
}

const fn default_probi() -> f64 {
    0.2
}

const fn default_fusion_prob() -> f64 {
    0.05
}

const fn default_end_time() -> f64 {
    24.0
}

const fn default_max_layers() -> u32 {
    200
}

const fn default_initial_infected() -> u32 {
    1
}

fn default_log_level() -> String {
    String::from("info")
}
