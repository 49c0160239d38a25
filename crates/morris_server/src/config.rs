//! Server configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::registry::DEFAULT_FINISHED_CAPACITY;

/// Database path that selects the in-memory store.
pub const IN_MEMORY: &str = ":memory:";

/// Settings for `morris serve`.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_", into)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    host: String,

    /// Port to bind.
    port: u16,

    /// SQLite file, or `:memory:` for a store that dies with the process.
    database: String,

    /// Events a subscriber may have queued before new ones are dropped.
    subscriber_capacity: usize,

    /// Events kept per match for `events_since`.
    event_log_capacity: usize,

    /// Finished matches kept queryable before the oldest is released.
    finished_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database: "morris.db".to_string(),
            subscriber_capacity: 64,
            event_log_capacity: 256,
            finished_capacity: DEFAULT_FINISHED_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(port = config.port, database = %config.database, "Config loaded");
        Ok(config)
    }

    /// Like [`ServerConfig::from_file`], but a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists and cannot be parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            debug!("No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Whether the in-memory store was requested.
    pub fn in_memory(&self) -> bool {
        self.database == IN_MEMORY
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
