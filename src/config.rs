//! Configuration types and loading for the console.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Console configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Game server to attach to.
    pub server: ServerConfig,
    /// Timeout tuning.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

/// The game server's TCPR endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address of the TCPR listener, e.g. "127.0.0.1:50301".
    #[serde(default = "default_address")]
    pub address: String,
    /// Remote console password (`sv_rconpassword` on the game server).
    pub password: String,
}

/// Timeouts, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    /// Bound on dialing and on each step of the handshake.
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:50301".to_string()
}

fn default_connect_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.connect_secs)
    }
}
