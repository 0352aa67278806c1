//! Peer and relay configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! [peer]
//! relay_url = "http://127.0.0.1:15000"
//! tick_hz = 60
//!
//! [peer.layout]
//! screen_width = 1200
//! cell_size = 75
//!
//! [relay]
//! host = "0.0.0.0"
//! port = 15000
//! ```

use std::path::Path;

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::layout::Layout;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub peer: PeerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Settings for a playing peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Base URL of the relay.
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Peer loop rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,

    /// Screen geometry used to resolve pointer positions.
    #[serde(default)]
    pub layout: Layout,
}

/// Settings for the relay server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_relay_url() -> String {
    format!("http://127.0.0.1:{}", default_port())
}

fn default_tick_hz() -> u32 {
    60
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    15000
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            tick_hz: default_tick_hz(),
            layout: Layout::default(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(relay_url = %config.peer.relay_url, "Config loaded");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        if config.peer.tick_hz == 0 {
            return Err(ConfigError::new("tick_hz must be positive".to_string()));
        }
        Ok(config)
    }

    /// Loads `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
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
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
