//! Core configuration types and loading.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Process-wide bot behavior.
    #[serde(default)]
    pub bot: BotConfig,
    /// Socket pool tuning.
    #[serde(default)]
    pub reactor: ReactorConfig,
    /// IRC networks, one connection each (`[[network]]` tables).
    #[serde(default, rename = "network")]
    pub networks: Vec<NetworkConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Networks with `enabled = true`.
    pub fn enabled_networks(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.iter().filter(|n| n.enabled)
    }
}

/// Process-wide bot behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Character(s) that mark a message as a bot command (default: `?`).
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Numeric that marks the end of registration (default: 1).
    #[serde(default = "default_registered_numeric")]
    pub registered_numeric: u16,
    /// Longest the main cycle sleeps waiting for events, in ms (default: 1000).
    #[serde(default = "default_event_wait_ms")]
    pub event_wait_ms: u64,
    /// Built-in modules to load at startup, in order (default: all).
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,
}

impl BotConfig {
    pub fn event_wait(&self) -> Duration {
        Duration::from_millis(self.event_wait_ms)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            registered_numeric: default_registered_numeric(),
            event_wait_ms: default_event_wait_ms(),
            modules: default_modules(),
        }
    }
}

/// Socket pool tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactorConfig {
    /// Upper bound of one readiness wait, in ms (default: 250).
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// TCP connect timeout per resolved address, in ms (default: 10000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl ReactorConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// One IRC network. Read once when the connection is built; changing it
/// requires a reconnect.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Unique label used in logs and by modules.
    pub name: String,
    /// Server hostname or address.
    pub host: String,
    /// Server port (default: 6667).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Nicknames in order of preference; the first is used at connect.
    pub nicks: Vec<String>,
    /// Username sent in USER (default: "prebot").
    #[serde(default = "default_user")]
    pub user: String,
    /// Real name sent in USER (default: "Prebot IRC Bot").
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Server password, sent as PASS before NICK.
    pub password: Option<String>,
    /// Channels joined once registered.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Whether to connect at startup (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl NetworkConfig {
    /// Minimal network entry with every optional field at its default.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16, nick: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            nicks: vec![nick.into()],
            user: default_user(),
            realname: default_realname(),
            password: None,
            channels: Vec::new(),
            enabled: true,
        }
    }

    /// Preferred nickname.
    pub fn primary_nick(&self) -> &str {
        self.nicks.first().map(String::as_str).unwrap_or("prebot")
    }
}
