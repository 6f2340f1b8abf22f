//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use std::collections::HashSet;

use prebot_proto::{names::DEFAULT_CHANTYPES, is_channel_name, is_valid_nick};
use thiserror::Error;

use super::Config;
use crate::modules::builtin;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one [[network]] is required")]
    NoNetworks,
    #[error("network name must not be empty")]
    EmptyName,
    #[error("network '{0}' has an empty host")]
    EmptyHost(String),
    #[error("network '{0}' has port 0")]
    ZeroPort(String),
    #[error("network '{0}' lists no nicks")]
    NoNicks(String),
    #[error("network '{network}' has invalid nick '{nick}'")]
    InvalidNick { network: String, nick: String },
    #[error("network '{network}' has invalid channel '{channel}'")]
    InvalidChannel { network: String, channel: String },
    #[error("network '{0}' is defined more than once")]
    DuplicateNetwork(String),
    #[error("bot.command_prefix must not be empty")]
    EmptyCommandPrefix,
    #[error("bot.registered_numeric must be between 1 and 999, got {0}")]
    InvalidNumeric(u16),
    #[error("bot.modules names unknown module '{0}'")]
    UnknownModule(String),
    #[error("reactor.poll_timeout_ms must be greater than 0")]
    ZeroPollTimeout,
    #[error("reactor.connect_timeout_ms must be greater than 0")]
    ZeroConnectTimeout,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Bot
    if config.bot.command_prefix.is_empty() {
        errors.push(ValidationError::EmptyCommandPrefix);
    }
    if !(1..=999).contains(&config.bot.registered_numeric) {
        errors.push(ValidationError::InvalidNumeric(config.bot.registered_numeric));
    }
    for name in &config.bot.modules {
        if !builtin::NAMES.contains(&name.as_str()) {
            errors.push(ValidationError::UnknownModule(name.clone()));
        }
    }
    if config.reactor.poll_timeout_ms == 0 {
        errors.push(ValidationError::ZeroPollTimeout);
    }
    if config.reactor.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }

    // Networks
    if config.networks.is_empty() {
        errors.push(ValidationError::NoNetworks);
    }

    let mut seen = HashSet::new();
    for net in &config.networks {
        if net.name.is_empty() {
            errors.push(ValidationError::EmptyName);
        } else if !seen.insert(net.name.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateNetwork(net.name.clone()));
        }
        if net.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost(net.name.clone()));
        }
        if net.port == 0 {
            errors.push(ValidationError::ZeroPort(net.name.clone()));
        }
        if net.nicks.is_empty() {
            errors.push(ValidationError::NoNicks(net.name.clone()));
        }
        for nick in net.nicks.iter().filter(|n| !is_valid_nick(n)) {
            errors.push(ValidationError::InvalidNick {
                network: net.name.clone(),
                nick: nick.clone(),
            });
        }
        for channel in net
            .channels
            .iter()
            .filter(|c| !is_channel_name(c, DEFAULT_CHANTYPES))
        {
            errors.push(ValidationError::InvalidChannel {
                network: net.name.clone(),
                channel: channel.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
