//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Bot Defaults
// =============================================================================

pub fn default_command_prefix() -> String {
    "?".to_string()
}

/// `RPL_WELCOME`: the first reply every server sends once registration
/// succeeded.
pub fn default_registered_numeric() -> u16 {
    1
}

pub fn default_event_wait_ms() -> u64 {
    1000
}

pub fn default_modules() -> Vec<String> {
    crate::modules::builtin::NAMES
        .iter()
        .map(|name| name.to_string())
        .collect()
}

// =============================================================================
// Reactor Defaults
// =============================================================================

pub fn default_poll_timeout_ms() -> u64 {
    250
}

pub fn default_connect_timeout_ms() -> u64 {
    10_000
}

// =============================================================================
// Network Defaults
// =============================================================================

pub fn default_port() -> u16 {
    6667
}

pub fn default_user() -> String {
    "prebot".to_string()
}

pub fn default_realname() -> String {
    "Prebot IRC Bot".to_string()
}
