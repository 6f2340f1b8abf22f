//! Error hierarchy for the reactor and the protocol engine.
//!
//! Protocol decoding errors live in `prebot_proto`; configuration and
//! module host errors live next to their owners.

use std::io;

use thiserror::Error;

use crate::reactor::SocketHandle;

// ============================================================================
// Reactor Errors (socket pool)
// ============================================================================

/// Errors raised by [`crate::reactor::SocketPool`].
#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown socket handle {0}")]
    UnknownHandle(SocketHandle),

    /// The peer closed the stream (read returned zero bytes).
    #[error("socket closed by peer")]
    Closed,
}

impl ReactorError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::UnknownHandle(_) => "unknown_handle",
            Self::Closed => "closed",
        }
    }
}

// ============================================================================
// Connection Errors (protocol engine)
// ============================================================================

/// Errors raised by [`crate::irc::Connection`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    /// Every resolved address refused or timed out.
    #[error("no address of {host}:{port} accepted a connection")]
    Unreachable { host: String, port: u16 },

    #[error("not connected")]
    NotConnected,

    #[error("reactor error: {0}")]
    Reactor(#[from] ReactorError),
}

impl ConnectionError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Resolve { .. } => "resolve",
            Self::Unreachable { .. } => "unreachable",
            Self::NotConnected => "not_connected",
            Self::Reactor(e) => e.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ReactorError::Closed.error_code(), "closed");
        assert_eq!(
            ConnectionError::from(ReactorError::UnknownHandle(SocketHandle::from_raw(3))).error_code(),
            "unknown_handle"
        );
        assert_eq!(ConnectionError::NotConnected.error_code(), "not_connected");
    }

    #[test]
    fn test_display() {
        let err = ConnectionError::Unreachable {
            host: "irc.example.net".into(),
            port: 6667,
        };
        assert_eq!(
            err.to_string(),
            "no address of irc.example.net:6667 accepted a connection"
        );
        assert_eq!(
            ReactorError::UnknownHandle(SocketHandle::from_raw(7)).to_string(),
            "unknown socket handle #7"
        );
    }
}
