//! Error types for the IRC protocol library.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Protocol-level errors produced while decoding wire input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The line contained nothing but whitespace or a bare prefix.
    #[error("empty message")]
    EmptyMessage,

    /// The command token was neither letters nor a three-digit numeric.
    #[error("invalid command at byte {position}: {string:?}")]
    InvalidCommand {
        /// The offending line.
        string: String,
        /// Byte offset where parsing stopped.
        position: usize,
    },

    /// A numeric reply token could not be interpreted.
    #[error("invalid numeric reply: {0}")]
    InvalidNumeric(String),

    /// An inbound line grew past the configured limit without a terminator.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Bytes buffered so far.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },
}
