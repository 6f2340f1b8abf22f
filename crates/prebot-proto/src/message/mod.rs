//! IRC message parsing and serialization.

pub(crate) mod nom_parser;
mod types;

pub use self::types::Message;
