//! # prebot-proto
//!
//! Sans-IO building blocks of the IRC client protocol used by the prebot
//! framework. Nothing in this crate touches a socket: callers feed bytes and
//! lines in and get parsed values (or serialized lines) back.
//!
//! ## Features
//!
//! - Line grammar parsing (`[:prefix] command params [:trailing]`)
//! - `nick!user@host` sender decomposition
//! - Outbound command serialization
//! - ISUPPORT (`005`) token parsing, `PREFIX` and `CHANMODES` helpers
//! - Mode string decoding driven by the server's mode classes
//! - CRLF / bare LF line reassembly over a growable byte buffer
//!
//! ## Quick Start
//!
//! ```rust
//! use prebot_proto::{Command, Message};
//!
//! let msg = Message::parse(":nick!user@host PRIVMSG #rust :Hello, world!").unwrap();
//! assert_eq!(msg.command, "PRIVMSG");
//! assert_eq!(msg.params, vec!["#rust"]);
//! assert_eq!(msg.trailing.as_deref(), Some("Hello, world!"));
//!
//! let line = Command::Privmsg { target: "#rust".into(), text: "hi".into() }.to_string();
//! assert_eq!(line, "PRIVMSG #rust :hi");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod command;
pub mod error;
pub mod isupport;
pub mod line;
pub mod message;
pub mod mode;
pub mod names;
pub mod prefix;
pub mod response;

pub use self::casemap::{irc_eq, irc_lower_char, irc_to_lower};
pub use self::command::Command;
pub use self::error::{ProtocolError, Result};
pub use self::isupport::{ChanModes, Isupport, IsupportValue, PrefixSpec};
pub use self::line::LineBuffer;
pub use self::message::Message;
pub use self::mode::{parse_mode_changes, ModeChange};
pub use self::names::{is_channel_name, is_valid_nick};
pub use self::prefix::Prefix;
pub use self::response::Response;
