//! Outbound client commands.
//!
//! Only the commands a bot issues are modeled; each serializes to exactly
//! one protocol line without the CRLF terminator.

use std::fmt;

/// A command sent by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `PASS <password>`
    Pass(String),
    /// `NICK <nickname>`
    Nick(String),
    /// `USER <user> * * :<realname>`
    User {
        /// Username (ident).
        user: String,
        /// Real name / GECOS.
        realname: String,
    },
    /// `JOIN <channel>`
    Join(String),
    /// `PART <channel> [:<reason>]`
    Part {
        /// Channel to leave.
        channel: String,
        /// Optional part message.
        reason: Option<String>,
    },
    /// `QUIT [:<reason>]`
    Quit(Option<String>),
    /// `PRIVMSG <target> :<text>`
    Privmsg {
        /// Nick or channel.
        target: String,
        /// Single line of text.
        text: String,
    },
    /// `NOTICE <target> :<text>`
    Notice {
        /// Nick or channel.
        target: String,
        /// Single line of text.
        text: String,
    },
    /// `PONG :<token>`
    Pong(String),
}

impl Command {
    /// The command verb.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Pass(_) => "PASS",
            Command::Nick(_) => "NICK",
            Command::User { .. } => "USER",
            Command::Join(_) => "JOIN",
            Command::Part { .. } => "PART",
            Command::Quit(_) => "QUIT",
            Command::Privmsg { .. } => "PRIVMSG",
            Command::Notice { .. } => "NOTICE",
            Command::Pong(_) => "PONG",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Pass(password) => write!(f, "PASS {password}"),
            Command::Nick(nick) => write!(f, "NICK {nick}"),
            Command::User { user, realname } => write!(f, "USER {user} * * :{realname}"),
            Command::Join(channel) => write!(f, "JOIN {channel}"),
            Command::Part {
                channel,
                reason: Some(reason),
            } => write!(f, "PART {channel} :{reason}"),
            Command::Part {
                channel,
                reason: None,
            } => write!(f, "PART {channel}"),
            Command::Quit(Some(reason)) => write!(f, "QUIT :{reason}"),
            Command::Quit(None) => f.write_str("QUIT"),
            Command::Privmsg { target, text } => write!(f, "PRIVMSG {target} :{text}"),
            Command::Notice { target, text } => write!(f, "NOTICE {target} :{text}"),
            Command::Pong(token) => write!(f, "PONG :{token}"),
        }
    }
}
