use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::prefix::Prefix;

use super::nom_parser::ParsedMessage;

/// An owned IRC line split into its grammar parts.
///
/// ```text
/// [':' prefix ' '] command (' ' middle)* [' :' trailing]
/// ```
///
/// Middle parameters and the trailing parameter are kept apart so callers
/// can tell `PRIVMSG #c :hi` from `PRIVMSG #c hi` when they care (ISUPPORT
/// does); [`Message::args`] chains them back together when they do not.
///
/// # Example
///
/// ```
/// use prebot_proto::Message;
///
/// let msg = Message::parse("PING :server123").unwrap();
/// assert!(msg.prefix.is_none());
/// assert_eq!(msg.command, "PING");
/// assert_eq!(msg.last_arg(), Some("server123"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Raw sender identity without the leading `:`.
    pub prefix: Option<String>,
    /// Command name or three-digit numeric, as received.
    pub command: String,
    /// Space-separated middle parameters.
    pub params: Vec<String>,
    /// Everything after the first `" :"`.
    pub trailing: Option<String>,
}

impl Message {
    /// Parse one protocol line. A trailing CR and/or LF is tolerated.
    pub fn parse(line: &str) -> Result<Message, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }

        let parsed = ParsedMessage::parse(line).map_err(|position| {
            ProtocolError::InvalidCommand {
                string: line.to_owned(),
                position,
            }
        })?;

        Ok(Message {
            prefix: parsed.prefix.map(str::to_owned),
            command: parsed.command.to_owned(),
            params: parsed.params.iter().map(|p| (*p).to_owned()).collect(),
            trailing: parsed.trailing.map(str::to_owned),
        })
    }

    /// Decompose the prefix into nick/user/host.
    pub fn sender(&self) -> Option<Prefix> {
        self.prefix.as_deref().map(Prefix::parse)
    }

    /// Nickname portion of the prefix, if any.
    pub fn source_nickname(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }

    /// The numeric code when the command is a three-digit reply.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Whether the command matches `name`, ignoring ASCII case.
    pub fn is(&self, name: &str) -> bool {
        self.command.eq_ignore_ascii_case(name)
    }

    /// All parameters in wire order, trailing last.
    pub fn args(&self) -> impl Iterator<Item = &str> + '_ {
        self.params
            .iter()
            .map(String::as_str)
            .chain(self.trailing.as_deref())
    }

    /// Parameter `index` counting the trailing parameter as the last one.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args().nth(index)
    }

    /// The final parameter: the trailing one if present, otherwise the last
    /// middle parameter.
    pub fn last_arg(&self) -> Option<&str> {
        self.trailing
            .as_deref()
            .or_else(|| self.params.last().map(String::as_str))
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        if let Some(trailing) = &self.trailing {
            write!(f, " :{trailing}")?;
        }
        Ok(())
    }
}
