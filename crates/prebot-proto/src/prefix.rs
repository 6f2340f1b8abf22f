//! Sender identity decomposition.
//!
//! A prefix is either `nick!user@host` or something that does not match that
//! pattern (a server name, or a bare nick from servers that omit the rest).
//! Non-matching prefixes are kept whole as a nick with no user or host.

use std::fmt;

/// A decomposed message sender.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Prefix {
    /// Nickname, or the whole prefix when it is not a `nick!user@host` mask.
    pub nick: String,
    /// Username (ident), when present.
    pub user: Option<String>,
    /// Hostname, when present.
    pub host: Option<String>,
}

impl Prefix {
    /// Decompose a raw prefix.
    ///
    /// ```
    /// use prebot_proto::Prefix;
    ///
    /// let full = Prefix::parse("nick!user@host.example");
    /// assert_eq!(full.nick, "nick");
    /// assert_eq!(full.user.as_deref(), Some("user"));
    /// assert_eq!(full.host.as_deref(), Some("host.example"));
    ///
    /// let bare = Prefix::parse("irc.example.net");
    /// assert_eq!(bare.nick, "irc.example.net");
    /// assert!(bare.user.is_none() && bare.host.is_none());
    /// ```
    pub fn parse(raw: &str) -> Self {
        match split_mask(raw) {
            Some((nick, user, host)) => Prefix {
                nick: nick.to_owned(),
                user: Some(user.to_owned()),
                host: Some(host.to_owned()),
            },
            None => Prefix::bare(raw),
        }
    }

    /// A prefix carrying only a nickname.
    pub fn bare(nick: impl Into<String>) -> Self {
        Prefix {
            nick: nick.into(),
            user: None,
            host: None,
        }
    }

    /// Whether both user and host are known.
    pub fn is_full(&self) -> bool {
        self.user.is_some() && self.host.is_some()
    }
}

/// Match `nick!user@host` with all three parts non-empty.
fn split_mask(raw: &str) -> Option<(&str, &str, &str)> {
    let (nick, rest) = raw.split_once('!')?;
    let (user, host) = rest.split_once('@')?;

    if nick.is_empty() || user.is_empty() || host.is_empty() || nick.contains('@') {
        return None;
    }
    Some((nick, user, host))
}

impl From<&str> for Prefix {
    fn from(s: &str) -> Self {
        Prefix::parse(s)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nick)?;
        if let Some(user) = &self.user {
            write!(f, "!{user}")?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{host}")?;
        }
        Ok(())
    }
}
