//! The closed set of events carried by the bus.
//!
//! Every variant maps to one event name (see [`names`]). Protocol events
//! carry the [`Connection`] they came from so handlers can answer on the
//! same network.

use std::borrow::Cow;
use std::sync::Arc;

use prebot_proto::{ModeChange, Prefix};

use crate::bus::BusEvent;
use crate::error::ConnectionError;
use crate::irc::{Connection, UserInfo};

/// Event names handlers register against.
pub mod names {
    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const SERVER_MESSAGE: &str = "server-message";
    pub const PING: &str = "ping";
    pub const ERROR: &str = "error";
    pub const PRIVATE_MESSAGE: &str = "private-message";
    pub const CHANNEL_MESSAGE: &str = "channel-message";
    pub const PRIVATE_NOTICE: &str = "private-notice";
    pub const CHANNEL_NOTICE: &str = "channel-notice";
    pub const JOIN: &str = "join";
    pub const PART: &str = "part";
    pub const KICK: &str = "kick";
    pub const QUIT: &str = "quit";
    pub const NICK_CHANGE: &str = "nick-change";
    pub const MODE_CHANGE: &str = "mode-change";
    pub const RAW_LINE_SENT: &str = "raw-line-sent";
    pub const RAW_LINE_RECEIVED: &str = "raw-line-received";
    pub const MODULE_LOADING: &str = "module.loading";
    pub const MODULE_LOADED: &str = "module.loaded";
    pub const MODULE_UNLOADING: &str = "module.unloading";
    pub const MODULE_UNLOADED: &str = "module.unloaded";
    /// Prefix of `command.<name>` events.
    pub const COMMAND_PREFIX: &str = "command.";

    /// Name of the event published for bot command `name`.
    pub fn command(name: &str) -> String {
        format!("{COMMAND_PREFIX}{name}")
    }
}

#[derive(Clone, Debug)]
pub enum Event {
    /// Registration completed.
    Connected { irc: Arc<Connection> },
    /// The socket closed; transient state was discarded.
    Disconnected { irc: Arc<Connection> },
    /// Any numeric reply. `params` includes the trailing parameter.
    ServerMessage {
        irc: Arc<Connection>,
        sender: Prefix,
        code: u16,
        params: Vec<String>,
    },
    /// `PING`; `sender` is the token to echo back in `PONG`.
    Ping { irc: Arc<Connection>, sender: String },
    Error { irc: Arc<Connection>, reason: String },
    PrivateMessage {
        irc: Arc<Connection>,
        sender: UserInfo,
        text: String,
    },
    ChannelMessage {
        irc: Arc<Connection>,
        sender: UserInfo,
        channel: String,
        text: String,
    },
    PrivateNotice {
        irc: Arc<Connection>,
        sender: UserInfo,
        text: String,
    },
    ChannelNotice {
        irc: Arc<Connection>,
        sender: UserInfo,
        channel: String,
        text: String,
    },
    Join {
        irc: Arc<Connection>,
        sender: UserInfo,
        channel: String,
    },
    Part {
        irc: Arc<Connection>,
        sender: UserInfo,
        channel: String,
        reason: Option<String>,
    },
    Kick {
        irc: Arc<Connection>,
        sender: UserInfo,
        channel: String,
        nick: String,
        reason: Option<String>,
    },
    Quit {
        irc: Arc<Connection>,
        sender: UserInfo,
        reason: Option<String>,
    },
    /// `sender` still carries the old nickname.
    NickChange {
        irc: Arc<Connection>,
        sender: UserInfo,
        new_nick: String,
    },
    ModeChange {
        irc: Arc<Connection>,
        sender: Prefix,
        target: String,
        changes: Vec<ModeChange>,
    },
    RawLineSent { irc: Arc<Connection>, line: String },
    RawLineReceived { irc: Arc<Connection>, line: String },
    ModuleLoading { module: String },
    ModuleLoaded { module: String },
    ModuleUnloading { module: String },
    ModuleUnloaded { module: String },
    /// A message starting with the command prefix.
    Command {
        irc: Arc<Connection>,
        sender: UserInfo,
        /// Channel the command was said in; `None` for private messages.
        channel: Option<String>,
        name: String,
        /// Text after the command word, trimmed.
        args: String,
    },
}

impl Event {
    /// The name handlers register against.
    pub fn name(&self) -> Cow<'static, str> {
        use names::*;
        Cow::Borrowed(match self {
            Event::Connected { .. } => CONNECTED,
            Event::Disconnected { .. } => DISCONNECTED,
            Event::ServerMessage { .. } => SERVER_MESSAGE,
            Event::Ping { .. } => PING,
            Event::Error { .. } => ERROR,
            Event::PrivateMessage { .. } => PRIVATE_MESSAGE,
            Event::ChannelMessage { .. } => CHANNEL_MESSAGE,
            Event::PrivateNotice { .. } => PRIVATE_NOTICE,
            Event::ChannelNotice { .. } => CHANNEL_NOTICE,
            Event::Join { .. } => JOIN,
            Event::Part { .. } => PART,
            Event::Kick { .. } => KICK,
            Event::Quit { .. } => QUIT,
            Event::NickChange { .. } => NICK_CHANGE,
            Event::ModeChange { .. } => MODE_CHANGE,
            Event::RawLineSent { .. } => RAW_LINE_SENT,
            Event::RawLineReceived { .. } => RAW_LINE_RECEIVED,
            Event::ModuleLoading { .. } => MODULE_LOADING,
            Event::ModuleLoaded { .. } => MODULE_LOADED,
            Event::ModuleUnloading { .. } => MODULE_UNLOADING,
            Event::ModuleUnloaded { .. } => MODULE_UNLOADED,
            Event::Command { name, .. } => return Cow::Owned(command(name)),
        })
    }

    /// The connection a protocol event came from.
    pub fn connection(&self) -> Option<&Arc<Connection>> {
        match self {
            Event::Connected { irc }
            | Event::Disconnected { irc }
            | Event::ServerMessage { irc, .. }
            | Event::Ping { irc, .. }
            | Event::Error { irc, .. }
            | Event::PrivateMessage { irc, .. }
            | Event::ChannelMessage { irc, .. }
            | Event::PrivateNotice { irc, .. }
            | Event::ChannelNotice { irc, .. }
            | Event::Join { irc, .. }
            | Event::Part { irc, .. }
            | Event::Kick { irc, .. }
            | Event::Quit { irc, .. }
            | Event::NickChange { irc, .. }
            | Event::ModeChange { irc, .. }
            | Event::RawLineSent { irc, .. }
            | Event::RawLineReceived { irc, .. }
            | Event::Command { irc, .. } => Some(irc),
            Event::ModuleLoading { .. }
            | Event::ModuleLoaded { .. }
            | Event::ModuleUnloading { .. }
            | Event::ModuleUnloaded { .. } => None,
        }
    }

    /// Where a reply to this event goes: the channel for channel traffic,
    /// the sender for private traffic.
    pub fn reply_target(&self) -> Option<&str> {
        match self {
            Event::PrivateMessage { sender, .. } => Some(&sender.nick),
            Event::ChannelMessage { channel, .. } => Some(channel),
            Event::Command {
                sender, channel, ..
            } => Some(channel.as_deref().unwrap_or(&sender.nick)),
            _ => None,
        }
    }

    /// Send `text` back where the event came from. Only messages and
    /// commands can be replied to; other events return `Ok(false)`.
    pub fn reply(&self, text: &str) -> Result<bool, ConnectionError> {
        match (self.connection(), self.reply_target()) {
            (Some(irc), Some(target)) => {
                irc.message(target, text)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl BusEvent for Event {
    fn name(&self) -> Cow<'_, str> {
        Event::name(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_event_names() {
        let ev = Event::ModuleLoaded {
            module: "ping".into(),
        };
        assert_eq!(ev.name(), "module.loaded");
        assert!(ev.connection().is_none());
        assert!(ev.reply_target().is_none());
        assert!(!ev.reply("x").unwrap());
    }

    #[test]
    fn test_command_name() {
        assert_eq!(names::command("help"), "command.help");
    }
}
