//! Inbound line handling: parse, update state, publish.
//!
//! State changes are made under the session lock; events are published
//! only after it has been released.

use std::sync::Arc;

use prebot_proto::{ChanModes, Message, Prefix, Response, irc_eq, parse_mode_changes};
use tracing::{debug, info, trace, warn};

use super::connection::{Connection, ConnectionState};
use crate::event::Event;

/// Which kind of text message a PRIVMSG/NOTICE is.
#[derive(Clone, Copy, PartialEq, Eq)]
enum TextKind {
    Message,
    Notice,
}

impl Connection {
    /// Process one line received from the server.
    ///
    /// Malformed lines and unknown commands are logged and dropped; nothing
    /// here tears the connection down.
    pub fn handle_line(&self, line: &str) {
        let Some(irc) = self.this.upgrade() else {
            return;
        };
        debug!(network = %self.name(), "<< {}", line);
        self.ctx.bus.trigger(Event::RawLineReceived {
            irc: Arc::clone(&irc),
            line: line.to_owned(),
        });

        let msg = match Message::parse(line) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(network = %self.name(), error = %e, "dropping malformed line");
                return;
            }
        };

        if let Some(code) = msg.numeric() {
            self.on_numeric(irc, code, &msg);
            return;
        }

        match msg.command.to_ascii_uppercase().as_str() {
            "PING" => self.on_ping(irc, &msg),
            "ERROR" => self.on_error(irc, &msg),
            "PRIVMSG" => self.on_text(irc, &msg, TextKind::Message),
            "NOTICE" => self.on_text(irc, &msg, TextKind::Notice),
            "JOIN" => self.on_join(irc, &msg),
            "PART" => self.on_part(irc, &msg),
            "KICK" => self.on_kick(irc, &msg),
            "QUIT" => self.on_quit(irc, &msg),
            "NICK" => self.on_nick(irc, &msg),
            "MODE" => self.on_mode(irc, &msg),
            other => debug!(network = %self.name(), command = other, "unhandled command"),
        }
    }

    fn on_numeric(&self, irc: Arc<Connection>, code: u16, msg: &Message) {
        let registered_numeric = self.ctx.engine.registered_numeric;
        let became_registered = {
            let mut session = self.session.lock();
            match Response::from_code(code) {
                Some(Response::RPL_WELCOME) => {
                    if let Some(nick) = msg.params.first() {
                        session.nick.clone_from(nick);
                    }
                }
                Some(Response::RPL_ISUPPORT) => session.isupport.merge_reply(&msg.params),
                Some(Response::RPL_NAMREPLY) => names_reply(&mut session, msg),
                _ => {}
            }

            if code == registered_numeric && session.state == ConnectionState::Connected {
                session.state = ConnectionState::Registered;
                true
            } else {
                false
            }
        };

        self.ctx.bus.trigger(Event::ServerMessage {
            irc: Arc::clone(&irc),
            sender: msg.sender().unwrap_or_else(|| Prefix::bare("")),
            code,
            params: msg.args().map(str::to_owned).collect(),
        });

        if became_registered {
            info!(network = %self.name(), nick = %self.current_nick(), "registered");
            self.ctx.bus.trigger(Event::Connected { irc });
        }
    }

    fn on_ping(&self, irc: Arc<Connection>, msg: &Message) {
        let token = msg.last_arg().unwrap_or_default().to_owned();
        trace!(network = %self.name(), %token, "ping");
        self.ctx.bus.trigger(Event::Ping { irc, sender: token });
    }

    fn on_error(&self, irc: Arc<Connection>, msg: &Message) {
        let reason = msg.last_arg().unwrap_or_default().to_owned();
        warn!(network = %self.name(), %reason, "server error");
        self.ctx.bus.trigger(Event::Error { irc, reason });
    }

    fn on_text(&self, irc: Arc<Connection>, msg: &Message, kind: TextKind) {
        let (Some(prefix), Some(target), Some(text)) = (msg.sender(), msg.arg(0), msg.arg(1)) else {
            debug!(network = %self.name(), command = %msg.command, "text message without sender or target");
            return;
        };

        let (sender, to_me) = {
            let mut session = self.session.lock();
            let to_me = irc_eq(target, &session.nick);
            let to_channel = target
                .chars()
                .next()
                .is_some_and(|c| session.isupport.chantypes().contains(c));
            if !to_me && !to_channel {
                drop(session);
                match kind {
                    TextKind::Message => {
                        warn!(network = %self.name(), %target, "message for unrecognized recipient")
                    }
                    TextKind::Notice => {
                        debug!(network = %self.name(), %target, "notice for unrecognized recipient")
                    }
                }
                return;
            }
            (session.tracker.observe_sender(&prefix), to_me)
        };

        let text = text.to_owned();
        let event = match (to_me, kind) {
            (true, TextKind::Message) => Event::PrivateMessage { irc, sender, text },
            (true, TextKind::Notice) => Event::PrivateNotice { irc, sender, text },
            (false, TextKind::Message) => Event::ChannelMessage {
                irc,
                sender,
                channel: target.to_owned(),
                text,
            },
            (false, TextKind::Notice) => Event::ChannelNotice {
                irc,
                sender,
                channel: target.to_owned(),
                text,
            },
        };
        self.ctx.bus.trigger(event);
    }

    fn on_join(&self, irc: Arc<Connection>, msg: &Message) {
        let (Some(prefix), Some(channel)) = (msg.sender(), msg.arg(0)) else {
            return;
        };

        let sender = {
            let mut session = self.session.lock();
            if irc_eq(&prefix.nick, &session.nick) {
                session.tracker.add_channel(channel);
                info!(network = %self.name(), %channel, "joined");
            }
            session.tracker.add_member(channel, &prefix.nick, "");
            session.tracker.update_user(&prefix)
        };

        self.ctx.bus.trigger(Event::Join {
            irc,
            sender,
            channel: channel.to_owned(),
        });
    }

    fn on_part(&self, irc: Arc<Connection>, msg: &Message) {
        let (Some(prefix), Some(channel)) = (msg.sender(), msg.arg(0)) else {
            return;
        };

        let sender = {
            let mut session = self.session.lock();
            let sender = session.tracker.update_user(&prefix);
            if irc_eq(&prefix.nick, &session.nick) {
                session.tracker.remove_channel(channel);
                info!(network = %self.name(), %channel, "parted");
            } else {
                session.tracker.remove_member(channel, &prefix.nick);
            }
            sender
        };

        self.ctx.bus.trigger(Event::Part {
            irc,
            sender,
            channel: channel.to_owned(),
            reason: msg.arg(1).map(str::to_owned),
        });
    }

    fn on_kick(&self, irc: Arc<Connection>, msg: &Message) {
        let (Some(prefix), Some(channel), Some(nick)) = (msg.sender(), msg.arg(0), msg.arg(1)) else {
            return;
        };

        let sender = {
            let mut session = self.session.lock();
            let sender = session.tracker.update_user(&prefix);
            if irc_eq(nick, &session.nick) {
                session.tracker.remove_channel(channel);
                warn!(network = %self.name(), %channel, by = %prefix.nick, "kicked");
            } else {
                session.tracker.remove_member(channel, nick);
            }
            sender
        };

        self.ctx.bus.trigger(Event::Kick {
            irc,
            sender,
            channel: channel.to_owned(),
            nick: nick.to_owned(),
            reason: msg.arg(2).map(str::to_owned),
        });
    }

    fn on_quit(&self, irc: Arc<Connection>, msg: &Message) {
        let Some(prefix) = msg.sender() else {
            return;
        };

        let sender = {
            let mut session = self.session.lock();
            let sender = session.tracker.update_user(&prefix);
            session.tracker.remove_user(&prefix.nick);
            sender
        };

        self.ctx.bus.trigger(Event::Quit {
            irc,
            sender,
            reason: msg.arg(0).map(str::to_owned),
        });
    }

    fn on_nick(&self, irc: Arc<Connection>, msg: &Message) {
        let (Some(prefix), Some(new_nick)) = (msg.sender(), msg.arg(0)) else {
            return;
        };

        let sender = {
            let mut session = self.session.lock();
            let sender = session.tracker.update_user(&prefix);
            session.tracker.rename_user(&prefix.nick, new_nick);
            if irc_eq(&prefix.nick, &session.nick) {
                session.nick = new_nick.to_owned();
                info!(network = %self.name(), nick = %new_nick, "nick changed");
            }
            sender
        };

        self.ctx.bus.trigger(Event::NickChange {
            irc,
            sender,
            new_nick: new_nick.to_owned(),
        });
    }

    fn on_mode(&self, irc: Arc<Connection>, msg: &Message) {
        let (Some(target), Some(modes)) = (msg.arg(0), msg.arg(1)) else {
            return;
        };
        let sender = msg.sender().unwrap_or_else(|| Prefix::bare(""));
        let args: Vec<&str> = msg.args().skip(2).collect();

        let changes = {
            let mut guard = self.session.lock();
            let session = &mut *guard;
            if sender.is_full() {
                session.tracker.update_user(&sender);
            }

            let is_channel = target
                .chars()
                .next()
                .is_some_and(|c| session.isupport.chantypes().contains(c));
            let prefix = session.isupport.prefix();
            let chanmodes = session.isupport.chanmodes().unwrap_or(ChanModes::DEFAULT);
            let changes = parse_mode_changes(modes, &args, &prefix, &chanmodes, is_channel);

            if is_channel {
                for change in &changes {
                    if let Some(nick) = change.arg.as_deref()
                        && prefix.is_prefix_mode(change.mode)
                    {
                        session
                            .tracker
                            .set_member_mode(target, nick, change.mode, change.set, prefix.modes);
                    }
                }
            }
            changes
        };

        self.ctx.bus.trigger(Event::ModeChange {
            irc,
            sender,
            target: target.to_owned(),
            changes,
        });
    }
}

/// `353 <me> <symbol> <channel> :[prefix]nick ...`; the symbol is optional
/// on some servers, so the channel is the last middle parameter.
fn names_reply(session: &mut super::connection::Session, msg: &Message) {
    let (Some(channel), Some(names)) = (msg.params.last(), msg.trailing.as_deref()) else {
        return;
    };
    let prefix = session.isupport.prefix();

    for entry in names.split(' ').filter(|e| !e.is_empty()) {
        let (modes, mask) = prefix.strip_symbols(entry);
        let who = Prefix::parse(mask);
        if session.tracker.add_member(channel, &who.nick, &modes) && who.is_full() {
            session.tracker.update_user(&who);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bus::EventBus;
    use crate::config::NetworkConfig;
    use crate::context::{Context, EngineSettings};
    use crate::reactor::SocketPool;

    fn connection() -> Arc<Connection> {
        let pool = SocketPool::new(Duration::from_millis(10)).unwrap();
        let ctx = Context::new(Arc::new(pool), Arc::new(EventBus::new()), EngineSettings::default());
        Connection::new(NetworkConfig::new("test", "127.0.0.1", 6667, "prebot"), ctx)
    }

    #[test]
    fn test_unrouted_and_server_senders_are_not_tracked() {
        let conn = connection();
        conn.handle_line(":irc.example.net NOTICE * :*** Looking up your hostname");
        conn.handle_line(":irc.example.net NOTICE prebot :welcome");
        conn.handle_line(":alice!a@h PRIVMSG someoneelse :not for us");

        assert!(conn.users().is_empty());
        // Three raw lines plus the one private notice.
        assert_eq!(conn.context().bus.pending(), 4);
    }

    #[test]
    fn test_routed_full_mask_is_tracked() {
        let conn = connection();
        conn.handle_line(":alice!a@h PRIVMSG prebot :hello");

        let users = conn.users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].mask(), "alice!a@h");
    }
}
