//! Connection lifecycle and outbound commands.
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──socket up──► Connected
//!      ▲                          │                        │ registration numeric
//!      │                          │ all addresses failed   ▼
//!      └───────── EOF / error / close() ◄──────────── Registered
//! ```
//!
//! The session lock is always taken before the socket pool's table lock and
//! never held while an event is published or bytes are enqueued.

use std::fmt;
use std::net::{TcpStream as StdTcpStream, ToSocketAddrs};
use std::sync::{Arc, Weak};

use mio::net::TcpStream;
use parking_lot::Mutex;
use prebot_proto::{Command, Isupport, IsupportValue, irc_eq};
use tracing::{debug, info, trace, warn};

use super::state::{ChannelInfo, Tracker, UserInfo};
use crate::config::NetworkConfig;
use crate::context::Context;
use crate::error::{ConnectionError, ReactorError};
use crate::event::Event;
use crate::reactor::{Callbacks, SocketHandle, SocketPool};
use crate::telemetry::spans;

/// Where a connection is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Socket is up, registration not yet confirmed.
    Connected,
    Registered,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Registered => "registered",
        }
    }

    /// Whether a socket is attached.
    pub fn is_online(self) -> bool {
        matches!(self, Self::Connected | Self::Registered)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub(super) struct Session {
    pub state: ConnectionState,
    pub socket: Option<SocketHandle>,
    pub nick: String,
    pub isupport: Isupport,
    pub tracker: Tracker,
}

impl Session {
    /// Drop everything learned from the server.
    fn reset(&mut self) {
        self.socket = None;
        self.isupport.clear();
        self.tracker.clear();
    }
}

/// One IRC network session.
pub struct Connection {
    settings: NetworkConfig,
    pub(super) ctx: Context,
    pub(super) this: Weak<Connection>,
    pub(super) session: Mutex<Session>,
}

impl Connection {
    pub fn new(settings: NetworkConfig, ctx: Context) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            session: Mutex::new(Session {
                nick: settings.primary_nick().to_owned(),
                ..Session::default()
            }),
            settings,
            ctx,
            this: this.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the socket and start registration. Does nothing unless the
    /// connection is [`ConnectionState::Disconnected`].
    ///
    /// Blocks while resolving and connecting; each resolved address is
    /// tried in turn until one accepts.
    pub fn connect(&self) -> Result<(), ConnectionError> {
        {
            let mut session = self.session.lock();
            if session.state != ConnectionState::Disconnected {
                debug!(network = %self.settings.name, state = %session.state, "connect ignored");
                return Ok(());
            }
            session.state = ConnectionState::Connecting;
        }

        let span = spans::network(&self.settings.name, &self.settings.host, self.settings.port);
        let _enter = span.enter();

        if let Err(e) = self.attach() {
            self.session.lock().state = ConnectionState::Disconnected;
            warn!(error = %e, code = e.error_code(), "connect failed");
            return Err(e);
        }
        info!(nick = %self.current_nick(), "connected, registering");

        if let Some(password) = &self.settings.password {
            self.send(&Command::Pass(password.clone()))?;
        }
        self.send(&Command::Nick(self.current_nick()))?;
        self.send(&Command::User {
            user: self.settings.user.clone(),
            realname: self.settings.realname.clone(),
        })
    }

    fn open_stream(&self) -> Result<StdTcpStream, ConnectionError> {
        let host = &self.settings.host;
        let port = self.settings.port;
        let addrs = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|source| ConnectionError::Resolve {
                host: host.clone(),
                source,
            })?;

        for addr in addrs {
            match StdTcpStream::connect_timeout(&addr, self.ctx.engine.connect_timeout) {
                Ok(stream) => {
                    debug!(%addr, "tcp connection established");
                    return Ok(stream);
                }
                Err(e) => warn!(%addr, error = %e, "connection attempt failed"),
            }
        }
        Err(ConnectionError::Unreachable {
            host: host.clone(),
            port,
        })
    }

    /// Connect and hand the socket to the pool. The session lock is held
    /// across registration so a readiness callback never sees a half-set
    /// session.
    fn attach(&self) -> Result<(), ConnectionError> {
        let stream = self.open_stream()?;
        stream.set_nonblocking(true).map_err(ReactorError::Io)?;
        if let Err(e) = stream.set_nodelay(true) {
            trace!(error = %e, "set_nodelay failed");
        }

        let readable = self.this.clone();
        let errored = self.this.clone();
        let callbacks = Callbacks::new()
            .on_readable(move |pool, handle| {
                if let Some(conn) = readable.upgrade() {
                    conn.on_readable(pool, handle);
                }
            })
            .on_other(move |_, handle| {
                if let Some(conn) = errored.upgrade() {
                    warn!(network = %conn.settings.name, %handle, "socket error");
                    conn.teardown(handle);
                }
            });

        let mut session = self.session.lock();
        let handle = self.ctx.pool.add(TcpStream::from_std(stream), callbacks)?;
        session.reset();
        session.socket = Some(handle);
        session.state = ConnectionState::Connected;
        session.nick = self.settings.primary_nick().to_owned();
        Ok(())
    }

    fn on_readable(&self, pool: &SocketPool, handle: SocketHandle) {
        if self.session.lock().socket != Some(handle) {
            trace!(network = %self.settings.name, %handle, "readable on stale handle");
            return;
        }

        loop {
            match pool.read_line(handle) {
                Ok(Some(line)) => self.handle_line(&line),
                Ok(None) => break,
                Err(ReactorError::Closed) => {
                    info!(network = %self.settings.name, "server closed the connection");
                    self.teardown(handle);
                    break;
                }
                Err(e) => {
                    warn!(network = %self.settings.name, error = %e, "receive failed");
                    self.teardown(handle);
                    break;
                }
            }
        }
    }

    /// Common disconnect path: reset state, close the socket, publish
    /// `disconnected`. Ignores handles that are no longer current.
    fn teardown(&self, handle: SocketHandle) {
        {
            let mut session = self.session.lock();
            if session.socket != Some(handle) {
                return;
            }
            session.reset();
            session.state = ConnectionState::Disconnected;
        }
        self.ctx.pool.close(handle);
        info!(network = %self.settings.name, "disconnected");

        if let Some(irc) = self.this.upgrade() {
            self.ctx.bus.trigger(Event::Disconnected { irc });
        }
    }

    /// Close the socket immediately, discarding queued writes. Returns
    /// whether a socket was open.
    pub fn close(&self) -> bool {
        let handle = self.session.lock().socket;
        match handle {
            Some(handle) => {
                self.teardown(handle);
                true
            }
            None => false,
        }
    }

    /// Send QUIT. The server closing the socket completes the disconnect.
    pub fn quit(&self, reason: Option<&str>) -> Result<(), ConnectionError> {
        self.send(&Command::Quit(reason.map(str::to_owned)))
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Queue one protocol line. Anything from the first CR or LF on is
    /// cut off so a caller cannot smuggle a second command.
    pub fn raw(&self, line: &str) -> Result<(), ConnectionError> {
        let line = line.split(['\r', '\n']).next().unwrap_or_default();
        let handle = self
            .session
            .lock()
            .socket
            .ok_or(ConnectionError::NotConnected)?;

        debug!(network = %self.settings.name, ">> {}", line);
        if let Some(irc) = self.this.upgrade() {
            self.ctx.bus.trigger(Event::RawLineSent {
                irc,
                line: line.to_owned(),
            });
        }
        self.ctx.pool.enqueue_write(handle, format!("{line}\r\n"))?;
        Ok(())
    }

    pub fn send(&self, command: &Command) -> Result<(), ConnectionError> {
        self.raw(&command.to_string())
    }

    /// JOIN, unless already in the channel.
    pub fn join(&self, channel: &str) -> Result<(), ConnectionError> {
        if self.session.lock().tracker.has_channel(channel) {
            return Ok(());
        }
        self.send(&Command::Join(channel.to_owned()))
    }

    /// PART, unless not in the channel.
    pub fn part(&self, channel: &str, reason: Option<&str>) -> Result<(), ConnectionError> {
        if !self.session.lock().tracker.has_channel(channel) {
            return Ok(());
        }
        self.send(&Command::Part {
            channel: channel.to_owned(),
            reason: reason.map(str::to_owned),
        })
    }

    /// Request a nickname change. Before registration the server does not
    /// confirm NICK, so the current nick changes right away.
    pub fn nick(&self, new_nick: &str) -> Result<(), ConnectionError> {
        self.send(&Command::Nick(new_nick.to_owned()))?;
        let mut session = self.session.lock();
        if session.state != ConnectionState::Registered {
            session.nick = new_nick.to_owned();
        }
        Ok(())
    }

    /// PRIVMSG, one per line of `text`. Empty lines are skipped.
    pub fn message(&self, target: &str, text: &str) -> Result<(), ConnectionError> {
        for line in split_lines(text) {
            self.send(&Command::Privmsg {
                target: target.to_owned(),
                text: line.to_owned(),
            })?;
        }
        Ok(())
    }

    /// NOTICE, one per line of `text`. Empty lines are skipped.
    pub fn notice(&self, target: &str, text: &str) -> Result<(), ConnectionError> {
        for line in split_lines(text) {
            self.send(&Command::Notice {
                target: target.to_owned(),
                text: line.to_owned(),
            })?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Configured network label.
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &NetworkConfig {
        &self.settings
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn status(&self) -> ConnectionState {
        self.session.lock().state
    }

    pub fn socket(&self) -> Option<SocketHandle> {
        self.session.lock().socket
    }

    pub fn current_nick(&self) -> String {
        self.session.lock().nick.clone()
    }

    /// Whether `nick` is the bot's own current nickname.
    pub fn is_me(&self, nick: &str) -> bool {
        irc_eq(nick, &self.session.lock().nick)
    }

    /// `NETWORK` name advertised by the server.
    pub fn network(&self) -> Option<String> {
        self.session.lock().isupport.network().map(str::to_owned)
    }

    pub fn isupport(&self, key: &str) -> Option<IsupportValue> {
        self.session.lock().isupport.get(key).cloned()
    }

    /// Names of the channels the bot is in.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .session
            .lock()
            .tracker
            .channels()
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn channel(&self, name: &str) -> Option<ChannelInfo> {
        self.session.lock().tracker.channel(name).cloned()
    }

    pub fn users(&self) -> Vec<UserInfo> {
        let mut users: Vec<UserInfo> = self.session.lock().tracker.users().cloned().collect();
        users.sort_by(|a, b| a.nick.cmp(&b.nick));
        users
    }

    pub fn user(&self, nick: &str) -> Option<UserInfo> {
        self.session.lock().tracker.user(nick).cloned()
    }
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\r', '\n']).filter(|line| !line.is_empty())
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.session.lock();
        f.debug_struct("Connection")
            .field("name", &self.settings.name)
            .field("host", &self.settings.host)
            .field("port", &self.settings.port)
            .field("state", &session.state)
            .field("nick", &session.nick)
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(handle) = self.session.get_mut().socket.take() {
            self.ctx.pool.close(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::context::EngineSettings;
    use std::time::Duration;

    fn connection() -> Arc<Connection> {
        let pool = SocketPool::new(Duration::from_millis(10)).unwrap();
        let ctx = Context::new(Arc::new(pool), Arc::new(EventBus::new()), EngineSettings::default());
        Connection::new(NetworkConfig::new("test", "127.0.0.1", 6667, "prebot"), ctx)
    }

    #[test]
    fn test_fresh_connection() {
        let conn = connection();
        assert_eq!(conn.status(), ConnectionState::Disconnected);
        assert_eq!(conn.current_nick(), "prebot");
        assert!(conn.is_me("PREBOT"));
        assert!(conn.socket().is_none());
        assert!(conn.channels().is_empty());
    }

    #[test]
    fn test_send_requires_socket() {
        let conn = connection();
        assert!(matches!(conn.raw("PING x"), Err(ConnectionError::NotConnected)));
        assert!(matches!(
            conn.message("#c", "hi"),
            Err(ConnectionError::NotConnected)
        ));
        assert!(!conn.close());
    }

    #[test]
    fn test_part_when_not_member_is_noop() {
        let conn = connection();
        assert!(conn.part("#nowhere", None).is_ok());
    }

    #[test]
    fn test_split_lines() {
        let lines: Vec<&str> = split_lines("one\r\ntwo\n\nthree").collect();
        assert_eq!(lines, vec!["one", "two", "three"]);
        assert_eq!(split_lines("").count(), 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Registered.to_string(), "registered");
        assert!(ConnectionState::Connected.is_online());
        assert!(!ConnectionState::Connecting.is_online());
    }
}
