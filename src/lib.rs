//! prebot - a modular IRC bot framework.
//!
//! Three layers, bottom up:
//!
//! - [`reactor`]: a readiness-driven [`SocketPool`] that owns every socket,
//!   queues outbound bytes and invokes per-socket callbacks.
//! - [`irc`]: the protocol engine. A [`Connection`] registers with a server,
//!   parses inbound lines, tracks users and channels and turns traffic into
//!   [`Event`]s.
//! - [`bus`]: a deferred, name-keyed [`EventBus`] that decouples the engine
//!   from behavior [`modules`].
//!
//! The pool and the bus are shared through an explicitly passed
//! [`Context`].

pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod irc;
pub mod modules;
pub mod reactor;
pub mod telemetry;

pub use crate::bus::{EventBus, Owner};
pub use crate::context::{Context, EngineSettings};
pub use crate::error::{ConnectionError, ReactorError};
pub use crate::event::Event;
pub use crate::irc::{Connection, ConnectionState};
pub use crate::modules::{Module, ModuleContext, ModuleManager};
pub use crate::reactor::{Callbacks, SocketHandle, SocketPool};
