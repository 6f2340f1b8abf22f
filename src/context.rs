//! Explicitly passed process context.
//!
//! One socket pool and one event bus exist per process. Instead of ambient
//! globals they travel inside a [`Context`] handed to every connection and
//! module.

use std::sync::Arc;
use std::time::Duration;

use crate::bus::EventBus;
use crate::config::Config;
use crate::error::ReactorError;
use crate::event::Event;
use crate::reactor::SocketPool;

/// Protocol engine knobs shared by every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Numeric that completes registration.
    pub registered_numeric: u16,
    /// TCP connect timeout per resolved address.
    pub connect_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            registered_numeric: 1,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared handles. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct Context {
    pub pool: Arc<SocketPool>,
    pub bus: Arc<EventBus<Event>>,
    pub engine: Arc<EngineSettings>,
}

impl Context {
    pub fn new(pool: Arc<SocketPool>, bus: Arc<EventBus<Event>>, engine: EngineSettings) -> Self {
        Self {
            pool,
            bus,
            engine: Arc::new(engine),
        }
    }

    /// Build a fresh pool and bus from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ReactorError> {
        let pool = SocketPool::new(config.reactor.poll_timeout())?;
        Ok(Self::new(
            Arc::new(pool),
            Arc::new(EventBus::new()),
            EngineSettings {
                registered_numeric: config.bot.registered_numeric,
                connect_timeout: config.reactor.connect_timeout(),
            },
        ))
    }
}
