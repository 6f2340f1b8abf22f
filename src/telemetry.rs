//! Tracing setup and span constructors.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` overrides the `info`
/// default.
///
/// Calling this twice is harmless; the second subscriber is discarded.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .try_init();
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Span covering one network's connection lifetime operations.
    pub fn network(name: &str, host: &str, port: u16) -> Span {
        info_span!("network", name = %name, host = %host, port = port)
    }

    /// Span covering the dispatch of one event to its handlers.
    pub fn dispatch(event: &str, handlers: usize) -> Span {
        debug_span!("dispatch", event = %event, handlers = handlers)
    }
}
