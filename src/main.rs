//! prebot - modular IRC bot.
//!
//! Usage: `prebot [config.toml]` (default `prebot.toml`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use prebot::config::{self, Config};
use prebot::modules::builtin;
use prebot::{Connection, Context, ModuleManager, telemetry};
use tracing::{error, info, warn};

const QUIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

fn has_pending_writes(ctx: &Context, irc: &Connection) -> bool {
    irc.socket()
        .and_then(|handle| ctx.pool.pending_writes(handle))
        .is_some_and(|bytes| bytes > 0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "prebot.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    info!(
        networks = config.enabled_networks().count(),
        modules = ?config.bot.modules,
        "Starting prebot"
    );

    let ctx = Context::from_config(&config).context("failed to create socket pool")?;
    let reactor = ctx.pool.spawn().context("failed to start reactor thread")?;

    let manager = ModuleManager::new(Arc::clone(&ctx.bus));
    for name in &config.bot.modules {
        // Names were validated above.
        let Some(module) = builtin::create(name, &config) else {
            continue;
        };
        if let Err(e) = manager.load(module) {
            error!(module = %name, error = %e, "Failed to load module");
        }
    }

    let connections: Vec<Arc<Connection>> = config
        .enabled_networks()
        .map(|network| Connection::new(network.clone(), ctx.clone()))
        .collect();

    // Resolution and connect block; keep them off the runtime workers.
    for irc in &connections {
        let irc = Arc::clone(irc);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = irc.connect() {
                error!(network = irc.name(), error = %e, "Failed to connect");
            }
        });
    }

    let event_wait = config.bot.event_wait();
    ctx.bus.run_until(event_wait, tokio::signal::ctrl_c()).await;
    info!("Shutdown requested");

    for irc in &connections {
        if irc.status().is_online()
            && let Err(e) = irc.quit(Some("Shutting down"))
        {
            warn!(network = irc.name(), error = %e, "QUIT failed");
        }
    }
    // Give the reactor a moment to flush the QUITs.
    let deadline = Instant::now() + QUIT_FLUSH_TIMEOUT;
    while Instant::now() < deadline && connections.iter().any(|irc| has_pending_writes(&ctx, irc)) {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    ctx.bus.poll();

    manager.unload_all();
    ctx.bus.poll();

    ctx.pool.stop();
    if reactor.join().is_err() {
        warn!("Reactor thread panicked");
    }
    for irc in &connections {
        irc.close();
    }

    info!("Shutdown complete");
    Ok(())
}
