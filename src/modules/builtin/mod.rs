//! Modules shipped with the bot.

mod autojoin;
mod commands;
mod nick_fallback;
mod ping;

use std::sync::Arc;

pub use self::autojoin::AutoJoin;
pub use self::commands::Commands;
pub use self::nick_fallback::{NickFallback, next_nick};
pub use self::ping::Ping;

use super::Module;
use crate::config::Config;

/// Names accepted in `bot.modules`.
pub const NAMES: &[&str] = &["ping", "autojoin", "commands", "nick-fallback"];

/// Build the built-in module called `name`.
pub fn create(name: &str, config: &Config) -> Option<Arc<dyn Module>> {
    let module: Arc<dyn Module> = match name {
        "ping" => Arc::new(Ping),
        "autojoin" => Arc::new(AutoJoin),
        "commands" => Arc::new(Commands::new(config.bot.command_prefix.clone())),
        "nick-fallback" => Arc::new(NickFallback),
        _ => return None,
    };
    Some(module)
}
