use prebot_proto::{Response, irc_eq, is_valid_nick};
use tracing::{info, warn};

use crate::event::{Event, names};
use crate::irc::ConnectionState;
use crate::modules::{Module, ModuleContext};

/// Picks another nickname when the server rejects ours during registration.
pub struct NickFallback;

/// The nickname to try after `attempted` was refused: the next configured
/// one, or `attempted` with `_` appended once the list is exhausted.
pub fn next_nick(configured: &[String], attempted: &str) -> String {
    configured
        .iter()
        .position(|n| irc_eq(n, attempted))
        .and_then(|i| configured.get(i + 1))
        .cloned()
        .unwrap_or_else(|| format!("{attempted}_"))
}

impl Module for NickFallback {
    fn name(&self) -> &str {
        "nick-fallback"
    }

    fn init(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        ctx.on(names::SERVER_MESSAGE, |event| {
            let Event::ServerMessage {
                irc, code, params, ..
            } = event
            else {
                return Ok(());
            };
            if Response::from_code(*code) != Some(Response::ERR_NICKNAMEINUSE)
                || irc.status() == ConnectionState::Registered
            {
                return Ok(());
            }

            // 433 <current> <attempted> :Nickname is already in use
            let attempted = params.get(1).map_or_else(|| irc.current_nick(), Clone::clone);
            let next = next_nick(&irc.settings().nicks, &attempted);
            if !is_valid_nick(&next) {
                warn!(network = irc.name(), nick = %next, "no usable nickname left");
                return Ok(());
            }
            info!(network = irc.name(), taken = %attempted, nick = %next, "nickname in use");
            irc.nick(&next)?;
            Ok(())
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nicks(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_walks_configured_list() {
        let configured = nicks(&["prebot", "prebot2"]);
        assert_eq!(next_nick(&configured, "prebot"), "prebot2");
        assert_eq!(next_nick(&configured, "PREBOT"), "prebot2");
    }

    #[test]
    fn test_appends_underscore_when_exhausted() {
        let configured = nicks(&["prebot", "prebot2"]);
        assert_eq!(next_nick(&configured, "prebot2"), "prebot2_");
        assert_eq!(next_nick(&configured, "prebot2_"), "prebot2__");
        assert_eq!(next_nick(&[], "bot"), "bot_");
    }
}
