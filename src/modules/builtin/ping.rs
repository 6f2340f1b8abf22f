use prebot_proto::Command;

use crate::event::{Event, names};
use crate::modules::{Module, ModuleContext};

/// Answers server `PING` with `PONG` carrying the same token.
pub struct Ping;

impl Module for Ping {
    fn name(&self) -> &str {
        "ping"
    }

    fn init(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        ctx.on(names::PING, |event| {
            if let Event::Ping { irc, sender } = event {
                irc.send(&Command::Pong(sender.clone()))?;
            }
            Ok(())
        });
        Ok(())
    }
}
