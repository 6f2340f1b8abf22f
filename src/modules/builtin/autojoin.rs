use tracing::debug;

use crate::event::{Event, names};
use crate::modules::{Module, ModuleContext};

/// Joins the network's configured channels once registration completes.
pub struct AutoJoin;

impl Module for AutoJoin {
    fn name(&self) -> &str {
        "autojoin"
    }

    fn init(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        ctx.on(names::CONNECTED, |event| {
            let Event::Connected { irc } = event else {
                return Ok(());
            };
            for channel in &irc.settings().channels {
                debug!(network = irc.name(), channel = %channel, "autojoin");
                irc.join(channel)?;
            }
            Ok(())
        });
        Ok(())
    }
}
