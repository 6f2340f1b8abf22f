use std::sync::Arc;

use tracing::debug;

use crate::event::{Event, names};
use crate::irc::{Connection, UserInfo};
use crate::modules::{Module, ModuleContext, Publisher};

/// Turns prefixed messages into `command.<name>` events.
///
/// `?seen alice` in `#rust` publishes `command.seen` with `args = "alice"`
/// and `channel = Some("#rust")`.
pub struct Commands {
    prefix: Arc<str>,
}

impl Commands {
    pub fn new(prefix: impl Into<Arc<str>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

/// Split `text` into a command name and its trimmed arguments, if it starts
/// with `prefix` directly followed by a word.
pub(crate) fn split_command<'a>(prefix: &str, text: &'a str) -> Option<(&'a str, &'a str)> {
    let rest = text.strip_prefix(prefix)?;
    let (name, args) = rest.split_once(' ').unwrap_or((rest, ""));
    if name.is_empty() {
        return None;
    }
    Some((name, args.trim()))
}

fn publish(
    publisher: &Publisher,
    prefix: &str,
    irc: &Arc<Connection>,
    sender: &UserInfo,
    channel: Option<&str>,
    text: &str,
) {
    let Some((name, args)) = split_command(prefix, text) else {
        return;
    };
    debug!(network = irc.name(), command = name, sender = %sender.nick, "bot command");
    publisher.trigger(Event::Command {
        irc: Arc::clone(irc),
        sender: sender.clone(),
        channel: channel.map(str::to_owned),
        name: name.to_owned(),
        args: args.to_owned(),
    });
}

impl Module for Commands {
    fn name(&self) -> &str {
        "commands"
    }

    fn init(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        let publisher = ctx.publisher();
        let prefix = Arc::clone(&self.prefix);
        ctx.on(names::PRIVATE_MESSAGE, move |event| {
            if let Event::PrivateMessage { irc, sender, text } = event {
                publish(&publisher, &prefix, irc, sender, None, text);
            }
            Ok(())
        });

        let publisher = ctx.publisher();
        let prefix = Arc::clone(&self.prefix);
        ctx.on(names::CHANNEL_MESSAGE, move |event| {
            if let Event::ChannelMessage {
                irc,
                sender,
                channel,
                text,
            } = event
            {
                publish(&publisher, &prefix, irc, sender, Some(channel.as_str()), text);
            }
            Ok(())
        });
        Ok(())
    }
}
