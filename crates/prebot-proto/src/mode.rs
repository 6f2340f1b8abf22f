//! Mode string decoding.
//!
//! A `MODE` line carries a compact string such as `+o-v+l alice bob 20`.
//! Which letters consume an argument depends on the server: membership
//! modes come from `PREFIX`, the rest from the four `CHANMODES` classes.

use crate::isupport::{ChanModes, PrefixSpec};

/// One decoded mode change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeChange {
    /// `true` for `+`, `false` for `-`.
    pub set: bool,
    /// Mode letter.
    pub mode: char,
    /// Argument consumed by this change, if it takes one.
    pub arg: Option<String>,
}

impl ModeChange {
    /// Change without an argument.
    pub fn new(set: bool, mode: char) -> Self {
        Self {
            set,
            mode,
            arg: None,
        }
    }

    /// Change with an argument.
    pub fn with_arg(set: bool, mode: char, arg: impl Into<String>) -> Self {
        Self {
            set,
            mode,
            arg: Some(arg.into()),
        }
    }
}

impl std::fmt::Display for ModeChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", if self.set { '+' } else { '-' }, self.mode)?;
        if let Some(arg) = &self.arg {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

fn takes_arg(mode: char, set: bool, prefix: &PrefixSpec<'_>, chanmodes: &ChanModes<'_>) -> bool {
    if prefix.is_prefix_mode(mode) || chanmodes.a.contains(mode) || chanmodes.b.contains(mode) {
        return true;
    }
    if chanmodes.c.contains(mode) {
        return set;
    }
    false
}

/// Decode `modes` with its trailing `args`.
///
/// For user targets (`is_channel == false`) no letter takes an argument.
/// A letter that should take an argument but finds none gets `None`.
/// Changes start out as `+` when the string has no leading sign.
///
/// ```
/// use prebot_proto::{parse_mode_changes, ChanModes, ModeChange, PrefixSpec};
///
/// let changes = parse_mode_changes(
///     "+ol-v",
///     &["alice", "10", "bob"],
///     &PrefixSpec::DEFAULT,
///     &ChanModes::DEFAULT,
///     true,
/// );
/// assert_eq!(changes, vec![
///     ModeChange::with_arg(true, 'o', "alice"),
///     ModeChange::with_arg(true, 'l', "10"),
///     ModeChange::with_arg(false, 'v', "bob"),
/// ]);
/// ```
pub fn parse_mode_changes<S: AsRef<str>>(
    modes: &str,
    args: &[S],
    prefix: &PrefixSpec<'_>,
    chanmodes: &ChanModes<'_>,
    is_channel: bool,
) -> Vec<ModeChange> {
    let mut args = args.iter().map(AsRef::as_ref);
    let mut set = true;
    let mut changes = Vec::with_capacity(modes.len());

    for c in modes.chars() {
        match c {
            '+' => set = true,
            '-' => set = false,
            mode => {
                let arg = if is_channel && takes_arg(mode, set, prefix, chanmodes) {
                    args.next().map(str::to_owned)
                } else {
                    None
                };
                changes.push(ModeChange { set, mode, arg });
            }
        }
    }
    changes
}
