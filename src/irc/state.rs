//! Per-connection user and channel tracking.
//!
//! Keys are RFC 1459 case-folded so `Alice`, `alice` and `ALICE` share one
//! entry; display names keep the case first seen (or last renamed to).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use prebot_proto::{Prefix, irc_eq, irc_to_lower};

/// What the connection knows about one nickname.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub nick: String,
    pub user: Option<String>,
    pub host: Option<String>,
    /// Channels shared with the bot.
    pub channels: BTreeSet<String>,
}

impl UserInfo {
    fn new(nick: &str) -> Self {
        Self {
            nick: nick.to_owned(),
            user: None,
            host: None,
            channels: BTreeSet::new(),
        }
    }

    /// Fill in identity fragments that are still unknown. Known fields are
    /// never overwritten.
    fn absorb(&mut self, prefix: &Prefix) {
        if self.user.is_none() {
            self.user.clone_from(&prefix.user);
        }
        if self.host.is_none() {
            self.host.clone_from(&prefix.host);
        }
    }

    /// `nick!user@host` as far as it is known.
    pub fn mask(&self) -> String {
        match (&self.user, &self.host) {
            (Some(user), Some(host)) => format!("{}!{}@{}", self.nick, user, host),
            _ => self.nick.clone(),
        }
    }

    fn forget_channel(&mut self, channel: &str) {
        self.channels.retain(|c| !irc_eq(c, channel));
    }
}

/// A channel member and its status modes (`o`, `v`, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub nick: String,
    /// Membership modes, highest rank first.
    pub modes: String,
}

impl Member {
    pub fn has_mode(&self, mode: char) -> bool {
        self.modes.contains(mode)
    }
}

/// A channel the bot is in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    members: BTreeMap<String, Member>,
}

impl ChannelInfo {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            members: BTreeMap::new(),
        }
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.members.contains_key(&irc_to_lower(nick))
    }

    pub fn member(&self, nick: &str) -> Option<&Member> {
        self.members.get(&irc_to_lower(nick))
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Member nicknames in case-folded order.
    pub fn nicks(&self) -> Vec<String> {
        self.members.values().map(|m| m.nick.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Insert `mode` into `modes` keeping the order given by `rank`.
fn insert_ranked(modes: &str, mode: char, rank: &str) -> String {
    let mut set: Vec<char> = modes.chars().filter(|&c| c != mode).collect();
    set.push(mode);
    set.sort_by_key(|c| rank.find(*c).unwrap_or(usize::MAX));
    set.into_iter().collect()
}

#[derive(Debug, Default)]
pub(crate) struct Tracker {
    users: HashMap<String, UserInfo>,
    channels: HashMap<String, ChannelInfo>,
}

impl Tracker {
    pub fn clear(&mut self) {
        self.users.clear();
        self.channels.clear();
    }

    /// Create or refresh the entry for a message sender and return a copy.
    pub fn update_user(&mut self, prefix: &Prefix) -> UserInfo {
        let entry = self
            .users
            .entry(irc_to_lower(&prefix.nick))
            .or_insert_with(|| UserInfo::new(&prefix.nick));
        entry.absorb(prefix);
        entry.clone()
    }

    /// Identity of a message sender. Only full `nick!user@host` masks are
    /// recorded; server names and bare nicks come back detached unless the
    /// nick is already tracked.
    pub fn observe_sender(&mut self, prefix: &Prefix) -> UserInfo {
        if prefix.is_full() {
            return self.update_user(prefix);
        }
        self.user(&prefix.nick).cloned().unwrap_or_else(|| {
            let mut info = UserInfo::new(&prefix.nick);
            info.absorb(prefix);
            info
        })
    }

    pub fn user(&self, nick: &str) -> Option<&UserInfo> {
        self.users.get(&irc_to_lower(nick))
    }

    pub fn users(&self) -> impl Iterator<Item = &UserInfo> {
        self.users.values()
    }

    /// Move a user (and its channel memberships) to a new nickname.
    pub fn rename_user(&mut self, old: &str, new: &str) -> Option<UserInfo> {
        let old_key = irc_to_lower(old);
        let new_key = irc_to_lower(new);
        let mut info = self.users.remove(&old_key)?;
        info.nick = new.to_owned();

        for name in &info.channels {
            if let Some(channel) = self.channels.get_mut(&irc_to_lower(name))
                && let Some(mut member) = channel.members.remove(&old_key)
            {
                member.nick = new.to_owned();
                channel.members.insert(new_key.clone(), member);
            }
        }

        self.users.insert(new_key, info.clone());
        Some(info)
    }

    /// Forget a user entirely (QUIT).
    pub fn remove_user(&mut self, nick: &str) -> Option<UserInfo> {
        let key = irc_to_lower(nick);
        let info = self.users.remove(&key)?;
        for name in &info.channels {
            if let Some(channel) = self.channels.get_mut(&irc_to_lower(name)) {
                channel.members.remove(&key);
            }
        }
        Some(info)
    }

    /// Start tracking a channel. Returns `false` if it was already tracked.
    pub fn add_channel(&mut self, name: &str) -> bool {
        let key = irc_to_lower(name);
        if self.channels.contains_key(&key) {
            return false;
        }
        self.channels.insert(key, ChannelInfo::new(name));
        true
    }

    /// Stop tracking a channel; members that share no other channel with
    /// the bot are forgotten.
    pub fn remove_channel(&mut self, name: &str) -> Option<ChannelInfo> {
        let channel = self.channels.remove(&irc_to_lower(name))?;
        for key in channel.members.keys() {
            self.detach(key, &channel.name);
        }
        Some(channel)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelInfo> {
        self.channels.get(&irc_to_lower(name))
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.contains_key(&irc_to_lower(name))
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelInfo> {
        self.channels.values()
    }

    /// Add `nick` to a tracked channel with initial status `modes`.
    /// Returns `false` if the channel is not tracked.
    pub fn add_member(&mut self, channel: &str, nick: &str, modes: &str) -> bool {
        let Some(info) = self.channels.get_mut(&irc_to_lower(channel)) else {
            return false;
        };
        let key = irc_to_lower(nick);
        info.members.insert(
            key.clone(),
            Member {
                nick: nick.to_owned(),
                modes: modes.to_owned(),
            },
        );
        let channel_name = info.name.clone();
        self.users
            .entry(key)
            .or_insert_with(|| UserInfo::new(nick))
            .channels
            .insert(channel_name);
        true
    }

    /// Remove `nick` from a channel. Returns whether it was a member.
    pub fn remove_member(&mut self, channel: &str, nick: &str) -> bool {
        let key = irc_to_lower(nick);
        let Some(info) = self.channels.get_mut(&irc_to_lower(channel)) else {
            return false;
        };
        if info.members.remove(&key).is_none() {
            return false;
        }
        let channel_name = info.name.clone();
        self.detach(&key, &channel_name);
        true
    }

    /// Set or clear a status mode on a member. `rank` orders modes from
    /// highest to lowest (the `PREFIX` mode letters).
    pub fn set_member_mode(&mut self, channel: &str, nick: &str, mode: char, set: bool, rank: &str) -> bool {
        let Some(member) = self
            .channels
            .get_mut(&irc_to_lower(channel))
            .and_then(|c| c.members.get_mut(&irc_to_lower(nick)))
        else {
            return false;
        };
        member.modes = if set {
            insert_ranked(&member.modes, mode, rank)
        } else {
            member.modes.chars().filter(|&c| c != mode).collect()
        };
        true
    }

    fn detach(&mut self, user_key: &str, channel: &str) {
        if let Some(user) = self.users.get_mut(user_key) {
            user.forget_channel(channel);
            if user.channels.is_empty() {
                self.users.remove(user_key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_user_fills_but_never_overwrites() {
        let mut tracker = Tracker::default();
        let first = tracker.update_user(&Prefix::bare("Alice"));
        assert_eq!(first.user, None);

        let filled = tracker.update_user(&Prefix::parse("alice!ali@host.a"));
        assert_eq!(filled.nick, "Alice");
        assert_eq!(filled.user.as_deref(), Some("ali"));
        assert_eq!(filled.host.as_deref(), Some("host.a"));

        let kept = tracker.update_user(&Prefix::parse("ALICE!other@host.b"));
        assert_eq!(kept.user.as_deref(), Some("ali"));
        assert_eq!(kept.host.as_deref(), Some("host.a"));
        assert_eq!(tracker.users().count(), 1);
    }

    #[test]
    fn test_observe_sender_records_only_full_masks() {
        let mut tracker = Tracker::default();
        let server = tracker.observe_sender(&Prefix::parse("irc.example.net"));
        assert_eq!(server.nick, "irc.example.net");
        assert_eq!(tracker.users().count(), 0);

        let alice = tracker.observe_sender(&Prefix::parse("alice!a@h"));
        assert_eq!(alice.host.as_deref(), Some("h"));
        assert_eq!(tracker.users().count(), 1);

        let again = tracker.observe_sender(&Prefix::bare("ALICE"));
        assert_eq!(again.mask(), "alice!a@h");
        assert_eq!(tracker.users().count(), 1);
    }

    #[test]
    fn test_rename_moves_entry_and_memberships() {
        let mut tracker = Tracker::default();
        tracker.add_channel("#Rust");
        tracker.add_member("#rust", "alice", "o");
        tracker.update_user(&Prefix::parse("alice!a@h"));

        let renamed = tracker.rename_user("Alice", "carol").unwrap();
        assert_eq!(renamed.nick, "carol");
        assert_eq!(renamed.host.as_deref(), Some("h"));
        assert!(tracker.user("alice").is_none());
        assert_eq!(tracker.users().count(), 1);

        let channel = tracker.channel("#RUST").unwrap();
        assert!(!channel.contains("alice"));
        assert_eq!(channel.member("carol").unwrap().modes, "o");
        assert_eq!(channel.nicks(), vec!["carol"]);
    }

    #[test]
    fn test_rename_unknown_is_none() {
        let mut tracker = Tracker::default();
        assert!(tracker.rename_user("ghost", "spirit").is_none());
    }

    #[test]
    fn test_members_pruned_with_last_channel() {
        let mut tracker = Tracker::default();
        tracker.add_channel("#a");
        tracker.add_channel("#b");
        tracker.add_member("#a", "bob", "");
        tracker.add_member("#b", "bob", "");
        tracker.add_member("#a", "eve", "");

        assert!(tracker.remove_member("#a", "bob"));
        assert_eq!(
            tracker.user("bob").unwrap().channels,
            BTreeSet::from(["#b".to_string()])
        );

        tracker.remove_channel("#a").unwrap();
        assert!(tracker.user("eve").is_none());
        assert!(tracker.user("bob").is_some());
        assert!(!tracker.remove_member("#a", "bob"));
    }

    #[test]
    fn test_remove_user_leaves_channels() {
        let mut tracker = Tracker::default();
        tracker.add_channel("#a");
        tracker.add_member("#a", "bob", "v");
        tracker.remove_user("BOB").unwrap();
        assert!(tracker.channel("#a").unwrap().is_empty());
    }

    #[test]
    fn test_add_channel_twice() {
        let mut tracker = Tracker::default();
        assert!(tracker.add_channel("#a"));
        assert!(!tracker.add_channel("#A"));
        assert!(!tracker.add_member("#missing", "bob", ""));
    }

    #[test]
    fn test_member_modes_keep_rank() {
        let mut tracker = Tracker::default();
        tracker.add_channel("#a");
        tracker.add_member("#a", "bob", "v");
        assert!(tracker.set_member_mode("#a", "bob", 'o', true, "ov"));
        assert_eq!(tracker.channel("#a").unwrap().member("bob").unwrap().modes, "ov");
        tracker.set_member_mode("#a", "bob", 'v', false, "ov");
        assert_eq!(tracker.channel("#a").unwrap().member("bob").unwrap().modes, "o");
        assert!(!tracker.set_member_mode("#a", "nobody", 'o', true, "ov"));
    }

    #[test]
    fn test_mask() {
        let mut tracker = Tracker::default();
        assert_eq!(tracker.update_user(&Prefix::parse("a!b@c")).mask(), "a!b@c");
        assert_eq!(tracker.update_user(&Prefix::bare("srv")).mask(), "srv");
    }
}
