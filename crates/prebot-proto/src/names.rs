//! Nickname and channel-name validation.
//!
//! # Reference
//! - RFC 2812 Section 1.2.1 (nicknames) and 1.3 (channels)

/// Maximum nickname length accepted by [`is_valid_nick`].
pub const NICK_MAX_LEN: usize = 30;

/// Maximum channel name length (prefix included).
pub const CHANNEL_MAX_LEN: usize = 50;

/// Channel prefixes assumed until the server advertises `CHANTYPES`.
pub const DEFAULT_CHANTYPES: &str = "#&";

#[inline]
fn is_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}')
}

/// RFC 2812 nickname: a letter or special first, then letters, digits,
/// specials or `-`.
///
/// ```
/// use prebot_proto::is_valid_nick;
///
/// assert!(is_valid_nick("prebot"));
/// assert!(is_valid_nick("[bot]"));
/// assert!(!is_valid_nick("9lives"));
/// assert!(!is_valid_nick("two words"));
/// ```
pub fn is_valid_nick(nick: &str) -> bool {
    let mut chars = nick.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    nick.len() <= NICK_MAX_LEN
        && (first.is_ascii_alphabetic() || is_special(first))
        && chars.all(|c| c.is_ascii_alphanumeric() || is_special(c) || c == '-')
}

/// Whether `name` starts with one of `chantypes` and contains no space,
/// comma, BEL or other control character.
///
/// ```
/// use prebot_proto::is_channel_name;
///
/// assert!(is_channel_name("#rust", "#&"));
/// assert!(!is_channel_name("+modeless", "#&"));
/// assert!(is_channel_name("+modeless", "#+"));
/// ```
pub fn is_channel_name(name: &str, chantypes: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    chantypes.contains(first)
        && name.chars().count() <= CHANNEL_MAX_LEN
        && chars.all(|c| c != ' ' && c != ',' && !c.is_control())
}
