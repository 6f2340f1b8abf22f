//! RFC 1459 case mapping.
//!
//! IRC compares nicknames and channel names case-insensitively, and under
//! `rfc1459` the characters `[]\~` are the upper-case forms of `{}|^`.

/// Fold one character.
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        'A'..='Z' => c.to_ascii_lowercase(),
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        _ => c,
    }
}

/// Fold a whole string; used as the key for nick and channel maps.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Case-insensitive comparison under RFC 1459 mapping.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .chars()
            .zip(b.chars())
            .all(|(x, y)| irc_lower_char(x) == irc_lower_char(y))
}
