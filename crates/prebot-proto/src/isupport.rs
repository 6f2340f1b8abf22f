//! ISUPPORT (`RPL_ISUPPORT`, numeric 005) parsing.
//!
//! Servers advertise their limits and conventions as `KEY` or `KEY=VALUE`
//! tokens, possibly spread over several 005 lines. [`Isupport`] accumulates
//! them; later tokens override earlier ones and `-KEY` removes a key.

use std::collections::BTreeMap;

use crate::names::DEFAULT_CHANTYPES;

/// Value of one advertised key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IsupportValue {
    /// Key advertised without a value (`EXCEPTS`).
    True,
    /// Key advertised as `KEY=VALUE`.
    Value(String),
}

impl IsupportValue {
    /// The value text, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            IsupportValue::True => None,
            IsupportValue::Value(v) => Some(v),
        }
    }
}

/// Accumulated server capabilities.
///
/// # Example
///
/// ```
/// use prebot_proto::Isupport;
///
/// let mut isupport = Isupport::default();
/// isupport.merge(["CHANTYPES=#&", "EXCEPTS", "PREFIX=(ov)@+"]);
///
/// assert_eq!(isupport.chantypes(), "#&");
/// assert!(isupport.contains("excepts"));
/// assert_eq!(isupport.prefix().prefix_for_mode('o'), Some('@'));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Isupport {
    entries: BTreeMap<String, IsupportValue>,
}

impl Isupport {
    /// Merge `KEY` / `KEY=VALUE` / `-KEY` tokens.
    pub fn merge<'a, I>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for token in tokens {
            if token.is_empty() || token.starts_with(':') {
                continue;
            }
            if let Some(key) = token.strip_prefix('-') {
                self.entries.remove(&key.to_ascii_uppercase());
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, IsupportValue::Value(v.to_owned())),
                None => (token, IsupportValue::True),
            };
            self.entries.insert(key.to_ascii_uppercase(), value);
        }
    }

    /// Parameters of a 005 reply: the target nick is skipped, and so is the
    /// human-readable trailing text.
    pub fn merge_reply(&mut self, middle_params: &[String]) {
        self.merge(middle_params.iter().skip(1).map(String::as_str));
    }

    /// Look up a key, ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&IsupportValue> {
        self.entries.get(&key.to_ascii_uppercase())
    }

    /// Value text of a key advertised with a value.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(IsupportValue::as_str)
    }

    /// Whether the key was advertised at all.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Forget everything (used when a connection drops).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of known keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been advertised yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all keys in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IsupportValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Channel prefix characters, `#&` until advertised.
    pub fn chantypes(&self) -> &str {
        self.value("CHANTYPES").unwrap_or(DEFAULT_CHANTYPES)
    }

    /// `NETWORK` name.
    pub fn network(&self) -> Option<&str> {
        self.value("NETWORK")
    }

    /// Membership modes and their symbols, `(ov)@+` until advertised.
    pub fn prefix(&self) -> PrefixSpec<'_> {
        self.value("PREFIX")
            .and_then(PrefixSpec::parse)
            .unwrap_or(PrefixSpec::DEFAULT)
    }

    /// Channel mode classes, if advertised.
    pub fn chanmodes(&self) -> Option<ChanModes<'_>> {
        self.value("CHANMODES").and_then(ChanModes::parse)
    }
}

/// Parsed `PREFIX` token mapping membership modes to their symbols.
///
/// ```
/// use prebot_proto::PrefixSpec;
///
/// let spec = PrefixSpec::parse("(qaohv)~&@%+").unwrap();
/// assert_eq!(spec.prefix_for_mode('h'), Some('%'));
/// assert_eq!(spec.mode_for_prefix('~'), Some('q'));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixSpec<'a> {
    /// Mode characters, highest rank first.
    pub modes: &'a str,
    /// Matching symbols.
    pub prefixes: &'a str,
}

impl<'a> PrefixSpec<'a> {
    /// RFC 1459 default: op and voice.
    pub const DEFAULT: PrefixSpec<'static> = PrefixSpec {
        modes: "ov",
        prefixes: "@+",
    };

    /// Parse `(modes)symbols`.
    pub fn parse(s: &'a str) -> Option<Self> {
        let rest = s.strip_prefix('(')?;
        let (modes, prefixes) = rest.split_once(')')?;
        if modes.chars().count() != prefixes.chars().count() {
            return None;
        }
        Some(PrefixSpec { modes, prefixes })
    }

    /// Whether `mode` is a membership mode.
    #[inline]
    pub fn is_prefix_mode(&self, mode: char) -> bool {
        self.modes.contains(mode)
    }

    /// Symbol shown for `mode`.
    pub fn prefix_for_mode(&self, mode: char) -> Option<char> {
        let index = self.modes.chars().position(|c| c == mode)?;
        self.prefixes.chars().nth(index)
    }

    /// Mode character behind `symbol`.
    pub fn mode_for_prefix(&self, symbol: char) -> Option<char> {
        let index = self.prefixes.chars().position(|c| c == symbol)?;
        self.modes.chars().nth(index)
    }

    /// Split leading status symbols off a NAMES entry.
    ///
    /// Returns the mode characters of all stripped symbols and the bare nick.
    pub fn strip_symbols<'n>(&self, entry: &'n str) -> (String, &'n str) {
        let nick = entry.trim_start_matches(|c: char| self.prefixes.contains(c));
        let modes = entry[..entry.len() - nick.len()]
            .chars()
            .filter_map(|c| self.mode_for_prefix(c))
            .collect();
        (modes, nick)
    }
}

/// Parsed `CHANMODES` token.
///
/// - **A**: list modes, always take a parameter (`b`)
/// - **B**: always take a parameter (`k`)
/// - **C**: take a parameter only when set (`l`)
/// - **D**: never take a parameter (`n`, `t`)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChanModes<'a> {
    /// Type A modes.
    pub a: &'a str,
    /// Type B modes.
    pub b: &'a str,
    /// Type C modes.
    pub c: &'a str,
    /// Type D modes.
    pub d: &'a str,
}

impl<'a> ChanModes<'a> {
    /// RFC 2811 classes used until the server advertises its own.
    pub const DEFAULT: ChanModes<'static> = ChanModes {
        a: "beI",
        b: "k",
        c: "l",
        d: "imnpst",
    };

    /// Parse `A,B,C,D`. Extra groups beyond the fourth are ignored.
    pub fn parse(s: &'a str) -> Option<Self> {
        let mut parts = s.split(',');
        Some(ChanModes {
            a: parts.next()?,
            b: parts.next()?,
            c: parts.next()?,
            d: parts.next()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_reply_skips_target_nick() {
        let mut isupport = Isupport::default();
        let params: Vec<String> = ["mybot", "CHANTYPES=#", "NICKLEN=30", "WHOX"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        isupport.merge_reply(&params);

        assert_eq!(isupport.len(), 3);
        assert!(!isupport.contains("mybot"));
        assert_eq!(isupport.chantypes(), "#");
        assert_eq!(isupport.value("nicklen"), Some("30"));
        assert_eq!(isupport.get("WHOX"), Some(&IsupportValue::True));
    }

    #[test]
    fn test_later_tokens_override_and_negate() {
        let mut isupport = Isupport::default();
        isupport.merge(["NETWORK=Old", "EXCEPTS"]);
        isupport.merge(["NETWORK=New", "-EXCEPTS"]);
        assert_eq!(isupport.network(), Some("New"));
        assert!(!isupport.contains("EXCEPTS"));
    }

    #[test]
    fn test_defaults_before_advertisement() {
        let isupport = Isupport::default();
        assert_eq!(isupport.chantypes(), "#&");
        assert_eq!(isupport.prefix(), PrefixSpec::DEFAULT);
        assert!(isupport.chanmodes().is_none());
    }

    #[test]
    fn test_empty_value_is_kept() {
        let mut isupport = Isupport::default();
        isupport.merge(["EXCEPTS="]);
        assert_eq!(isupport.value("EXCEPTS"), Some(""));
    }

    #[test]
    fn test_prefix_spec_rejects_mismatch() {
        assert!(PrefixSpec::parse("(ov)@").is_none());
        assert!(PrefixSpec::parse("ov@+").is_none());
    }

    #[test]
    fn test_strip_symbols() {
        let spec = PrefixSpec::parse("(ohv)@%+").unwrap();
        assert_eq!(spec.strip_symbols("@+alice"), ("ov".to_string(), "alice"));
        assert_eq!(spec.strip_symbols("bob"), (String::new(), "bob"));
    }

    #[test]
    fn test_chanmodes() {
        let modes = ChanModes::parse("beI,k,l,imnpst,XYZ").unwrap();
        assert_eq!(modes.a, "beI");
        assert_eq!(modes.d, "imnpst");
        assert!(ChanModes::parse("b,k").is_none());
    }
}
