//! Newsgroup names.

use std::fmt;

use crate::{Error, Result};

/// Longest accepted group name.
///
/// RFC 3977 caps arguments at 497 octets; names are kept well below that.
pub const MAX_GROUP_NAME_LENGTH: usize = 450;

/// Validated newsgroup name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupName(String);

impl GroupName {
    /// Parses a group name from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for empty, oversized or badly formed names.
    pub fn parse(name: &[u8]) -> Result<Self> {
        if name.is_empty() || !is_valid(name) {
            return Err(Error::parse(format!(
                "bad group {:?}",
                String::from_utf8_lossy(name)
            )));
        }
        let name = std::str::from_utf8(name).map_err(|e| Error::parse(e.to_string()))?;
        Ok(Self(name.to_owned()))
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GroupName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns true for bytes allowed in group names and wildmat literals.
///
/// Excludes controls, space and `! * , ? [ \ ]`; any byte >= 0x80 is
/// accepted here and checked for UTF-8 validity by the caller.
#[must_use]
pub const fn is_name_byte(c: u8) -> bool {
    matches!(c, 0x22..=0x29 | 0x2B | 0x2D..=0x3E | 0x40..=0x5A | 0x5E..=0x7E | 0x80..=0xFF)
}

/// Checks a group name: restricted byte class, length cap and UTF-8
/// validity when non-ASCII bytes are present.
#[must_use]
pub fn is_valid(name: &[u8]) -> bool {
    if name.len() > MAX_GROUP_NAME_LENGTH || !name.iter().all(|&c| is_name_byte(c)) {
        return false;
    }
    name.is_ascii() || std::str::from_utf8(name).is_ok()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid(b"comp.lang.rust"));
        assert!(is_valid(b"alt.test-group_1"));
        assert!(is_valid("overchan.тест".as_bytes()));
    }

    #[test]
    fn test_invalid_names() {
        assert!(!is_valid(b"has space"));
        assert!(!is_valid(b"star*"));
        assert!(!is_valid(b"bang!"));
        assert!(!is_valid(b"comma,"));
        assert!(!is_valid(b"q?"));
        assert!(!is_valid(b"[x]"));
        assert!(!is_valid(b"back\\slash"));
        assert!(!is_valid(b"\xff\xfe"));
        assert!(!is_valid("a".repeat(MAX_GROUP_NAME_LENGTH + 1).as_bytes()));
    }

    #[test]
    fn test_parse() {
        let g = GroupName::parse(b"misc.test").unwrap();
        assert_eq!(g.as_str(), "misc.test");
        assert!(GroupName::parse(b"").is_err());
        assert!(GroupName::parse(b"a b").is_err());
    }
}
