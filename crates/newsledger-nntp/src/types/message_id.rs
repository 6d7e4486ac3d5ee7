//! Message-ID tokens.
//!
//! A Message-ID travels in its *full* form, `<local@domain>`; storage and
//! status lines often want the *core* form without the angle brackets.

use std::fmt;

use crate::{Error, Result};

/// Longest accepted full Message-ID, brackets included.
pub const MAX_MESSAGE_ID_LENGTH: usize = 250;

/// Message-IDs that must never be treated as real articles.
///
/// `<0>` is the RFC 977 placeholder, the keepalive ID is emitted by some
/// peers as a liveness probe.
const RESERVED: [&str; 2] = ["<0>", "<keepalive@dummy.tld>"];

/// Validated Message-ID in full (bracketed) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    /// Parses a full Message-ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the token is not a valid Message-ID.
    pub fn parse(token: &[u8]) -> Result<Self> {
        if !is_valid(token) {
            return Err(Error::parse(format!(
                "invalid Message-ID {:?}",
                String::from_utf8_lossy(token)
            )));
        }
        // validation guarantees printable ASCII
        Ok(Self(String::from_utf8_lossy(token).into_owned()))
    }

    /// Builds a Message-ID from its core form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the bracketed token is not valid.
    pub fn from_core(core: &str) -> Result<Self> {
        Self::parse(format!("<{core}>").as_bytes())
    }

    /// Returns the full form, brackets included.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the core form, brackets removed.
    #[must_use]
    pub fn core(&self) -> &str {
        &self.0[1..self.0.len() - 1]
    }

    /// Returns true for placeholder IDs that never name a real article.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        RESERVED.contains(&self.0.as_str())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Checks the full Message-ID grammar: 3..=250 bytes, bracketed, and
/// printable ASCII without an embedded `>`.
#[must_use]
pub fn is_valid(token: &[u8]) -> bool {
    token.len() >= 3
        && token.len() <= MAX_MESSAGE_ID_LENGTH
        && token[0] == b'<'
        && token[token.len() - 1] == b'>'
        && token[1..token.len() - 1]
            .iter()
            .all(|&c| (0x21..=0x7E).contains(&c) && c != b'>')
}

/// Extracts the first valid Message-ID from a References header value.
#[must_use]
pub fn first_reference(references: &str) -> Option<MessageId> {
    references
        .split_ascii_whitespace()
        .find_map(|token| MessageId::parse(token.as_bytes()).ok())
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
    fn test_valid_ids() {
        assert!(is_valid(b"<abc@example.com>"));
        assert!(is_valid(b"<a>"));
        assert!(!is_valid(b"<>"));
        assert!(!is_valid(b"abc@example.com"));
        assert!(!is_valid(b"<abc@exa mple.com>"));
        assert!(!is_valid(b"<abc>def>"));
        assert!(!is_valid(b"<abc\x01>"));
    }

    #[test]
    fn test_length_limit() {
        let ok = format!("<{}>", "a".repeat(MAX_MESSAGE_ID_LENGTH - 2));
        assert!(is_valid(ok.as_bytes()));
        let too_long = format!("<{}>", "a".repeat(MAX_MESSAGE_ID_LENGTH - 1));
        assert!(!is_valid(too_long.as_bytes()));
    }

    #[test]
    fn test_core_form() {
        let id = MessageId::parse(b"<x.1@host>").unwrap();
        assert_eq!(id.core(), "x.1@host");
        assert_eq!(id.as_str(), "<x.1@host>");
        assert_eq!(MessageId::from_core("x.1@host").unwrap(), id);
    }

    #[test]
    fn test_reserved() {
        assert!(MessageId::parse(b"<0>").unwrap().is_reserved());
        assert!(
            MessageId::parse(b"<keepalive@dummy.tld>")
                .unwrap()
                .is_reserved()
        );
        assert!(!MessageId::parse(b"<1@host>").unwrap().is_reserved());
    }

    #[test]
    fn test_first_reference() {
        let r = first_reference("junk <a@b> <c@d>").unwrap();
        assert_eq!(r.as_str(), "<a@b>");
        assert!(first_reference("").is_none());
        assert!(first_reference("none here").is_none());
    }
}
