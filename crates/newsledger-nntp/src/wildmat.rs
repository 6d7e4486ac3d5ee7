//! Wildmat patterns (RFC 3977 section 4).
//!
//! A wildmat is a comma-separated list of glob pieces, each optionally
//! negated with `!`. Every piece is tried in order and the polarity of the
//! last matching piece decides the result, so `*,!local.*` means
//! "everything except `local.*`". A candidate that matches no piece is
//! rejected.

use std::fmt;

use regex::Regex;

use crate::types::group::is_name_byte;

/// Error returned for a pattern that is not a valid wildmat.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid wildmat {0:?}")]
pub struct InvalidWildmat(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    StartPattern,
    InsidePattern,
    Negate,
}

/// Checks wildmat syntax without compiling it.
///
/// Pieces may not be empty, `!` is only allowed at the start of a piece
/// and the pattern may not end in `,` or `!`. Non-ASCII bytes must form
/// valid UTF-8.
#[must_use]
pub fn is_valid(pattern: &[u8]) -> bool {
    let mut state = ScanState::StartPattern;
    for &c in pattern {
        state = match (c, state) {
            (b'*' | b'?', _) => ScanState::InsidePattern,
            (c, _) if is_name_byte(c) => ScanState::InsidePattern,
            (b'!', ScanState::StartPattern) => ScanState::Negate,
            (b',', ScanState::InsidePattern) => ScanState::StartPattern,
            _ => return false,
        };
    }
    state == ScanState::InsidePattern && (pattern.is_ascii() || std::str::from_utf8(pattern).is_ok())
}

#[derive(Debug, Clone)]
struct Piece {
    regex: Regex,
    include: bool,
}

/// A compiled wildmat.
#[derive(Debug, Clone)]
pub struct Wildmat {
    source: String,
    pieces: Vec<Piece>,
}

impl Wildmat {
    /// Validates and compiles a wildmat.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWildmat`] if the pattern fails [`is_valid`].
    pub fn compile(pattern: &str) -> Result<Self, InvalidWildmat> {
        if !is_valid(pattern.as_bytes()) {
            return Err(InvalidWildmat(pattern.to_owned()));
        }
        let pieces = pattern
            .split(',')
            .map(|piece| {
                let (include, glob) = piece
                    .strip_prefix('!')
                    .map_or((true, piece), |rest| (false, rest));
                Regex::new(&translate(glob))
                    .map(|regex| Piece { regex, include })
                    .map_err(|_| InvalidWildmat(pattern.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: pattern.to_owned(),
            pieces,
        })
    }

    /// Pattern matching everything.
    #[must_use]
    pub fn any() -> Self {
        // "*" always compiles
        Self::compile("*").unwrap_or_else(|_| Self {
            source: String::new(),
            pieces: Vec::new(),
        })
    }

    /// Returns true if the last piece matching `candidate` is not negated.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.pieces
            .iter()
            .rev()
            .find(|piece| piece.regex.is_match(candidate))
            .is_some_and(|piece| piece.include)
    }

    /// Returns the pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Wildmat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Translates one glob piece into an anchored regex.
fn translate(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 8);
    out.push_str("(?s)^");
    for c in glob.chars() {
        match c {
            '?' => out.push('.'),
            '*' => out.push_str(".*"),
            c if c.is_ascii_alphanumeric() => out.push(c),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
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
    fn test_validation() {
        assert!(is_valid(b"*"));
        assert!(is_valid(b"comp.*,!comp.lang.*"));
        assert!(is_valid(b"!a"));
        assert!(is_valid("ru.*,!ru.тест".as_bytes()));
        assert!(!is_valid(b""));
        assert!(!is_valid(b"a,"));
        assert!(!is_valid(b"!"));
        assert!(!is_valid(b"a,,b"));
        assert!(!is_valid(b"a!b"));
        assert!(!is_valid(b"!!a"));
        assert!(!is_valid(b"a b"));
        assert!(!is_valid(b"[ab]"));
        assert!(!is_valid(b"a\\b"));
        assert!(!is_valid(b"\xc3"));
    }

    #[test]
    fn test_last_match_wins() {
        let w = Wildmat::compile("a*,!ab*").unwrap();
        assert!(!w.matches("abc"));
        assert!(w.matches("axc"));
        assert!(!w.matches("zzz"));

        let w = Wildmat::compile("!ab*,a*").unwrap();
        assert!(w.matches("abc"));
    }

    #[test]
    fn test_star_matches_everything() {
        let w = Wildmat::any();
        assert!(w.matches(""));
        assert!(w.matches("anything.at.all"));
        assert!(w.matches("line\nbreak"));
    }

    #[test]
    fn test_question_mark_is_one_character() {
        let w = Wildmat::compile("a?c").unwrap();
        assert!(w.matches("abc"));
        assert!(w.matches("aжc"));
        assert!(!w.matches("ac"));
        assert!(!w.matches("abbc"));
    }

    #[test]
    fn test_literals_are_escaped() {
        let w = Wildmat::compile("comp.lang").unwrap();
        assert!(w.matches("comp.lang"));
        assert!(!w.matches("compxlang"));
        let w = Wildmat::compile("a+b(c)").unwrap();
        assert!(w.matches("a+b(c)"));
        assert!(!w.matches("aab(c)"));
    }

    #[test]
    fn test_anchored() {
        let w = Wildmat::compile("lang").unwrap();
        assert!(!w.matches("comp.lang.rust"));
    }

    #[test]
    fn test_compile_rejects_invalid() {
        let err = Wildmat::compile("a,").unwrap_err();
        assert_eq!(err, InvalidWildmat("a,".into()));
    }
}
