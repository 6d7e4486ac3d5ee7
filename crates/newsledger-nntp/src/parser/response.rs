//! Status line parsing.

use crate::types::ResponseCode;
use crate::{Error, Result};

/// A parsed status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Three-digit status code.
    pub code: ResponseCode,
    /// Text after the code, without the separating space.
    pub text: String,
}

impl Response {
    /// Returns the whitespace-separated words of the text.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.text.split_ascii_whitespace()
    }
}

/// Parses `DDD` or `DDD SP text`.
///
/// # Errors
///
/// Returns [`Error::InvalidResponse`] when the line does not start with
/// exactly three digits followed by end of line or a space, and
/// [`Error::CodeOutOfRange`] when the code is outside 100..=599.
pub fn parse_response(line: &[u8]) -> Result<Response> {
    let invalid = || Error::InvalidResponse(String::from_utf8_lossy(line).into_owned());

    if line.len() < 3 || !line[..3].iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let text = match line.get(3) {
        None => &line[3..],
        Some(b' ') => &line[4..],
        Some(_) => return Err(invalid()),
    };

    let code = line[..3]
        .iter()
        .fold(0u16, |n, &c| n * 10 + u16::from(c - b'0'));
    if !(100..=599).contains(&code) {
        return Err(Error::CodeOutOfRange(code));
    }

    Ok(Response {
        code: ResponseCode::new(code),
        text: String::from_utf8_lossy(text).into_owned(),
    })
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
    fn test_parse_with_text() {
        let r = parse_response(b"211 3 1 3 misc.test").unwrap();
        assert_eq!(r.code, ResponseCode::GROUP_SELECTED);
        assert_eq!(r.text, "3 1 3 misc.test");
        assert_eq!(r.args().collect::<Vec<_>>(), ["3", "1", "3", "misc.test"]);
    }

    #[test]
    fn test_parse_bare_code() {
        let r = parse_response(b"205").unwrap();
        assert_eq!(r.code.as_u16(), 205);
        assert_eq!(r.text, "");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            parse_response(b"20"),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response(b"2000 ok"),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response(b"20x ok"),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response(b"200\tok"),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(
            parse_response(b"099 low"),
            Err(Error::CodeOutOfRange(99))
        ));
        assert!(matches!(
            parse_response(b"600 high"),
            Err(Error::CodeOutOfRange(600))
        ));
    }
}
