//! Article number ranges: `[num[-[num]]]`.

use std::fmt;

use crate::{Error, Result};

/// Inclusive article number range; `high == None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleRange {
    /// First article number.
    pub low: u64,
    /// Last article number, or `None` for "to the end of the group".
    pub high: Option<u64>,
}

impl ArticleRange {
    /// The whole group.
    pub const ALL: Self = Self { low: 1, high: None };

    /// Range covering exactly one article.
    #[must_use]
    pub const fn single(number: u64) -> Self {
        Self {
            low: number,
            high: Some(number),
        }
    }

    /// Range from `low` to `high` inclusive.
    #[must_use]
    pub const fn new(low: u64, high: Option<u64>) -> Self {
        Self { low, high }
    }

    /// Parses `n`, `n-`, `n-m`, `-m` or `-`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if either bound is not a decimal number.
    pub fn parse(s: &str) -> Result<Self> {
        let number = |part: &str| {
            if part.is_empty() || !part.bytes().all(|c| c.is_ascii_digit()) {
                return Err(Error::parse(format!("invalid range {s:?}")));
            }
            part.parse::<u64>()
                .map_err(|_| Error::parse(format!("invalid range {s:?}")))
        };

        match s.split_once('-') {
            Some((low, high)) => Ok(Self {
                low: if low.is_empty() { 1 } else { number(low)? },
                high: if high.is_empty() {
                    None
                } else {
                    Some(number(high)?)
                },
            }),
            None => Ok(Self::single(number(s)?)),
        }
    }

    /// Returns true if the range cannot contain anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        match self.high {
            Some(high) => high < self.low,
            None => false,
        }
    }

    /// Returns true if `number` lies inside the range.
    #[must_use]
    pub const fn contains(&self, number: u64) -> bool {
        number >= self.low
            && match self.high {
                Some(high) => number <= high,
                None => true,
            }
    }
}

impl fmt::Display for ArticleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.high {
            Some(high) if high == self.low => write!(f, "{}", self.low),
            Some(high) => write!(f, "{}-{high}", self.low),
            None => write!(f, "{}-", self.low),
        }
    }
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
    fn test_parse_forms() {
        assert_eq!(ArticleRange::parse("5").unwrap(), ArticleRange::single(5));
        assert_eq!(
            ArticleRange::parse("5-").unwrap(),
            ArticleRange::new(5, None)
        );
        assert_eq!(
            ArticleRange::parse("5-9").unwrap(),
            ArticleRange::new(5, Some(9))
        );
        assert_eq!(
            ArticleRange::parse("-9").unwrap(),
            ArticleRange::new(1, Some(9))
        );
        assert_eq!(ArticleRange::parse("-").unwrap(), ArticleRange::ALL);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ArticleRange::parse("").is_err());
        assert!(ArticleRange::parse("a-b").is_err());
        assert!(ArticleRange::parse("1-2-3").is_err());
        assert!(ArticleRange::parse("+1").is_err());
    }

    #[test]
    fn test_empty_and_contains() {
        assert!(ArticleRange::new(9, Some(5)).is_empty());
        assert!(!ArticleRange::ALL.is_empty());
        let r = ArticleRange::new(3, Some(7));
        assert!(r.contains(3));
        assert!(r.contains(7));
        assert!(!r.contains(8));
        assert!(ArticleRange::new(3, None).contains(u64::MAX));
    }

    #[test]
    fn test_display() {
        assert_eq!(ArticleRange::single(4).to_string(), "4");
        assert_eq!(ArticleRange::new(4, Some(8)).to_string(), "4-8");
        assert_eq!(ArticleRange::new(4, None).to_string(), "4-");
    }
}
