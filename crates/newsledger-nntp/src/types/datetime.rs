//! Date and time arguments of NEWNEWS, NEWGROUPS and DATE.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};

/// Which half of a `[YY]YYMMDD hhmmss` pair was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DateTimeError {
    /// The date token is malformed or names no calendar day.
    #[error("invalid date")]
    InvalidDate,
    /// The time token is malformed.
    #[error("invalid time")]
    InvalidTime,
}

fn digits(s: &[u8]) -> Option<u32> {
    if s.is_empty() || !s.iter().all(u8::is_ascii_digit) {
        return None;
    }
    s.iter()
        .try_fold(0u32, |n, &c| n.checked_mul(10)?.checked_add(u32::from(c - b'0')))
}

/// Parses a `[YY]YYMMDD` date token into (year, month, day).
///
/// Two-digit years resolve to the current century when not after the
/// current year, else to the previous century.
fn parse_date(date: &[u8], now: DateTime<Utc>) -> Option<(i32, u32, u32)> {
    if date.len() < 6 || date.len() == 7 || date.len() > 12 {
        return None;
    }
    let split = date.len() - 4;
    let day = digits(&date[split + 2..])?;
    let month = digits(&date[split..split + 2])?;
    let mut year = i32::try_from(digits(&date[..split])?).ok()?;

    if date.len() == 6 {
        let century = now.year() / 100;
        let short = now.year() % 100;
        year += if year <= short {
            century * 100
        } else {
            (century - 1) * 100
        };
    }

    ((1..=12).contains(&month) && day >= 1).then_some((year, month, day))
}

/// Parses an `hhmmss` token into seconds after midnight.
///
/// Hour 24 and leap seconds are tolerated and roll forward.
fn parse_time(time: &[u8]) -> Option<i64> {
    if time.len() != 6 {
        return None;
    }
    let h = digits(&time[..2])?;
    let m = digits(&time[2..4])?;
    let s = digits(&time[4..])?;
    (h <= 24 && m < 60 && s <= 61).then(|| i64::from(h * 3600 + m * 60 + s))
}

/// Parses the `date time` argument pair used by NEWNEWS and NEWGROUPS.
///
/// The optional trailing `GMT` token is not part of this call; times are
/// always taken as UTC.
///
/// # Errors
///
/// Returns which of the two tokens was rejected.
pub fn parse_date_time(
    date: &[u8],
    time: &[u8],
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, DateTimeError> {
    let (y, m, d) = parse_date(date, now).ok_or(DateTimeError::InvalidDate)?;
    let day = NaiveDate::from_ymd_opt(y, m, d).ok_or(DateTimeError::InvalidDate)?;
    let seconds = parse_time(time).ok_or(DateTimeError::InvalidTime)?;
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or(DateTimeError::InvalidDate)?
        .and_utc();
    Ok(midnight + TimeDelta::seconds(seconds))
}

/// Formats the `111` DATE payload: `YYYYMMDDhhmmss`.
#[must_use]
pub fn format_server_date(t: DateTime<Utc>) -> String {
    t.format("%Y%m%d%H%M%S").to_string()
}

/// Formats a query timestamp as `YYYYMMDD hhmmss GMT` for NEWNEWS/NEWGROUPS.
#[must_use]
pub fn format_query_date(t: DateTime<Utc>) -> String {
    t.format("%Y%m%d %H%M%S GMT").to_string()
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
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_four_digit_year() {
        let t = parse_date_time(b"20240229", b"235959", now()).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_two_digit_year_century() {
        let t = parse_date_time(b"260101", b"000000", now()).unwrap();
        assert_eq!(t.year(), 2026);
        let t = parse_date_time(b"990101", b"000000", now()).unwrap();
        assert_eq!(t.year(), 1999);
    }

    #[test]
    fn test_rejects() {
        assert_eq!(
            parse_date_time(b"2024130", b"000000", now()),
            Err(DateTimeError::InvalidDate)
        );
        assert_eq!(
            parse_date_time(b"20241301", b"000000", now()),
            Err(DateTimeError::InvalidDate)
        );
        assert_eq!(
            parse_date_time(b"20240230", b"000000", now()),
            Err(DateTimeError::InvalidDate)
        );
        assert_eq!(
            parse_date_time(b"20240101", b"126000", now()),
            Err(DateTimeError::InvalidTime)
        );
        assert_eq!(
            parse_date_time(b"20240101", b"12000", now()),
            Err(DateTimeError::InvalidTime)
        );
    }

    #[test]
    fn test_hour_24_rolls_over() {
        let t = parse_date_time(b"20240101", b"240000", now()).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_formatting() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(format_server_date(t), "20240305070809");
        assert_eq!(format_query_date(t), "20240305 070809 GMT");
    }
}
