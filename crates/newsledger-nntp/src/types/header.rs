//! Header field names used by HDR/XHDR queries.

/// Checks an HDR field argument: an optional leading `:` (metadata item)
/// followed by one or more printable ASCII characters other than `:`.
#[must_use]
pub fn is_valid_header_query(field: &str) -> bool {
    let name = field.strip_prefix(':').unwrap_or(field);
    !name.is_empty() && name.bytes().all(|c| (0x21..=0x7E).contains(&c) && c != b':')
}

/// Header fields listed by LIST OVERVIEW.FMT, in overview order.
pub const OVERVIEW_FORMAT: [&str; 8] = [
    "Subject:",
    "From:",
    "Date:",
    "Message-ID:",
    "References:",
    ":bytes",
    ":lines",
    "Xref:full",
];

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
    fn test_header_queries() {
        assert!(is_valid_header_query("Message-ID"));
        assert!(is_valid_header_query(":bytes"));
        assert!(!is_valid_header_query(""));
        assert!(!is_valid_header_query(":"));
        assert!(!is_valid_header_query("Subject:"));
        assert!(!is_valid_header_query("sub ject"));
        assert!(!is_valid_header_query("тема"));
    }
}
