//! Lines of multi-line listings and selection responses.
//!
//! Each type both parses the line a remote sends and formats the line a
//! local server emits.

use std::fmt;

use crate::types::GroupName;
use crate::{Error, Result};

fn number(field: &str, what: &str) -> Result<u64> {
    if field.is_empty() || !field.bytes().all(|c| c.is_ascii_digit()) {
        return Err(Error::parse(format!("bad {what} {field:?}")));
    }
    field
        .parse()
        .map_err(|_| Error::parse(format!("bad {what} {field:?}")))
}

/// One `LIST ACTIVE` line: `name high low status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEntry {
    /// Group name.
    pub name: GroupName,
    /// Reported high watermark.
    pub high: u64,
    /// Reported low watermark.
    pub low: u64,
    /// Posting status (`y`, `n`, `m`), empty if the remote omitted it.
    pub status: String,
}

impl ActiveEntry {
    /// Parses an active line. Exactly three or four fields are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for a wrong field count, a bad group name
    /// or non-numeric watermarks.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_ascii_whitespace().collect();
        if !(3..=4).contains(&fields.len()) {
            return Err(Error::parse(format!("bad active line {line:?}")));
        }
        Ok(Self {
            name: GroupName::parse(fields[0].as_bytes())?,
            high: number(fields[1], "high watermark")?,
            low: number(fields[2], "low watermark")?,
            status: fields.get(3).map(|s| (*s).to_owned()).unwrap_or_default(),
        })
    }
}

impl fmt::Display for ActiveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.high, self.low)?;
        if !self.status.is_empty() {
            write!(f, " {}", self.status)?;
        }
        Ok(())
    }
}

/// One `LIST NEWSGROUPS` / `XGTITLE` line: `name description`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsgroupsEntry {
    /// Group name.
    pub name: GroupName,
    /// Free-form description, possibly empty.
    pub description: String,
}

impl NewsgroupsEntry {
    /// Parses a newsgroups line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the group name is invalid.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_start_matches([' ', '\t']);
        let (name, description) = line
            .split_once([' ', '\t'])
            .unwrap_or((line, ""));
        Ok(Self {
            name: GroupName::parse(name.as_bytes())?,
            description: description.trim().to_owned(),
        })
    }
}

impl fmt::Display for NewsgroupsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.name, self.description)
    }
}

/// `211` selection response text: `count low high name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStatus {
    /// Estimated article count.
    pub count: u64,
    /// Low watermark.
    pub low: u64,
    /// High watermark.
    pub high: u64,
    /// Selected group.
    pub name: GroupName,
}

impl GroupStatus {
    /// Parses the text of a `211` response. Trailing words such as
    /// `list follows` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when fewer than four fields are present or
    /// any of them is malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let fields: Vec<&str> = text.split_ascii_whitespace().take(4).collect();
        if fields.len() != 4 {
            return Err(Error::parse(format!("bad group response {text:?}")));
        }
        Ok(Self {
            count: number(fields[0], "article count")?,
            low: number(fields[1], "low watermark")?,
            high: number(fields[2], "high watermark")?,
            name: GroupName::parse(fields[3].as_bytes())?,
        })
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.count, self.low, self.high, self.name)
    }
}

/// One `HDR`/`XHDR` line: `number value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdrEntry {
    /// Article number (0 when selected by Message-ID).
    pub number: u64,
    /// Header value; empty when the article lacks the header.
    pub value: String,
}

impl HdrEntry {
    /// Parses a header listing line. The placeholder `(none)` some
    /// servers send for missing headers becomes an empty value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the article number is malformed.
    pub fn parse(line: &str) -> Result<Self> {
        let (num, value) = line.split_once([' ', '\t']).unwrap_or((line, ""));
        let value = value.trim();
        Ok(Self {
            number: number(num, "article number")?,
            value: if value == "(none)" {
                String::new()
            } else {
                value.to_owned()
            },
        })
    }
}

impl fmt::Display for HdrEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, sanitize(&self.value))
    }
}

/// One `OVER`/`XOVER` line, in `LIST OVERVIEW.FMT` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overview {
    /// Article number (0 when selected by Message-ID).
    pub number: u64,
    /// Subject header.
    pub subject: String,
    /// From header.
    pub from: String,
    /// Date header.
    pub date: String,
    /// Message-ID header, full form.
    pub message_id: String,
    /// References header.
    pub references: String,
    /// Article size in octets.
    pub bytes: u64,
    /// Body line count.
    pub lines: u64,
    /// Xref header value, without the `Xref: ` label.
    pub xref: String,
}

impl Overview {
    /// Parses a tab-separated overview line.
    ///
    /// The first five fields are required; missing or malformed metadata
    /// fields default to empty/zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when fewer than five fields are present or
    /// the article number is malformed.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 5 {
            return Err(Error::parse(format!("short overview line {line:?}")));
        }
        let field = |i: usize| fields.get(i).map_or("", |s| s.trim());
        Ok(Self {
            number: number(fields[0].trim(), "article number")?,
            subject: field(1).to_owned(),
            from: field(2).to_owned(),
            date: field(3).to_owned(),
            message_id: field(4).to_owned(),
            references: field(5).to_owned(),
            bytes: field(6).parse().unwrap_or(0),
            lines: field(7).parse().unwrap_or(0),
            xref: field(8)
                .strip_prefix("Xref:")
                .map_or("", str::trim)
                .to_owned(),
        })
    }
}

impl fmt::Display for Overview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.number,
            sanitize(&self.subject),
            sanitize(&self.from),
            sanitize(&self.date),
            sanitize(&self.message_id),
            sanitize(&self.references),
            self.bytes,
            self.lines,
        )?;
        if self.xref.is_empty() {
            f.write_str("\t")
        } else {
            write!(f, "\tXref: {}", sanitize(&self.xref))
        }
    }
}

/// Replaces the separators that would break a listing line.
fn sanitize(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains(['\t', '\r', '\n']) {
        value.replace(['\t', '\r', '\n'], " ").into()
    } else {
        value.into()
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
    fn test_active_line() {
        let e = ActiveEntry::parse("misc.test 30 1 y").unwrap();
        assert_eq!(e.name.as_str(), "misc.test");
        assert_eq!((e.high, e.low), (30, 1));
        assert_eq!(e.status, "y");
        assert_eq!(e.to_string(), "misc.test 30 1 y");

        let e = ActiveEntry::parse("misc.test 0 1").unwrap();
        assert_eq!(e.status, "");
        assert_eq!(e.to_string(), "misc.test 0 1");
    }

    #[test]
    fn test_active_line_rejects() {
        assert!(ActiveEntry::parse("misc.test 30").is_err());
        assert!(ActiveEntry::parse("misc.test 30 1 y extra").is_err());
        assert!(ActiveEntry::parse("misc.test x 1 y").is_err());
        assert!(ActiveEntry::parse("bad*name 1 1 y").is_err());
    }

    #[test]
    fn test_newsgroups_line() {
        let e = NewsgroupsEntry::parse("misc.test\tTesting, testing").unwrap();
        assert_eq!(e.name.as_str(), "misc.test");
        assert_eq!(e.description, "Testing, testing");
        let e = NewsgroupsEntry::parse("misc.test").unwrap();
        assert_eq!(e.description, "");
    }

    #[test]
    fn test_group_status() {
        let g = GroupStatus::parse("3 1 3 misc.test list follows").unwrap();
        assert_eq!((g.count, g.low, g.high), (3, 1, 3));
        assert_eq!(g.to_string(), "3 1 3 misc.test");
        assert!(GroupStatus::parse("3 1 3").is_err());
    }

    #[test]
    fn test_hdr_line() {
        let h = HdrEntry::parse("12 <a@b>").unwrap();
        assert_eq!(h.number, 12);
        assert_eq!(h.value, "<a@b>");
        assert_eq!(HdrEntry::parse("13 (none)").unwrap().value, "");
        assert!(HdrEntry::parse("x <a@b>").is_err());
    }

    #[test]
    fn test_overview_line() {
        let line = "7\tHello\tme@host\tMon, 1 Jan 2024 00:00:00 +0000\t<7@host>\t<6@host>\t120\t4\tXref: host misc.test:7";
        let o = Overview::parse(line).unwrap();
        assert_eq!(o.number, 7);
        assert_eq!(o.message_id, "<7@host>");
        assert_eq!(o.references, "<6@host>");
        assert_eq!((o.bytes, o.lines), (120, 4));
        assert_eq!(o.xref, "host misc.test:7");
        assert_eq!(o.to_string(), line);
    }

    #[test]
    fn test_overview_sanitizes_and_tolerates() {
        let o = Overview {
            number: 1,
            subject: "a\tb".into(),
            ..Overview::default()
        };
        assert_eq!(o.to_string(), "1\ta b\t\t\t\t\t0\t0\t");

        let o = Overview::parse("1\ts\tf\td\t<m@h>").unwrap();
        assert_eq!(o.references, "");
        assert!(Overview::parse("1\ts\tf").is_err());
    }
}
