//! Spooled article data.

use chrono::{DateTime, Utc};
use newsledger_nntp::{GroupName, HdrEntry, MessageId, Overview};

use crate::{Error, Result};

/// An article split into headers and body, with LF line endings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    /// Header block, ending with LF.
    pub head: Vec<u8>,
    /// Body, possibly empty.
    pub body: Vec<u8>,
    /// Unfolded headers as `(lowercase name, value)`, in order.
    headers: Vec<(String, String)>,
}

impl ParsedArticle {
    /// Splits `raw` at the first empty line and parses the headers.
    ///
    /// CRLF line endings are converted to LF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] when there are no headers or a header
    /// line lacks its colon.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let raw = to_lf(raw);
        let (head, body) = match find(&raw, b"\n\n") {
            Some(at) => (raw[..=at].to_vec(), raw[at + 2..].to_vec()),
            None => {
                let mut head = raw.clone();
                if !head.ends_with(b"\n") {
                    head.push(b'\n');
                }
                (head, Vec::new())
            }
        };
        if head.first() == Some(&b'\n') {
            return Err(Error::Malformed("no headers".into()));
        }

        let mut headers: Vec<(String, String)> = Vec::new();
        for line in String::from_utf8_lossy(&head).lines() {
            if line.starts_with([' ', '\t']) {
                let Some((_, value)) = headers.last_mut() else {
                    return Err(Error::Malformed("continuation before first header".into()));
                };
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(Error::Malformed(format!("header line without colon {line:?}")));
            };
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_owned()));
        }
        Ok(Self {
            head,
            body,
            headers,
        })
    }

    /// Returns the first value of a header, by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the Message-ID header, if present.
    ///
    /// # Errors
    ///
    /// Returns an error when the header is present but invalid.
    pub fn message_id(&self) -> Result<Option<MessageId>> {
        self.header("message-id")
            .map(|v| MessageId::parse(v.as_bytes()))
            .transpose()
            .map_err(Error::from)
    }

    /// Valid group names of the Newsgroups header, in order.
    #[must_use]
    pub fn newsgroups(&self) -> Vec<GroupName> {
        self.header("newsgroups")
            .unwrap_or_default()
            .split(',')
            .filter_map(|g| GroupName::parse(g.trim().as_bytes()).ok())
            .collect()
    }

    /// Prepends a header line.
    pub fn prepend_header(&mut self, name: &str, value: &str) {
        let mut head = format!("{name}: {value}\n").into_bytes();
        head.append(&mut self.head);
        self.head = head;
        self.headers
            .insert(0, (name.to_ascii_lowercase(), value.to_owned()));
    }
}

/// A filed article.
#[derive(Debug, Clone)]
pub struct StoredArticle {
    /// Message-ID.
    pub message_id: MessageId,
    /// Headers and body.
    pub article: ParsedArticle,
    /// Groups and numbers the article was filed under.
    pub filed: Vec<(GroupName, u64)>,
    /// Xref value: `host group:number ...`.
    pub xref: String,
    /// Arrival time.
    pub arrived: DateTime<Utc>,
}

impl StoredArticle {
    /// Size in octets with CRLF line endings, as sent on the wire.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        let head = &self.article.head;
        let body = &self.article.body;
        let newlines = count_lines(head) + count_lines(body) + 1;
        (head.len() + body.len() + 1) as u64 + newlines
    }

    /// Number of body lines.
    #[must_use]
    pub fn lines(&self) -> u64 {
        let body = &self.article.body;
        let partial = u64::from(!body.is_empty() && !body.ends_with(b"\n"));
        count_lines(body) + partial
    }

    /// Overview line under `number` (0 when looked up by Message-ID).
    #[must_use]
    pub fn overview(&self, number: u64) -> Overview {
        let header = |name| self.article.header(name).unwrap_or_default().to_owned();
        Overview {
            number,
            subject: header("subject"),
            from: header("from"),
            date: header("date"),
            message_id: self.message_id.to_string(),
            references: header("references"),
            bytes: self.bytes(),
            lines: self.lines(),
            xref: self.xref.clone(),
        }
    }

    /// Value of a header or metadata item (`:bytes`, `:lines`) for HDR.
    /// A missing header gives an empty value.
    #[must_use]
    pub fn header_entry(&self, field: &str, number: u64) -> HdrEntry {
        let value = match field {
            ":bytes" => self.bytes().to_string(),
            ":lines" => self.lines().to_string(),
            "xref" => self.xref.clone(),
            "message-id" => self.message_id.to_string(),
            _ => self.article.header(field).unwrap_or_default().to_owned(),
        };
        HdrEntry { number, value }
    }
}

fn count_lines(data: &[u8]) -> u64 {
    data.iter().filter(|&&c| c == b'\n').count() as u64
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn to_lf(raw: &[u8]) -> Vec<u8> {
    if !raw.contains(&b'\r') {
        return raw.to_vec();
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.iter().peekable();
    while let Some(&c) = bytes.next() {
        if c == b'\r' && bytes.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(c);
    }
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

    const RAW: &[u8] = b"From: a@example.org\r\nSubject: hello\r\n  world\r\nNewsgroups: misc.test, bad name,alt.test\r\nMessage-ID: <1@example.org>\r\nReferences: <0@example.org> <p@example.org>\r\n\r\nline one\r\nline two\r\n";

    #[test]
    fn test_parse_headers() {
        let parsed = ParsedArticle::parse(RAW).unwrap();
        assert_eq!(parsed.header("SUBJECT"), Some("hello world"));
        assert_eq!(parsed.header("from"), Some("a@example.org"));
        assert_eq!(parsed.header("date"), None);
        assert_eq!(
            parsed.message_id().unwrap().unwrap().as_str(),
            "<1@example.org>"
        );
        let groups: Vec<_> = parsed
            .newsgroups()
            .iter()
            .map(|g| g.as_str().to_owned())
            .collect();
        assert_eq!(groups, ["misc.test", "alt.test"]);
        assert!(parsed.head.ends_with(b"\n"));
        assert!(!parsed.head.contains(&b'\r'));
        assert_eq!(parsed.body, b"line one\nline two\n");
    }

    #[test]
    fn test_parse_head_only() {
        let parsed = ParsedArticle::parse(b"Subject: x").unwrap();
        assert_eq!(parsed.head, b"Subject: x\n");
        assert!(parsed.body.is_empty());
    }

    #[test]
    fn test_parse_rejects() {
        assert!(matches!(
            ParsedArticle::parse(b"\nbody only\n"),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            ParsedArticle::parse(b"no colon here\n\nbody\n"),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            ParsedArticle::parse(b" folded\n\nbody\n"),
            Err(Error::Malformed(_))
        ));
        let bad_id = ParsedArticle::parse(b"Message-ID: nope\n\n").unwrap();
        assert!(bad_id.message_id().is_err());
    }

    #[test]
    fn test_prepend_header() {
        let mut parsed = ParsedArticle::parse(b"Subject: x\n\nbody\n").unwrap();
        parsed.prepend_header("Message-ID", "<new@example.org>");
        assert!(parsed.head.starts_with(b"Message-ID: <new@example.org>\n"));
        assert_eq!(parsed.header("message-id"), Some("<new@example.org>"));
    }

    #[test]
    fn test_overview_and_metadata() {
        let article = ParsedArticle::parse(RAW).unwrap();
        let stored = StoredArticle {
            message_id: article.message_id().unwrap().unwrap(),
            article,
            filed: Vec::new(),
            xref: "spool misc.test:3".into(),
            arrived: Utc::now(),
        };
        assert_eq!(stored.lines(), 2);
        let over = stored.overview(3);
        assert_eq!(over.subject, "hello world");
        assert_eq!(over.references, "<0@example.org> <p@example.org>");
        assert_eq!(over.lines, 2);
        assert_eq!(over.xref, "spool misc.test:3");
        assert_eq!(stored.header_entry(":lines", 3).value, "2");
        assert_eq!(stored.header_entry("x-missing", 3).value, "");
    }
}
