//! CAPABILITIES lines (RFC 3977 section 5.2).

use std::fmt;

/// One line of a CAPABILITIES listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `VERSION n...`
    Version(Vec<String>),
    /// `READER`
    Reader,
    /// `POST`
    Post,
    /// `IHAVE`
    IHave,
    /// `STREAMING` (RFC 4644)
    Streaming,
    /// `NEWNEWS`
    NewNews,
    /// `OVER`, with `MSGID` when overview by Message-ID is supported.
    Over {
        /// `OVER MSGID` was advertised.
        msgid: bool,
    },
    /// `HDR`
    Hdr,
    /// `LIST keyword...`
    List(Vec<String>),
    /// `STARTTLS`
    StartTls,
    /// `AUTHINFO [USER] [SASL]`
    AuthInfo(Vec<String>),
    /// `IMPLEMENTATION name...`
    Implementation(String),
    /// Anything else, label uppercased.
    Unknown(String),
}

impl Capability {
    /// Parses a capability line (without terminator).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_ascii_whitespace();
        let label = words.next().unwrap_or_default().to_ascii_uppercase();
        let args: Vec<String> = words.map(str::to_owned).collect();
        match label.as_str() {
            "VERSION" => Self::Version(args),
            "READER" => Self::Reader,
            "POST" => Self::Post,
            "IHAVE" => Self::IHave,
            "STREAMING" => Self::Streaming,
            "NEWNEWS" => Self::NewNews,
            "OVER" => Self::Over {
                msgid: args.iter().any(|a| a.eq_ignore_ascii_case("MSGID")),
            },
            "HDR" => Self::Hdr,
            "LIST" => Self::List(args.iter().map(|a| a.to_ascii_uppercase()).collect()),
            "STARTTLS" => Self::StartTls,
            "AUTHINFO" => Self::AuthInfo(args.iter().map(|a| a.to_ascii_uppercase()).collect()),
            "IMPLEMENTATION" => Self::Implementation(args.join(" ")),
            _ => Self::Unknown(label),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_args = |f: &mut fmt::Formatter<'_>, label: &str, args: &[String]| {
            if args.is_empty() {
                f.write_str(label)
            } else {
                write!(f, "{label} {}", args.join(" "))
            }
        };
        match self {
            Self::Version(v) => with_args(f, "VERSION", v),
            Self::Reader => f.write_str("READER"),
            Self::Post => f.write_str("POST"),
            Self::IHave => f.write_str("IHAVE"),
            Self::Streaming => f.write_str("STREAMING"),
            Self::NewNews => f.write_str("NEWNEWS"),
            Self::Over { msgid: false } => f.write_str("OVER"),
            Self::Over { msgid: true } => f.write_str("OVER MSGID"),
            Self::Hdr => f.write_str("HDR"),
            Self::List(v) => with_args(f, "LIST", v),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::AuthInfo(v) => with_args(f, "AUTHINFO", v),
            Self::Implementation(name) => write!(f, "IMPLEMENTATION {name}"),
            Self::Unknown(s) => f.write_str(s),
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
    fn test_parse_known() {
        assert_eq!(Capability::parse("READER"), Capability::Reader);
        assert_eq!(Capability::parse("hdr"), Capability::Hdr);
        assert_eq!(
            Capability::parse("OVER MSGID"),
            Capability::Over { msgid: true }
        );
        assert_eq!(Capability::parse("OVER"), Capability::Over { msgid: false });
        assert_eq!(
            Capability::parse("IMPLEMENTATION srndv2 nntpd"),
            Capability::Implementation("srndv2 nntpd".into())
        );
        assert_eq!(
            Capability::parse("LIST active Newsgroups"),
            Capability::List(vec!["ACTIVE".into(), "NEWSGROUPS".into()])
        );
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            Capability::parse("x-feature 1"),
            Capability::Unknown("X-FEATURE".into())
        );
    }

    #[test]
    fn test_display_round_trip() {
        for line in [
            "VERSION 2",
            "READER",
            "OVER MSGID",
            "LIST ACTIVE NEWSGROUPS OVERVIEW.FMT",
            "AUTHINFO USER",
            "IMPLEMENTATION newsledger",
        ] {
            assert_eq!(Capability::parse(line).to_string(), line);
        }
    }
}
