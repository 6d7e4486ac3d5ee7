//! Command tables.
//!
//! Each table is a static slice sorted by keyword. Arity rules travel with
//! the entry as data; the connection loop enforces them before a handler
//! runs.

use newsledger_nntp::split_args;

use crate::provider::ArticlePart;

/// Top-level commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITIES
    Capabilities,
    /// MODE READER / MODE STREAM
    Mode,
    /// HELP
    Help,
    /// LIST with its own sub-keyword table.
    List,
    /// QUIT
    Quit,
    /// SLAVE
    Slave,
    /// AUTHINFO with its own sub-keyword table.
    AuthInfo,
    /// STARTTLS
    StartTls,
    /// DATE
    Date,
    /// GROUP
    Group,
    /// LISTGROUP
    ListGroup,
    /// NEXT
    Next,
    /// LAST
    Last,
    /// ARTICLE, HEAD, BODY, STAT
    Article(ArticlePart),
    /// NEWGROUPS
    NewGroups,
    /// NEWNEWS
    NewNews,
    /// XGTITLE
    XgTitle,
    /// OVER (false) or XOVER (true).
    Over {
        /// Legacy XOVER status codes.
        legacy: bool,
    },
    /// HDR (false) or XHDR (true).
    Hdr {
        /// Legacy XHDR status codes.
        legacy: bool,
    },
    /// POST
    Post,
    /// IHAVE
    IHave,
    /// CHECK
    Check,
    /// TAKETHIS
    TakeThis,
}

/// LIST sub-keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListCommand {
    /// LIST ACTIVE
    Active,
    /// LIST NEWSGROUPS
    Newsgroups,
    /// LIST OVERVIEW.FMT
    OverviewFmt,
}

/// AUTHINFO sub-keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthCommand {
    /// AUTHINFO USER
    User,
    /// AUTHINFO PASS
    Pass,
    /// AUTHINFO SASL
    Sasl,
}

/// One table entry.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec<K> {
    /// Uppercase keyword.
    pub keyword: &'static str,
    /// What to run.
    pub kind: K,
    /// Fewest arguments accepted.
    pub min_args: usize,
    /// Most arguments split off.
    pub max_args: usize,
    /// Text past `max_args` goes to the handler instead of failing.
    pub allow_extra: bool,
    /// HELP text following the keyword.
    pub help: &'static str,
}

const fn spec<K>(
    keyword: &'static str,
    kind: K,
    min_args: usize,
    max_args: usize,
    help: &'static str,
) -> CommandSpec<K> {
    CommandSpec {
        keyword,
        kind,
        min_args,
        max_args,
        allow_extra: false,
        help,
    }
}

const fn extra<K>(keyword: &'static str, kind: K, help: &'static str) -> CommandSpec<K> {
    CommandSpec {
        keyword,
        kind,
        min_args: 0,
        max_args: 0,
        allow_extra: true,
        help,
    }
}

/// Top-level command table, sorted by keyword.
pub static COMMANDS: &[CommandSpec<Command>] = &[
    spec(
        "ARTICLE",
        Command::Article(ArticlePart::Full),
        0,
        1,
        "[<message-id>|number] - send headers, a blank line and the body of an article",
    ),
    extra(
        "AUTHINFO",
        Command::AuthInfo,
        "USER|PASS|SASL ... - authenticate",
    ),
    spec(
        "BODY",
        Command::Article(ArticlePart::Body),
        0,
        1,
        "[<message-id>|number] - send the body of an article",
    ),
    extra(
        "CAPABILITIES",
        Command::Capabilities,
        "- list what this server can do",
    ),
    spec(
        "CHECK",
        Command::Check,
        1,
        1,
        "<message-id> - ask whether an article is wanted",
    ),
    spec("DATE", Command::Date, 0, 0, "- show the server's UTC time"),
    spec(
        "GROUP",
        Command::Group,
        1,
        1,
        "group - select a group and its first article",
    ),
    spec(
        "HDR",
        Command::Hdr { legacy: false },
        1,
        2,
        "field [range|<message-id>] - send one header of the selected articles",
    ),
    spec(
        "HEAD",
        Command::Article(ArticlePart::Head),
        0,
        1,
        "[<message-id>|number] - send the headers of an article",
    ),
    spec("HELP", Command::Help, 0, 2, "[command [keyword]] - show this text"),
    spec(
        "IHAVE",
        Command::IHave,
        1,
        1,
        "<message-id> - offer an article for transfer",
    ),
    spec(
        "LAST",
        Command::Last,
        0,
        0,
        "- move to the previous article in the group",
    ),
    extra(
        "LIST",
        Command::List,
        "[keyword [wildmat]] - list information, ACTIVE by default",
    ),
    spec(
        "LISTGROUP",
        Command::ListGroup,
        0,
        2,
        "[group [range]] - select a group and list its article numbers",
    ),
    spec(
        "MODE",
        Command::Mode,
        1,
        1,
        "READER|STREAM - switch to reader or streaming mode",
    ),
    spec(
        "NEWGROUPS",
        Command::NewGroups,
        2,
        4,
        "[YY]YYMMDD hhmmss [GMT] - list groups created since the given time",
    ),
    spec(
        "NEWNEWS",
        Command::NewNews,
        3,
        5,
        "wildmat [YY]YYMMDD hhmmss [GMT] - list articles received since the given time",
    ),
    spec(
        "NEXT",
        Command::Next,
        0,
        0,
        "- move to the next article in the group",
    ),
    spec(
        "OVER",
        Command::Over { legacy: false },
        0,
        1,
        "[range|<message-id>] - send overview data of the selected articles",
    ),
    spec("POST", Command::Post, 0, 0, "- post an article"),
    extra("QUIT", Command::Quit, "- close the connection"),
    spec(
        "SLAVE",
        Command::Slave,
        0,
        0,
        "- announce a slave relationship",
    ),
    spec(
        "STARTTLS",
        Command::StartTls,
        0,
        0,
        "- begin TLS negotiation",
    ),
    spec(
        "STAT",
        Command::Article(ArticlePart::Stat),
        0,
        1,
        "[<message-id>|number] - check that an article exists",
    ),
    spec(
        "TAKETHIS",
        Command::TakeThis,
        1,
        1,
        "<message-id> - send an article without asking first",
    ),
    spec(
        "XGTITLE",
        Command::XgTitle,
        0,
        1,
        "[wildmat] - same as LIST NEWSGROUPS",
    ),
    spec(
        "XHDR",
        Command::Hdr { legacy: true },
        1,
        2,
        "field [range|<message-id>] - same as HDR with legacy status codes",
    ),
    spec(
        "XOVER",
        Command::Over { legacy: true },
        0,
        1,
        "[range] - same as OVER with legacy status codes",
    ),
];

/// LIST sub-keyword table, sorted by keyword.
pub static LIST_COMMANDS: &[CommandSpec<ListCommand>] = &[
    spec(
        "ACTIVE",
        ListCommand::Active,
        0,
        1,
        "[wildmat] - list groups as `name high low status`",
    ),
    spec(
        "NEWSGROUPS",
        ListCommand::Newsgroups,
        0,
        1,
        "[wildmat] - list groups with their descriptions",
    ),
    spec(
        "OVERVIEW.FMT",
        ListCommand::OverviewFmt,
        0,
        0,
        "- list the fields returned by OVER",
    ),
];

/// AUTHINFO sub-keyword table, sorted by keyword.
pub static AUTH_COMMANDS: &[CommandSpec<AuthCommand>] = &[
    spec("PASS", AuthCommand::Pass, 1, 1, "password - send the password"),
    spec(
        "SASL",
        AuthCommand::Sasl,
        1,
        2,
        "mechanism [initial-response] - authenticate with SASL",
    ),
    spec("USER", AuthCommand::User, 1, 1, "username - send the user name"),
];

/// Finds `keyword` (already uppercase) in a sorted table.
#[must_use]
pub fn lookup<K>(
    table: &'static [CommandSpec<K>],
    keyword: &str,
) -> Option<&'static CommandSpec<K>> {
    table
        .binary_search_by(|spec| spec.keyword.cmp(keyword))
        .ok()
        .map(|i| &table[i])
}

/// Arguments accepted for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args<'a> {
    /// Split arguments.
    pub args: Vec<&'a [u8]>,
    /// Unsplit remainder, for `allow_extra` commands only.
    pub rest: &'a [u8],
}

/// Why arguments were refused; each maps to a 501 line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityError {
    /// Fewer than `min_args`.
    NotEnough,
    /// More than `max_args` on a command without `allow_extra`.
    TooMany,
}

impl ArityError {
    /// Response text.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotEnough => "not enough parameters",
            Self::TooMany => "too many parameters",
        }
    }
}

impl<K> CommandSpec<K> {
    /// Splits `input` according to this entry's arity.
    ///
    /// # Errors
    ///
    /// Returns [`ArityError`] when the count is out of bounds.
    pub fn split<'a>(&self, input: &'a [u8]) -> Result<Args<'a>, ArityError> {
        let split = split_args(input, self.max_args);
        if !split.extra.is_empty() {
            if !self.allow_extra {
                return Err(ArityError::TooMany);
            }
            return Ok(Args {
                args: split.args,
                rest: split.extra,
            });
        }
        if split.args.len() < self.min_args {
            return Err(ArityError::NotEnough);
        }
        Ok(Args {
            args: split.args,
            rest: &[],
        })
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

    fn assert_sorted<K>(table: &[CommandSpec<K>]) {
        assert!(table.windows(2).all(|w| w[0].keyword < w[1].keyword));
    }

    #[test]
    fn test_tables_sorted() {
        assert_sorted(COMMANDS);
        assert_sorted(LIST_COMMANDS);
        assert_sorted(AUTH_COMMANDS);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup(COMMANDS, "GROUP").unwrap().kind, Command::Group);
        assert!(lookup(COMMANDS, "").is_none());
        assert_eq!(
            lookup(LIST_COMMANDS, "OVERVIEW.FMT").unwrap().kind,
            ListCommand::OverviewFmt
        );
        assert!(lookup(COMMANDS, "XYZZY").is_none());
    }

    #[test]
    fn test_arity_one_one() {
        let group = lookup(COMMANDS, "GROUP").unwrap();
        assert_eq!(group.split(b"").unwrap_err(), ArityError::NotEnough);
        assert_eq!(group.split(b"a b").unwrap_err(), ArityError::TooMany);
        assert_eq!(group.split(b"a").unwrap().args, [&b"a"[..]]);
    }

    #[test]
    fn test_allow_extra_passes_rest() {
        let list = lookup(COMMANDS, "LIST").unwrap();
        let args = list.split(b"ACTIVE  misc.*").unwrap();
        assert!(args.args.is_empty());
        assert_eq!(args.rest, b"ACTIVE  misc.*");
        assert!(list.split(b"").unwrap().rest.is_empty());
    }

    #[test]
    fn test_arity_messages() {
        assert_eq!(ArityError::NotEnough.message(), "not enough parameters");
        assert_eq!(ArityError::TooMany.message(), "too many parameters");
    }
}
