//! Command line tokenizing.

const fn is_blank(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn trim_start(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&c| !is_blank(c)).unwrap_or(s.len());
    &s[start..]
}

/// A command line split into its keyword and the raw remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine<'a> {
    /// Keyword, ASCII-uppercased.
    pub keyword: String,
    /// Everything after the keyword, leading blanks removed.
    pub rest: &'a [u8],
}

impl<'a> CommandLine<'a> {
    /// Splits `line` at the first space or tab.
    #[must_use]
    pub fn split(line: &'a [u8]) -> Self {
        let end = line.iter().position(|&c| is_blank(c)).unwrap_or(line.len());
        Self {
            keyword: String::from_utf8_lossy(&line[..end]).to_ascii_uppercase(),
            rest: trim_start(&line[end..]),
        }
    }
}

/// Arguments split off a command remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSplit<'a> {
    /// Up to `max` blank-separated arguments.
    pub args: Vec<&'a [u8]>,
    /// Text left over once `max` arguments were taken, leading blanks
    /// removed. Empty when everything fit.
    pub extra: &'a [u8],
}

/// Splits up to `max` blank-separated arguments off `input`.
#[must_use]
pub fn split_args(input: &[u8], max: usize) -> ArgSplit<'_> {
    let mut args = Vec::with_capacity(max);
    let mut rest = trim_start(input);
    while args.len() < max && !rest.is_empty() {
        let end = rest.iter().position(|&c| is_blank(c)).unwrap_or(rest.len());
        args.push(&rest[..end]);
        rest = trim_start(&rest[end..]);
    }
    ArgSplit { args, extra: rest }
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
    fn test_split_keyword() {
        let cmd = CommandLine::split(b"list \t active  misc.*");
        assert_eq!(cmd.keyword, "LIST");
        assert_eq!(cmd.rest, b"active  misc.*");

        let cmd = CommandLine::split(b"quit");
        assert_eq!(cmd.keyword, "QUIT");
        assert!(cmd.rest.is_empty());
    }

    #[test]
    fn test_split_args() {
        let split = split_args(b"a  b\tc", 5);
        assert_eq!(split.args, [&b"a"[..], b"b", b"c"]);
        assert!(split.extra.is_empty());
    }

    #[test]
    fn test_split_args_overflow() {
        let split = split_args(b"a b  c d", 2);
        assert_eq!(split.args, [&b"a"[..], b"b"]);
        assert_eq!(split.extra, b"c d");

        let split = split_args(b"anything here", 0);
        assert!(split.args.is_empty());
        assert_eq!(split.extra, b"anything here");
    }

    #[test]
    fn test_split_args_trailing_blanks() {
        let split = split_args(b"a ", 1);
        assert_eq!(split.args, [&b"a"[..]]);
        assert!(split.extra.is_empty());
    }
}
