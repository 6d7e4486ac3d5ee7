//! One reader session against a remote.
//!
//! Wraps a framed connection with what the puller has learned about the
//! remote so far: advertised capabilities, detected quirks and which
//! listing methods it has refused.

#![allow(clippy::missing_errors_doc)]

use chrono::{DateTime, Utc};
use newsledger_nntp::types::format_query_date;
use newsledger_nntp::types::message_id::first_reference;
use newsledger_nntp::{
    ActiveEntry, ArticleRange, Capability, FramedStream, GroupName, GroupStatus, HdrEntry,
    MessageId, Overview, Response, ResponseCode, parse_response,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::pipeline::ArticleRef;
use crate::quirks::{MAX_LIST_SIZE, RemoteKind, RemoteQuirks};
use crate::{Error, Result};

/// What the remote offers, as far as this connection knows.
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RemoteState {
    /// The greeting allowed posting.
    pub posting: bool,
    /// `READER` was advertised.
    pub reader: bool,
    /// `HDR` was advertised.
    pub hdr: bool,
    /// `OVER` was advertised.
    pub over: bool,
    /// `NEWNEWS` was advertised.
    pub new_news: bool,
    /// Workarounds for the remote implementation.
    pub quirks: RemoteQuirks,
    bad_active: bool,
    bad_newsgroups: bool,
    bad_hdr: bool,
    bad_xhdr: bool,
    bad_over: bool,
    bad_xover: bool,
}

impl RemoteState {
    fn usable(&self, method: SliceMethod) -> bool {
        match method {
            SliceMethod::Hdr => self.hdr && !self.bad_hdr,
            SliceMethod::XHdr => !self.bad_xhdr,
            SliceMethod::Over => self.over && !self.bad_over,
            SliceMethod::XOver => !self.bad_xover,
        }
    }

    const fn mark_bad(&mut self, method: SliceMethod) {
        match method {
            SliceMethod::Hdr => self.bad_hdr = true,
            SliceMethod::XHdr => self.bad_xhdr = true,
            SliceMethod::Over => self.bad_over = true,
            SliceMethod::XOver => self.bad_xover = true,
        }
    }
}

/// Ways of listing the Message-IDs of a range, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SliceMethod {
    Hdr,
    XHdr,
    Over,
    XOver,
}

impl SliceMethod {
    const ALL: [Self; 4] = [Self::Hdr, Self::XHdr, Self::Over, Self::XOver];

    fn command(self, range: ArticleRange) -> String {
        match self {
            Self::Hdr => format!("HDR Message-ID {range}"),
            Self::XHdr => format!("XHDR Message-ID {range}"),
            Self::Over => format!("OVER {range}"),
            Self::XOver => format!("XOVER {range}"),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Hdr => "HDR",
            Self::XHdr => "XHDR",
            Self::Over => "OVER",
            Self::XOver => "XOVER",
        }
    }

    fn accepts(self, code: ResponseCode) -> bool {
        match self {
            Self::Hdr | Self::XHdr => {
                code == ResponseCode::HDR_FOLLOWS || code == ResponseCode::HEAD_FOLLOWS
            }
            Self::Over | Self::XOver => code == ResponseCode::OVERVIEW_FOLLOWS,
        }
    }

    const fn is_overview(self) -> bool {
        matches!(self, Self::Over | Self::XOver)
    }
}

/// A group as the remote listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteGroup {
    /// Group name.
    pub name: GroupName,
    /// High watermark, if the listing carried a trustworthy one.
    pub high: Option<u64>,
}

/// A reader connection to a remote.
pub struct Client<S> {
    framed: FramedStream<S>,
    state: RemoteState,
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the greeting. Only `200` and `201` start a session.
    pub async fn connect(stream: S) -> Result<Self> {
        let mut client = Self {
            framed: FramedStream::new(stream),
            state: RemoteState::default(),
        };
        let greeting = client.read_response().await?;
        match greeting.code.as_u16() {
            200 => client.state.posting = true,
            201 => {}
            _ => {
                return Err(Error::Protocol(format!(
                    "unexpected greeting {} {:?}",
                    greeting.code, greeting.text
                )));
            }
        }
        debug!(posting = client.state.posting, "greeting received");
        Ok(client)
    }

    /// Returns what is known about the remote.
    #[must_use]
    pub const fn state(&self) -> &RemoteState {
        &self.state
    }

    pub(crate) const fn framed(&mut self) -> &mut FramedStream<S> {
        &mut self.framed
    }

    /// Reads one status line. `400` ends the session.
    async fn read_response(&mut self) -> Result<Response> {
        let line = self.framed.read_line_required().await?;
        let response = parse_response(&line)?;
        if response.code == ResponseCode::SERVICE_DISCONTINUED {
            return Err(Error::Discontinued(response.text));
        }
        Ok(response)
    }

    /// Sends one command and reads its status line.
    async fn command(&mut self, line: &str) -> Result<Response> {
        debug!(command = line, "sending");
        self.framed.send_line(line).await?;
        self.read_response().await
    }

    /// Reads a dot-encoded body line by line.
    async fn body_lines(&mut self) -> Result<Vec<String>> {
        let mut body = self.framed.reader().dot_reader();
        let mut lines = Vec::new();
        while let Some(line) = body.next_line().await? {
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        Ok(lines)
    }

    /// Asks for CAPABILITIES and applies quirks. A remote without the
    /// command is left with the conservative defaults.
    pub async fn capabilities(&mut self) -> Result<()> {
        let response = self.command("CAPABILITIES").await?;
        if response.code != ResponseCode::CAPABILITIES_FOLLOW {
            debug!(code = %response.code, "no CAPABILITIES");
            return Ok(());
        }
        let caps: Vec<Capability> = self
            .body_lines()
            .await?
            .iter()
            .map(|line| Capability::parse(line))
            .collect();
        for cap in &caps {
            match cap {
                Capability::Reader => self.state.reader = true,
                Capability::Hdr => self.state.hdr = true,
                Capability::Over { .. } => self.state.over = true,
                Capability::NewNews => self.state.new_news = true,
                _ => {}
            }
        }
        let kind = RemoteKind::detect(&caps);
        if kind != RemoteKind::Unknown {
            info!(?kind, "detected remote implementation");
        }
        self.state.quirks = RemoteQuirks::for_remote(kind);
        Ok(())
    }

    /// Switches a mode-switching server to reader mode. `502` is fatal,
    /// `500` and `501` mean the remote has no such mode.
    pub async fn mode_reader(&mut self) -> Result<()> {
        let response = self.command("MODE READER").await?;
        match response.code.as_u16() {
            200 => self.state.posting = true,
            201..=299 => self.state.posting = false,
            500 | 501 => {}
            502 => {
                return Err(Error::Protocol(format!(
                    "MODE READER refused: {}",
                    response.text
                )));
            }
            _ => warn!(code = %response.code, text = %response.text, "odd MODE READER response"),
        }
        Ok(())
    }

    /// Capabilities, then MODE READER if `READER` was not advertised.
    pub async fn handshake(&mut self) -> Result<()> {
        self.capabilities().await?;
        if !self.state.reader {
            self.mode_reader().await?;
        }
        Ok(())
    }

    /// Lists the remote's groups, with LIST ACTIVE or else LIST NEWSGROUPS.
    pub async fn list_groups(&mut self) -> Result<Vec<RemoteGroup>> {
        if !self.state.bad_active {
            let response = self.command("LIST ACTIVE").await?;
            if response.code == ResponseCode::LIST_FOLLOWS {
                let broken = self.state.quirks.broken_active_list;
                let groups = self
                    .body_lines()
                    .await?
                    .iter()
                    .filter_map(|line| match ActiveEntry::parse(line) {
                        Ok(entry) => Some(active_group(entry, broken)),
                        Err(error) => {
                            warn!(%error, "skipping active line");
                            None
                        }
                    })
                    .collect();
                return Ok(groups);
            }
            warn!(code = %response.code, text = %response.text, "LIST ACTIVE refused");
            self.state.bad_active = true;
        }
        if !self.state.bad_newsgroups {
            let response = self.command("LIST NEWSGROUPS").await?;
            if response.code == ResponseCode::LIST_FOLLOWS {
                let groups = self
                    .body_lines()
                    .await?
                    .iter()
                    .filter_map(|line| leading_group(line))
                    .map(|name| RemoteGroup { name, high: None })
                    .collect();
                return Ok(groups);
            }
            warn!(code = %response.code, text = %response.text, "LIST NEWSGROUPS refused");
            self.state.bad_newsgroups = true;
        }
        Err(Error::NoMethod("list groups"))
    }

    /// Selects a group and returns its high watermark; 0 for an empty
    /// group.
    pub async fn group(&mut self, name: &GroupName) -> Result<u64> {
        let response = self.command(&format!("GROUP {name}")).await?;
        match response.code {
            ResponseCode::GROUP_SELECTED => {
                let status = GroupStatus::parse(&response.text)?;
                if status.low > status.high || status.count == 0 {
                    Ok(0)
                } else {
                    Ok(status.high)
                }
            }
            ResponseCode::NO_SUCH_GROUP => Err(Error::NoSuchGroup(name.to_string())),
            _ => Err(Error::unexpected(&response)),
        }
    }

    /// Lists groups created since `since`.
    pub async fn new_groups(&mut self, since: DateTime<Utc>) -> Result<Vec<GroupName>> {
        let response = self
            .command(&format!("NEWGROUPS {}", format_query_date(since)))
            .await?;
        if response.code != ResponseCode::NEW_GROUPS_FOLLOW {
            return Err(Error::unexpected(&response));
        }
        Ok(self
            .body_lines()
            .await?
            .iter()
            .filter_map(|line| leading_group(line))
            .collect())
    }

    /// Lists articles posted since `since` to groups matching `wildmat`.
    pub async fn new_news(
        &mut self,
        wildmat: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ArticleRef>> {
        let response = self
            .command(&format!("NEWNEWS {wildmat} {}", format_query_date(since)))
            .await?;
        if response.code != ResponseCode::NEW_ARTICLES_FOLLOW {
            return Err(Error::unexpected(&response));
        }
        Ok(self
            .body_lines()
            .await?
            .iter()
            .filter_map(|line| MessageId::parse(line.trim().as_bytes()).ok())
            .take(MAX_LIST_SIZE)
            .map(ArticleRef::by_id)
            .collect())
    }

    /// Lists the Message-IDs of `range` in the selected group.
    ///
    /// Tries HDR, XHDR, OVER and XOVER in turn; a method the remote
    /// refuses is not tried again on this connection. Articles outside
    /// the range are dropped, and at most [`MAX_LIST_SIZE`] are kept.
    pub async fn list_slice(&mut self, range: ArticleRange) -> Result<Vec<ArticleRef>> {
        for method in SliceMethod::ALL {
            if !self.state.usable(method) {
                continue;
            }
            let response = self.command(&method.command(range)).await?;
            if method.accepts(response.code) {
                return self.slice_lines(method, range).await;
            }
            match response.code {
                ResponseCode::NO_CURRENT_ARTICLE | ResponseCode::NO_ARTICLE_WITH_NUMBER => {
                    return Ok(Vec::new());
                }
                ResponseCode::UNKNOWN_COMMAND => {
                    debug!(method = method.name(), "not supported");
                }
                _ => {
                    warn!(
                        method = method.name(),
                        code = %response.code,
                        text = %response.text,
                        "unexpected response, trying next method"
                    );
                }
            }
            self.state.mark_bad(method);
        }
        Err(Error::NoMethod("list a group slice"))
    }

    async fn slice_lines(
        &mut self,
        method: SliceMethod,
        range: ArticleRange,
    ) -> Result<Vec<ArticleRef>> {
        let mut wanted = Vec::new();
        for line in self.body_lines().await? {
            let parsed = if method.is_overview() {
                overview_ref(&line)
            } else {
                hdr_ref(&line)
            };
            let article = match parsed {
                Ok(article) => article,
                Err(error) => {
                    warn!(method = method.name(), %error, "skipping listing line");
                    continue;
                }
            };
            let number = article.number.unwrap_or(0);
            let outside = match range.high {
                Some(_) => !range.contains(number),
                None => number < range.low || number - range.low >= MAX_LIST_SIZE as u64,
            };
            if number == 0 || outside {
                continue;
            }
            if wanted.len() >= MAX_LIST_SIZE {
                debug!(number, "listing cap reached, skipping");
                continue;
            }
            wanted.push(article);
        }
        Ok(wanted)
    }

    /// Says goodbye. The remote's answer is not required.
    pub async fn quit(&mut self) -> Result<()> {
        self.framed.send_line("QUIT").await?;
        match self.read_response().await {
            Ok(_) | Err(Error::Discontinued(_)) => Ok(()),
            Err(error) if error.is_fatal() => {
                debug!(%error, "connection ended during QUIT");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

fn active_group(entry: ActiveEntry, broken_active_list: bool) -> RemoteGroup {
    let high = if entry.high >= entry.low {
        Some(entry.high)
    } else if broken_active_list {
        None
    } else {
        Some(0)
    };
    RemoteGroup {
        name: entry.name,
        high,
    }
}

/// Parses the group name heading a listing line.
fn leading_group(line: &str) -> Option<GroupName> {
    let name = line.split_ascii_whitespace().next()?;
    GroupName::parse(name.as_bytes()).ok()
}

fn hdr_ref(line: &str) -> Result<ArticleRef> {
    let entry = HdrEntry::parse(line)?;
    let id = MessageId::parse(entry.value.as_bytes())?;
    Ok(ArticleRef::numbered(entry.number, id, None))
}

fn overview_ref(line: &str) -> Result<ArticleRef> {
    let over = Overview::parse(line)?;
    let id = MessageId::parse(over.message_id.as_bytes())?;
    Ok(ArticleRef::numbered(
        over.number,
        id,
        first_reference(&over.references),
    ))
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
    use tokio_test::io::Builder;

    use super::*;

    fn group(name: &str) -> GroupName {
        GroupName::parse(name.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_greeting() {
        let mock = Builder::new().read(b"200 welcome\r\n").build();
        let client = Client::connect(mock).await.unwrap();
        assert!(client.state().posting);

        let mock = Builder::new().read(b"201 read only\r\n").build();
        let client = Client::connect(mock).await.unwrap();
        assert!(!client.state().posting);

        let mock = Builder::new().read(b"502 go away\r\n").build();
        let err = Client::connect(mock).await.err().unwrap();
        assert!(matches!(err, Error::Protocol(_)));

        let mock = Builder::new().read(b"400 shutting down\r\n").build();
        let err = Client::connect(mock).await.err().unwrap();
        assert!(matches!(err, Error::Discontinued(_)));
    }

    #[tokio::test]
    async fn test_handshake_with_reader() {
        let mock = Builder::new()
            .read(b"201 hi\r\n")
            .write(b"CAPABILITIES\r\n")
            .read(b"101 caps\r\nVERSION 2\r\nREADER\r\nHDR\r\nOVER MSGID\r\nNEWNEWS\r\nIMPLEMENTATION srndv2\r\n.\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        client.handshake().await.unwrap();
        let state = client.state();
        assert!(state.reader && state.hdr && state.over && state.new_news);
        assert_eq!(state.quirks.kind, RemoteKind::Srndv2);
        assert!(state.quirks.broken_active_list);
    }

    #[tokio::test]
    async fn test_handshake_mode_reader() {
        let mock = Builder::new()
            .read(b"201 hi\r\n")
            .write(b"CAPABILITIES\r\n")
            .read(b"500 what?\r\n")
            .write(b"MODE READER\r\n")
            .read(b"200 posting ok\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        client.handshake().await.unwrap();
        assert!(client.state().posting);
        assert!(!client.state().hdr);

        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"MODE READER\r\n")
            .read(b"501 no modes here\r\n")
            .write(b"MODE READER\r\n")
            .read(b"502 not for you\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        client.mode_reader().await.unwrap();
        let err = client.mode_reader().await.err().unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_list_active() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"LIST ACTIVE\r\n")
            .read(b"215 list\r\nmisc.test 30 1 y\r\nalt.empty 0 1 y\r\nbad line\r\n.\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        let groups = client.list_groups().await.unwrap();
        assert_eq!(
            groups,
            vec![
                RemoteGroup {
                    name: group("misc.test"),
                    high: Some(30)
                },
                RemoteGroup {
                    name: group("alt.empty"),
                    high: Some(0)
                },
            ]
        );
    }

    #[test]
    fn test_broken_active_line() {
        let entry = ActiveEntry::parse("misc.test 0 1 y").unwrap();
        assert_eq!(active_group(entry.clone(), true).high, None);
        assert_eq!(active_group(entry, false).high, Some(0));
    }

    #[tokio::test]
    async fn test_list_falls_back_to_newsgroups() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"LIST ACTIVE\r\n")
            .read(b"503 no active file\r\n")
            .write(b"LIST NEWSGROUPS\r\n")
            .read(b"215 list\r\nmisc.test\tTesting\r\n.\r\n")
            .write(b"LIST NEWSGROUPS\r\n")
            .read(b"502 denied\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        let groups = client.list_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].high, None);

        // LIST ACTIVE is not retried on this connection
        let err = client.list_groups().await.err().unwrap();
        assert!(matches!(err, Error::NoMethod(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_group() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"GROUP misc.test\r\n")
            .read(b"211 3 5 7 misc.test\r\n")
            .write(b"GROUP misc.empty\r\n")
            .read(b"211 0 1 0 misc.empty\r\n")
            .write(b"GROUP misc.gone\r\n")
            .read(b"411 no such group\r\n")
            .write(b"GROUP misc.secret\r\n")
            .read(b"480 authentication required\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        assert_eq!(client.group(&group("misc.test")).await.unwrap(), 7);
        assert_eq!(client.group(&group("misc.empty")).await.unwrap(), 0);
        assert!(matches!(
            client.group(&group("misc.gone")).await,
            Err(Error::NoSuchGroup(_))
        ));
        assert!(matches!(
            client.group(&group("misc.secret")).await,
            Err(Error::UnexpectedResponse { code: 480, .. })
        ));
    }

    #[tokio::test]
    async fn test_slice_with_hdr() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"CAPABILITIES\r\n")
            .read(b"101 caps\r\nREADER\r\nHDR\r\n.\r\n")
            .write(b"HDR Message-ID 1-3\r\n")
            .read(b"225 headers\r\n1 <a@x>\r\n2 junk\r\n3 <c@x>\r\n9 <z@x>\r\n.\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        client.handshake().await.unwrap();
        let slice = client
            .list_slice(ArticleRange::new(1, Some(3)))
            .await
            .unwrap();
        let numbers: Vec<_> = slice.iter().map(|a| a.number).collect();
        assert_eq!(numbers, vec![Some(1), Some(3)]);
        assert_eq!(slice[1].id.as_str(), "<c@x>");
    }

    #[tokio::test]
    async fn test_slice_fallback_is_remembered() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"XHDR Message-ID 5-\r\n")
            .read(b"500 unknown command\r\n")
            .write(b"XOVER 5-\r\n")
            .read(b"224 overview\r\n5\ts\tf\td\t<e@x>\t<a@x> <b@x>\t10\t1\t\r\n.\r\n")
            .write(b"XOVER 6-\r\n")
            .read(b"423 no articles\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        let slice = client.list_slice(ArticleRange::new(5, None)).await.unwrap();
        assert_eq!(slice.len(), 1);
        assert_eq!(slice[0].reference.as_ref().unwrap().as_str(), "<a@x>");

        let slice = client.list_slice(ArticleRange::new(6, None)).await.unwrap();
        assert!(slice.is_empty());
    }

    #[tokio::test]
    async fn test_slice_no_method_left() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"XHDR Message-ID 1\r\n")
            .read(b"502 no\r\n")
            .write(b"XOVER 1\r\n")
            .read(b"500 no\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        let err = client
            .list_slice(ArticleRange::single(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::NoMethod(_)));
    }

    #[tokio::test]
    async fn test_new_groups_and_news() {
        let since = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 3, 1, 12, 0, 0).unwrap();
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"NEWGROUPS 20240301 120000 GMT\r\n")
            .read(b"231 new groups\r\nmisc.new 3 1 y\r\n.\r\n")
            .write(b"NEWNEWS misc.* 20240301 120000 GMT\r\n")
            .read(b"230 new articles\r\n<a@x>\r\nnot-an-id\r\n.\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        assert_eq!(
            client.new_groups(since).await.unwrap(),
            vec![group("misc.new")]
        );
        let news = client.new_news("misc.*", since).await.unwrap();
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].number, None);
    }

    #[tokio::test]
    async fn test_quit_tolerates_hangup() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"QUIT\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        client.quit().await.unwrap();
    }
}
