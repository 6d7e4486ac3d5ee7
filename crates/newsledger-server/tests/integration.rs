//! Integration tests for the NNTP server.
//!
//! Each test serves one in-memory duplex connection from a spool and
//! talks to it line by line, the way a client on a socket would.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};

use newsledger_core::Spool;
use newsledger_nntp::{GroupName, MessageId};
use newsledger_server::{ConfigHandle, RunConfig, Server, UserPassMap, UserPriv};

/// Client end of a served connection.
struct Conn {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl Conn {
    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// Reads one line, terminator stripped. Empty on end of stream.
    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line.trim_end_matches(['\r', '\n']).to_owned()
    }

    async fn cmd(&mut self, line: &str) -> String {
        self.send(line).await;
        self.line().await
    }

    /// Reads a dot-terminated body, still dot-stuffed.
    async fn body(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.line().await;
            if line == "." {
                return lines;
            }
            lines.push(line);
        }
    }

    async fn send_article(&mut self, lines: &[&str]) {
        for line in lines {
            self.send(line).await;
        }
        self.send(".").await;
    }
}

fn name(s: &str) -> GroupName {
    GroupName::parse(s.as_bytes()).unwrap()
}

async fn spool() -> Arc<Spool> {
    let spool = Arc::new(Spool::new("spool.test"));
    spool.create_group(&name("misc.test"), "Testing", true).await;
    spool.create_group(&name("misc.empty"), "Nothing here", true).await;
    spool
}

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

/// Serves one connection with `config` and returns the client end, the
/// greeting already read.
async fn serve(spool: Arc<Spool>, config: RunConfig) -> (Conn, String) {
    let server = Server::new(spool, ConfigHandle::new(config));
    let (client, served) = tokio::io::duplex(64 * 1024);
    server.serve_connection(served, peer());
    let (reader, writer) = tokio::io::split(client);
    let mut conn = Conn {
        reader: BufReader::new(reader),
        writer,
    };
    let greeting = conn.line().await;
    (conn, greeting)
}

async fn connect() -> Conn {
    serve(spool().await, RunConfig::default()).await.0
}

const ARTICLE: [&str; 7] = [
    "From: poster@example.org",
    "Subject: hello",
    "Newsgroups: misc.test",
    "Message-ID: <hello@example.org>",
    "",
    "first line",
    "..hidden dot",
];

#[tokio::test]
async fn test_greeting() {
    let (_, greeting) = serve(spool().await, RunConfig::default()).await;
    assert!(greeting.starts_with("200 "));

    let read_only = RunConfig::builder()
        .default_priv(UserPriv {
            read: true,
            post: false,
        })
        .build();
    let (_, greeting) = serve(spool().await, read_only).await;
    assert!(greeting.starts_with("201 "));
}

#[tokio::test]
async fn test_capabilities() {
    let mut conn = connect().await;
    assert!(conn.cmd("CAPABILITIES").await.starts_with("101 "));
    let caps = conn.body().await;
    assert_eq!(caps[0], "VERSION 2");
    for expected in [
        "READER",
        "POST",
        "IHAVE",
        "STREAMING",
        "NEWNEWS",
        "OVER MSGID",
        "HDR",
        "LIST ACTIVE NEWSGROUPS OVERVIEW.FMT",
        "IMPLEMENTATION newsledger",
    ] {
        assert!(caps.iter().any(|c| c == expected), "missing {expected}");
    }
    assert!(!caps.iter().any(|c| c == "STARTTLS"));
    assert!(!caps.iter().any(|c| c.starts_with("AUTHINFO")));
}

#[tokio::test]
async fn test_command_errors() {
    let mut conn = connect().await;
    assert!(conn.cmd("FROBNICATE").await.starts_with("500 "));
    assert_eq!(conn.cmd("GROUP").await, "501 not enough parameters");
    assert_eq!(conn.cmd("GROUP a b").await, "501 too many parameters");
    assert!(conn.cmd("ARTICLE 1-3").await.starts_with("501 "));
    assert!(conn.cmd("NEWNEWS * 20240230 000000").await.starts_with("501 "));
    assert!(conn.cmd(" DATE").await.starts_with("501 "));

    let long = format!("XOVER {}", "9".repeat(600));
    assert_eq!(conn.cmd(&long).await, "501 command too long");
    assert!(conn.cmd("DATE").await.starts_with("111 "));
}

#[tokio::test]
async fn test_date_and_help() {
    let mut conn = connect().await;
    let date = conn.cmd("DATE").await;
    let stamp = date.strip_prefix("111 ").unwrap();
    assert_eq!(stamp.len(), 14);
    assert!(stamp.bytes().all(|c| c.is_ascii_digit()));

    assert!(conn.cmd("HELP").await.starts_with("100 "));
    let help = conn.body().await;
    assert!(help.iter().any(|l| l.trim_start().starts_with("ARTICLE")));

    assert!(conn.cmd("HELP LIST").await.starts_with("100 "));
    let list_help = conn.body().await;
    assert!(list_help.iter().all(|l| l.trim_start().starts_with("LIST ")));
    assert!(conn.cmd("help list active").await.starts_with("100 "));
    let active_help = conn.body().await;
    assert_eq!(active_help.len(), 1);
    assert!(active_help[0].trim_start().starts_with("LIST ACTIVE"));
    assert!(conn.cmd("HELP GROUP misc").await.starts_with("501 "));
    assert!(conn.cmd("HELP NOSUCH").await.starts_with("501 "));
}

#[tokio::test]
async fn test_group_selection() {
    let mut conn = connect().await;
    assert!(conn.cmd("GROUP alt.nowhere").await.starts_with("411 "));
    assert!(conn.cmd("ARTICLE 1").await.starts_with("412 "));
    assert_eq!(conn.cmd("GROUP misc.empty").await, "211 0 0 0 misc.empty");
    assert!(conn.cmd("ARTICLE").await.starts_with("420 "));
    assert!(conn.cmd("NEXT").await.starts_with("420 "));
    assert!(conn.cmd("LISTGROUP").await.starts_with("211 0 0 0 misc.empty"));
    assert!(conn.body().await.is_empty());
    assert!(conn.cmd("XOVER 1-").await.starts_with("420 "));
    assert!(conn.cmd("OVER 1-").await.starts_with("423 "));
}

#[tokio::test]
async fn test_post_then_read() {
    let mut conn = connect().await;
    assert!(conn.cmd("POST").await.starts_with("340 "));
    conn.send_article(&ARTICLE).await;
    assert!(conn.line().await.starts_with("240 "));

    assert_eq!(conn.cmd("GROUP misc.test").await, "211 1 1 1 misc.test");
    assert_eq!(conn.cmd("ARTICLE").await, "220 1 <hello@example.org>");
    let article = conn.body().await;
    assert!(article.contains(&"Subject: hello".to_owned()));
    assert_eq!(article.last().unwrap(), "..hidden dot");

    assert_eq!(conn.cmd("BODY 1").await, "222 1 <hello@example.org>");
    assert_eq!(conn.body().await, ["first line", "..hidden dot"]);
    assert_eq!(
        conn.cmd("STAT <hello@example.org>").await,
        "223 0 <hello@example.org>"
    );
    assert!(conn.cmd("STAT <missing@example.org>").await.starts_with("430 "));
    assert!(conn.cmd("STAT 7").await.starts_with("423 "));

    assert!(conn.cmd("OVER 1-").await.starts_with("224 "));
    let over = conn.body().await;
    assert_eq!(over.len(), 1);
    assert!(over[0].starts_with("1\thello\tposter@example.org\t"));

    assert!(conn.cmd("XHDR subject 1").await.starts_with("221 "));
    assert_eq!(conn.body().await, ["1 hello"]);
    assert!(conn.cmd("HDR Message-ID <hello@example.org>").await.starts_with("225 "));
    assert_eq!(conn.body().await, ["0 <hello@example.org>"]);

    assert!(conn.cmd("LIST ACTIVE misc.*").await.starts_with("215 "));
    let active = conn.body().await;
    assert!(active.contains(&"misc.test 1 1 y".to_owned()));
    assert!(conn.cmd("NEWNEWS misc.* 19990101 000000 GMT").await.starts_with("230 "));
    assert_eq!(conn.body().await, ["<hello@example.org>"]);
}

#[tokio::test]
async fn test_post_refused() {
    let mut conn = connect().await;
    assert!(conn.cmd("POST").await.starts_with("340 "));
    conn.send_article(&["Subject: no sender", "Newsgroups: misc.test", "", "x"])
        .await;
    assert!(conn.line().await.starts_with("441 "));
}

#[tokio::test]
async fn test_ihave() {
    let spool = spool().await;
    let (mut conn, _) = serve(Arc::clone(&spool), RunConfig::default()).await;
    assert!(conn.cmd("IHAVE <hello@example.org>").await.starts_with("335 "));
    conn.send_article(&ARTICLE).await;
    assert!(conn.line().await.starts_with("235 "));
    assert!(conn.cmd("IHAVE <hello@example.org>").await.starts_with("435 "));
    assert!(conn.cmd("IHAVE <0>").await.starts_with("435 "));
    assert!(conn.cmd("IHAVE nonsense").await.starts_with("501 "));

    let id = MessageId::parse(b"<hello@example.org>").unwrap();
    assert!(spool.contains(&id).await);
}

#[tokio::test]
async fn test_streaming() {
    let mut conn = connect().await;
    assert!(conn.cmd("MODE STREAM").await.starts_with("203 "));
    assert_eq!(
        conn.cmd("CHECK <hello@example.org>").await,
        "238 <hello@example.org>"
    );
    conn.send("TAKETHIS <hello@example.org>").await;
    conn.send_article(&ARTICLE).await;
    assert_eq!(conn.line().await, "239 <hello@example.org>");
    assert_eq!(
        conn.cmd("CHECK <hello@example.org>").await,
        "438 <hello@example.org>"
    );

    // the body is consumed even when refused
    conn.send("TAKETHIS <hello@example.org>").await;
    conn.send_article(&ARTICLE).await;
    assert_eq!(conn.line().await, "439 <hello@example.org>");
    assert!(conn.cmd("DATE").await.starts_with("111 "));
}

#[tokio::test]
async fn test_authinfo() {
    let mut conn = connect().await;
    assert!(conn.cmd("AUTHINFO USER bob").await.starts_with("503 "));

    let mut users = UserPassMap::new();
    users
        .insert("bob", Some("secret".into()), UserPriv::ALL)
        .unwrap();
    let config = RunConfig::builder()
        .default_priv(UserPriv::NONE)
        .user_pass(Arc::new(users))
        .build();
    let (mut conn, greeting) = serve(spool().await, config.clone()).await;
    assert!(greeting.starts_with("201 "));
    assert!(conn.cmd("GROUP misc.test").await.starts_with("480 "));
    assert!(conn.cmd("AUTHINFO USER bob").await.starts_with("483 "));

    let unsafe_config = RunConfig {
        unsafe_pass: true,
        ..config
    };
    let (mut conn, _) = serve(spool().await, unsafe_config).await;
    assert!(conn.cmd("AUTHINFO PASS secret").await.starts_with("482 "));
    assert!(conn.cmd("AUTHINFO USER bob").await.starts_with("381 "));
    assert!(conn.cmd("AUTHINFO PASS wrong").await.starts_with("481 "));
    assert!(conn.cmd("AUTHINFO USER bob").await.starts_with("381 "));
    assert!(conn.cmd("AUTHINFO PASS secret").await.starts_with("281 "));
    assert!(conn.cmd("GROUP misc.test").await.starts_with("211 "));
    assert!(conn.cmd("AUTHINFO USER bob").await.starts_with("502 "));
}

#[tokio::test]
async fn test_authinfo_early_user_reject() {
    let mut users = UserPassMap::new();
    users
        .insert("bob", Some("secret".into()), UserPriv::ALL)
        .unwrap();
    let config = RunConfig::builder()
        .default_priv(UserPriv::NONE)
        .user_pass(Arc::new(users))
        .unsafe_pass(true)
        .build();

    // unknown names look like known ones until PASS
    let (mut conn, _) = serve(spool().await, config.clone()).await;
    assert!(conn.cmd("AUTHINFO USER mallory").await.starts_with("381 "));
    assert!(conn.cmd("AUTHINFO PASS secret").await.starts_with("481 "));

    let early = RunConfig {
        unsafe_early_user_reject: true,
        ..config
    };
    let (mut conn, _) = serve(spool().await, early).await;
    assert!(conn.cmd("AUTHINFO USER mallory").await.starts_with("481 "));
    assert!(conn.cmd("AUTHINFO PASS secret").await.starts_with("482 "));
    assert!(conn.cmd("AUTHINFO USER bob").await.starts_with("381 "));
    assert!(conn.cmd("AUTHINFO PASS secret").await.starts_with("281 "));
}

#[tokio::test]
async fn test_starttls_unconfigured() {
    let mut conn = connect().await;
    assert!(conn.cmd("STARTTLS").await.starts_with("580 "));
    assert!(conn.cmd("DATE").await.starts_with("111 "));
}

#[tokio::test]
async fn test_quit_closes() {
    let mut conn = connect().await;
    assert!(conn.cmd("QUIT").await.starts_with("205 "));
    assert_eq!(conn.line().await, "");
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let server = Server::new(spool().await, ConfigHandle::new(RunConfig::default()));
    let (client, served) = tokio::io::duplex(64 * 1024);
    server.serve_connection(served, peer());
    let (reader, writer) = tokio::io::split(client);
    let mut conn = Conn {
        reader: BufReader::new(reader),
        writer,
    };
    assert!(conn.line().await.starts_with("200 "));
    server.shutdown().await;
    assert_eq!(conn.line().await, "");
}

#[tokio::test]
async fn test_shutdown_during_post_body() {
    let server = Server::new(spool().await, ConfigHandle::new(RunConfig::default()));
    let (client, served) = tokio::io::duplex(64 * 1024);
    server.serve_connection(served, peer());
    let (reader, writer) = tokio::io::split(client);
    let mut conn = Conn {
        reader: BufReader::new(reader),
        writer,
    };
    assert!(conn.line().await.starts_with("200 "));
    assert!(conn.cmd("POST").await.starts_with("340 "));
    conn.send("Subject: never finished").await;

    tokio::time::timeout(Duration::from_secs(5), server.shutdown())
        .await
        .unwrap();
    assert_eq!(conn.line().await, "");
}

#[tokio::test]
async fn test_shutdown_with_unread_responses() {
    let server = Server::new(spool().await, ConfigHandle::new(RunConfig::default()));
    // too small for the HELP listing, so the server blocks writing it
    let (client, served) = tokio::io::duplex(64);
    server.serve_connection(served, peer());
    let (_reader, mut writer) = tokio::io::split(client);
    writer.write_all(b"HELP\r\n").await.unwrap();
    tokio::task::yield_now().await;

    tokio::time::timeout(Duration::from_secs(5), server.shutdown())
        .await
        .unwrap();
}
