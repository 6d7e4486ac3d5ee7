//! Command dispatch and handlers.
//!
//! [`dispatch`] runs one command line: it validates the line, looks up
//! the keyword, enforces the arity rules of the table entry and calls the
//! handler. Every path answers with exactly one status line, optionally
//! followed by a dot-encoded body. Provider failures are answered with
//! `403` and never end the connection.

#![allow(clippy::missing_errors_doc)]

mod auth;
mod base;
mod list;
mod post;
mod read;

use chrono::{DateTime, Utc};
use newsledger_nntp::types::parse_date_time;
use newsledger_nntp::{CommandLine, FramedStream, ResponseCode};
use tracing::{debug, warn};

use crate::Result;
use crate::command::{Args, COMMANDS, Command, CommandSpec, lookup};
use crate::config::RunConfig;
use crate::error::ProviderResult;
use crate::provider::Provider;
use crate::session::Session;
use crate::stream::Transport;

/// What the connection loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// Close the connection.
    Close,
    /// Run the TLS handshake, then continue.
    StartTls,
}

/// Everything a handler may touch.
pub struct Context<'a, S> {
    /// The connection.
    pub framed: &'a mut FramedStream<S>,
    /// Session state.
    pub session: &'a mut Session,
    /// Configuration snapshot for this command.
    pub config: &'a RunConfig,
    /// Content provider.
    pub provider: &'a dyn Provider,
}

impl<S: Transport> Context<'_, S> {
    /// Sends a status line.
    pub async fn reply(&mut self, code: ResponseCode, text: &str) -> Result<()> {
        self.framed.send_status(code, text).await?;
        Ok(())
    }

    /// Unwraps a provider result, answering `403` on failure.
    pub async fn checked<T>(&mut self, result: ProviderResult<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                warn!(%error, "provider failure");
                self.reply(ResponseCode::INTERNAL_FAULT, "internal error")
                    .await?;
                Ok(None)
            }
        }
    }

    /// Sends a status line followed by a body of `lines`.
    pub async fn reply_lines<I>(&mut self, code: ResponseCode, text: &str, lines: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: std::fmt::Display,
    {
        let writer = self.framed.writer();
        writer.queue_status(code, text);
        let mut dot = writer.dot_writer();
        for line in lines {
            dot.write_line(&line.to_string());
        }
        dot.finish();
        writer.flush().await?;
        Ok(())
    }
}

/// Returns `true` for bytes that may never appear in a command line.
const fn is_illegal(c: u8) -> bool {
    c == 0 || c == b'\r'
}

/// Runs one command line (terminator already stripped).
pub async fn dispatch<S: Transport>(ctx: &mut Context<'_, S>, line: &[u8]) -> Result<Flow> {
    if line.is_empty() {
        return Ok(Flow::Continue);
    }
    if line.iter().copied().any(is_illegal) {
        ctx.reply(
            ResponseCode::SYNTAX_ERROR,
            "command contains illegal characters",
        )
        .await?;
        return Ok(Flow::Continue);
    }
    if line[0] == b' ' || line[0] == b'\t' {
        ctx.reply(
            ResponseCode::SYNTAX_ERROR,
            "command must not start with space",
        )
        .await?;
        return Ok(Flow::Continue);
    }

    let cmd = CommandLine::split(line);
    let Some(spec) = lookup(COMMANDS, &cmd.keyword) else {
        debug!(keyword = %cmd.keyword, "unknown command");
        ctx.reply(ResponseCode::UNKNOWN_COMMAND, "unknown command")
            .await?;
        return Ok(Flow::Continue);
    };
    let args = match spec.split(cmd.rest) {
        Ok(args) => args,
        Err(e) => {
            ctx.reply(ResponseCode::SYNTAX_ERROR, e.message()).await?;
            return Ok(Flow::Continue);
        }
    };
    debug!(command = spec.keyword, "dispatch");

    let Args { args, rest } = args;
    let args = &args[..];
    match spec.kind {
        Command::Capabilities => base::capabilities(ctx).await?,
        Command::Mode => base::mode(ctx, args[0]).await?,
        Command::Help => base::help(ctx, args).await?,
        Command::Quit => return base::quit(ctx).await,
        Command::Slave => base::slave(ctx).await?,
        Command::StartTls => return base::start_tls(ctx).await,
        Command::Date => base::date(ctx).await?,
        Command::List => list::list(ctx, rest).await?,
        Command::XgTitle => list::xgtitle(ctx, args.first().copied()).await?,
        Command::NewGroups => list::new_groups(ctx, args).await?,
        Command::AuthInfo => auth::auth_info(ctx, rest).await?,
        Command::Group => read::group(ctx, args[0]).await?,
        Command::ListGroup => read::list_group(ctx, args).await?,
        Command::Next => read::step(ctx, true).await?,
        Command::Last => read::step(ctx, false).await?,
        Command::Article(part) => read::article(ctx, part, args.first().copied()).await?,
        Command::NewNews => read::new_news(ctx, args).await?,
        Command::Over { legacy } => read::over(ctx, legacy, args.first().copied()).await?,
        Command::Hdr { legacy } => read::hdr(ctx, legacy, args).await?,
        Command::Post => post::post(ctx).await?,
        Command::IHave => post::ihave(ctx, args[0]).await?,
        Command::Check => post::check(ctx, args[0]).await?,
        Command::TakeThis => post::take_this(ctx, args[0]).await?,
    }
    Ok(Flow::Continue)
}

/// Splits a LIST or AUTHINFO sub-command line against its
/// own table. Answers the matching 501 and returns `None` on failure.
async fn sub_command<'l, S: Transport, K: Copy>(
    ctx: &mut Context<'_, S>,
    table: &'static [CommandSpec<K>],
    rest: &'l [u8],
    default: Option<&'static str>,
    label: &str,
) -> Result<Option<(K, Vec<&'l [u8]>)>> {
    let sub = CommandLine::split(rest);
    let keyword = match (sub.keyword.as_str(), default) {
        ("", Some(default)) => default,
        ("", None) => {
            ctx.reply(
                ResponseCode::SYNTAX_ERROR,
                &format!("{label} keyword expected"),
            )
            .await?;
            return Ok(None);
        }
        (keyword, _) => keyword,
    };
    let Some(spec) = lookup(table, keyword) else {
        ctx.reply(
            ResponseCode::SYNTAX_ERROR,
            &format!("unrecognised {label} keyword"),
        )
        .await?;
        return Ok(None);
    };
    match spec.split(sub.rest) {
        Ok(args) => Ok(Some((spec.kind, args.args))),
        Err(e) => {
            ctx.reply(ResponseCode::SYNTAX_ERROR, e.message()).await?;
            Ok(None)
        }
    }
}

/// Parses the `date time [GMT]` tail of NEWNEWS and NEWGROUPS. Answers
/// the matching 501 and returns `None` on failure.
async fn parse_since<S: Transport>(
    ctx: &mut Context<'_, S>,
    args: &[&[u8]],
) -> Result<Option<DateTime<Utc>>> {
    if let Some(zone) = args.get(2) {
        if !zone.eq_ignore_ascii_case(b"GMT") {
            ctx.reply(ResponseCode::SYNTAX_ERROR, "only GMT is supported")
                .await?;
            return Ok(None);
        }
    }
    match parse_date_time(args[0], args[1], Utc::now()) {
        Ok(since) => Ok(Some(since)),
        Err(e) => {
            ctx.reply(ResponseCode::SYNTAX_ERROR, &e.to_string()).await?;
            Ok(None)
        }
    }
}
