//! Session-level commands: CAPABILITIES, MODE, HELP, QUIT, SLAVE,
//! STARTTLS and DATE.

use chrono::Utc;
use newsledger_nntp::types::format_server_date;
use newsledger_nntp::{Capability, ResponseCode};

use super::{Context, Flow};
use crate::Result;
use crate::command::{AUTH_COMMANDS, COMMANDS, Command, CommandSpec, LIST_COMMANDS, lookup};
use crate::stream::Transport;

/// Builds the CAPABILITIES listing for the current session.
fn capability_list<S: Transport>(ctx: &Context<'_, S>) -> Vec<Capability> {
    let session = &*ctx.session;
    let config = ctx.config;
    let provider = ctx.provider;

    let mut caps = vec![Capability::Version(vec!["2".into()])];
    if config.user_pass.is_some()
        && !session.is_authenticated()
        && (config.unsafe_pass || session.is_tls())
    {
        caps.push(Capability::AuthInfo(vec!["USER".into()]));
    }
    caps.push(Capability::Reader);
    if session.can_post() {
        if provider.supports_post() {
            caps.push(Capability::Post);
        }
        if provider.supports_ihave() {
            caps.push(Capability::IHave);
        }
        if provider.supports_stream() {
            caps.push(Capability::Streaming);
        }
    }
    if session.can_read() {
        if provider.supports_new_news() {
            caps.push(Capability::NewNews);
        }
        caps.push(Capability::Over {
            msgid: provider.supports_over_by_msgid(),
        });
        if provider.supports_hdr() {
            caps.push(Capability::Hdr);
        }
    }
    if session.can_read() || session.can_post() {
        caps.push(Capability::List(vec![
            "ACTIVE".into(),
            "NEWSGROUPS".into(),
            "OVERVIEW.FMT".into(),
        ]));
    }
    if config.tls.is_some() && !session.is_tls() && !config.implicit_tls {
        caps.push(Capability::StartTls);
    }
    caps.push(Capability::Implementation(config.implementation.clone()));
    caps
}

pub(super) async fn capabilities<S: Transport>(ctx: &mut Context<'_, S>) -> Result<()> {
    let caps = capability_list(ctx);
    ctx.reply_lines(
        ResponseCode::CAPABILITIES_FOLLOW,
        "capability list follows",
        caps,
    )
    .await
}

pub(super) async fn mode<S: Transport>(ctx: &mut Context<'_, S>, arg: &[u8]) -> Result<()> {
    if arg.eq_ignore_ascii_case(b"READER") {
        if !ctx.session.can_read() {
            return ctx
                .reply(ResponseCode::AUTH_REQUIRED, "authentication required")
                .await;
        }
        return if ctx.session.can_post() && ctx.provider.supports_post() {
            ctx.reply(ResponseCode::READY_POSTING_ALLOWED, "posting allowed")
                .await
        } else {
            ctx.reply(ResponseCode::READY_NO_POSTING, "posting prohibited")
                .await
        };
    }
    if arg.eq_ignore_ascii_case(b"STREAM") {
        if !ctx.provider.supports_stream() {
            return ctx
                .reply(ResponseCode::NOT_SUPPORTED, "streaming not supported")
                .await;
        }
        if !ctx.session.can_post() {
            return ctx
                .reply(ResponseCode::AUTH_REQUIRED, "authentication required")
                .await;
        }
        return ctx
            .reply(ResponseCode::STREAMING_OK, "streaming permitted")
            .await;
    }
    ctx.reply(ResponseCode::NOT_SUPPORTED, "requested MODE not supported")
        .await
}

fn help_line<K>(prefix: Option<&str>, spec: &CommandSpec<K>) -> String {
    match prefix {
        Some(prefix) => format!("  {prefix} {} {}", spec.keyword, spec.help),
        None => format!("  {} {}", spec.keyword, spec.help),
    }
}

fn sub_help<K>(
    prefix: &str,
    table: &'static [CommandSpec<K>],
    keyword: Option<&str>,
) -> Option<Vec<String>> {
    match keyword {
        None => Some(table.iter().map(|s| help_line(Some(prefix), s)).collect()),
        Some(keyword) => lookup(table, keyword).map(|s| vec![help_line(Some(prefix), s)]),
    }
}

pub(super) async fn help<S: Transport>(ctx: &mut Context<'_, S>, args: &[&[u8]]) -> Result<()> {
    let upper = |arg: &[u8]| String::from_utf8_lossy(arg).to_ascii_uppercase();
    let lines = match args {
        [] => Some(COMMANDS.iter().map(|s| help_line(None, s)).collect()),
        [command, rest @ ..] => {
            let command = upper(*command);
            let sub = rest.first().copied().map(upper);
            match lookup(COMMANDS, &command) {
                Some(spec) if spec.kind == Command::List => {
                    sub_help("LIST", LIST_COMMANDS, sub.as_deref())
                }
                Some(spec) if spec.kind == Command::AuthInfo => {
                    sub_help("AUTHINFO", AUTH_COMMANDS, sub.as_deref())
                }
                Some(spec) if sub.is_none() => Some(vec![help_line(None, spec)]),
                _ => None,
            }
        }
    };
    match lines {
        Some(lines) => {
            ctx.reply_lines(ResponseCode::HELP_FOLLOWS, "help text follows", lines)
                .await
        }
        None => {
            ctx.reply(ResponseCode::SYNTAX_ERROR, "no help for that command")
                .await
        }
    }
}

pub(super) async fn quit<S: Transport>(ctx: &mut Context<'_, S>) -> Result<Flow> {
    ctx.reply(ResponseCode::CLOSING, "closing connection").await?;
    Ok(Flow::Close)
}

pub(super) async fn slave<S: Transport>(ctx: &mut Context<'_, S>) -> Result<()> {
    ctx.reply(ResponseCode::SLAVE_NOTED, "slave status noted")
        .await
}

pub(super) async fn start_tls<S: Transport>(ctx: &mut Context<'_, S>) -> Result<Flow> {
    if ctx.config.tls.is_none() {
        ctx.reply(ResponseCode::TLS_UNAVAILABLE, "TLS not configured")
            .await?;
        return Ok(Flow::Continue);
    }
    if ctx.session.is_tls() {
        ctx.reply(ResponseCode::ACCESS_DENIED, "TLS already activated")
            .await?;
        return Ok(Flow::Continue);
    }
    ctx.reply(ResponseCode::CONTINUE_TLS, "continue with TLS negotiation")
        .await?;
    Ok(Flow::StartTls)
}

pub(super) async fn date<S: Transport>(ctx: &mut Context<'_, S>) -> Result<()> {
    let now = format_server_date(Utc::now());
    ctx.reply(ResponseCode::DATE, &now).await
}
