//! LIST, XGTITLE and NEWGROUPS.

use newsledger_nntp::types::OVERVIEW_FORMAT;
use newsledger_nntp::{ResponseCode, Wildmat};

use super::{Context, parse_since, sub_command};
use crate::Result;
use crate::command::{LIST_COMMANDS, ListCommand};
use crate::stream::Transport;

/// Compiles an optional wildmat argument. Answers 501 and returns `None`
/// when it does not compile.
async fn filter<S: Transport>(
    ctx: &mut Context<'_, S>,
    arg: Option<&[u8]>,
) -> Result<Option<Option<Wildmat>>> {
    let Some(arg) = arg else {
        return Ok(Some(None));
    };
    match Wildmat::compile(&String::from_utf8_lossy(arg)) {
        Ok(w) => Ok(Some(Some(w))),
        Err(_) => {
            ctx.reply(ResponseCode::SYNTAX_ERROR, "invalid wildmat")
                .await?;
            Ok(None)
        }
    }
}

/// Listings need either privilege.
async fn may_list<S: Transport>(ctx: &mut Context<'_, S>) -> Result<bool> {
    if ctx.session.can_read() || ctx.session.can_post() {
        return Ok(true);
    }
    ctx.reply(ResponseCode::AUTH_REQUIRED, "authentication required")
        .await?;
    Ok(false)
}

pub(super) async fn list<S: Transport>(ctx: &mut Context<'_, S>, rest: &[u8]) -> Result<()> {
    let Some((kind, args)) = sub_command(ctx, LIST_COMMANDS, rest, Some("ACTIVE"), "LIST").await?
    else {
        return Ok(());
    };
    match kind {
        ListCommand::Active => active(ctx, args.first().copied()).await,
        ListCommand::Newsgroups => {
            newsgroups(
                ctx,
                args.first().copied(),
                ResponseCode::LIST_FOLLOWS,
                "list of newsgroups follows",
            )
            .await
        }
        ListCommand::OverviewFmt => {
            ctx.reply_lines(
                ResponseCode::LIST_FOLLOWS,
                "order of fields in overview database",
                OVERVIEW_FORMAT,
            )
            .await
        }
    }
}

async fn active<S: Transport>(ctx: &mut Context<'_, S>, arg: Option<&[u8]>) -> Result<()> {
    let Some(wildmat) = filter(ctx, arg).await? else {
        return Ok(());
    };
    if !may_list(ctx).await? {
        return Ok(());
    }
    let provider = ctx.provider;
    let result = provider.active(wildmat.as_ref()).await;
    let Some(groups) = ctx.checked(result).await? else {
        return Ok(());
    };
    ctx.reply_lines(
        ResponseCode::LIST_FOLLOWS,
        "list of newsgroups follows",
        groups,
    )
    .await
}

async fn newsgroups<S: Transport>(
    ctx: &mut Context<'_, S>,
    arg: Option<&[u8]>,
    code: ResponseCode,
    text: &str,
) -> Result<()> {
    let Some(wildmat) = filter(ctx, arg).await? else {
        return Ok(());
    };
    if !may_list(ctx).await? {
        return Ok(());
    }
    let provider = ctx.provider;
    let result = provider.newsgroups(wildmat.as_ref()).await;
    let Some(groups) = ctx.checked(result).await? else {
        return Ok(());
    };
    ctx.reply_lines(code, text, groups).await
}

pub(super) async fn xgtitle<S: Transport>(
    ctx: &mut Context<'_, S>,
    arg: Option<&[u8]>,
) -> Result<()> {
    newsgroups(
        ctx,
        arg,
        ResponseCode::XGTITLE_FOLLOWS,
        "list of groups and descriptions follows",
    )
    .await
}

pub(super) async fn new_groups<S: Transport>(
    ctx: &mut Context<'_, S>,
    args: &[&[u8]],
) -> Result<()> {
    let Some(since) = parse_since(ctx, args).await? else {
        return Ok(());
    };
    if !ctx.session.can_read() {
        return ctx
            .reply(ResponseCode::AUTH_REQUIRED, "authentication required")
            .await;
    }
    let provider = ctx.provider;
    let result = provider.new_groups(since).await;
    let Some(groups) = ctx.checked(result).await? else {
        return Ok(());
    };
    ctx.reply_lines(
        ResponseCode::NEW_GROUPS_FOLLOW,
        "list of new newsgroups follows",
        groups,
    )
    .await
}
