//! POST, IHAVE, CHECK and TAKETHIS.
//!
//! Once a body has been invited (or, for TAKETHIS, sent unasked) it is
//! always read to its terminator, whatever the outcome, so the next
//! command starts on a line boundary.

use newsledger_nntp::{MessageId, ResponseCode};

use super::Context;
use crate::Result;
use crate::provider::{Received, Wanted};
use crate::stream::Transport;

/// Reads an article body. `Ok(None)` means it exceeded the size limit and
/// was drained.
async fn read_body<S: Transport>(ctx: &mut Context<'_, S>) -> Result<Option<Vec<u8>>> {
    let limit = ctx.config.max_article_size;
    match ctx.framed.reader().dot_reader().read_to_end(limit).await {
        Ok(body) => Ok(Some(body)),
        Err(newsledger_nntp::Error::BodyTooLarge { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn invalid_id<S: Transport>(ctx: &mut Context<'_, S>) -> Result<()> {
    ctx.reply(ResponseCode::SYNTAX_ERROR, "invalid Message-ID")
        .await
}

async fn need_post<S: Transport>(ctx: &mut Context<'_, S>) -> Result<bool> {
    if ctx.session.can_post() {
        return Ok(true);
    }
    ctx.reply(ResponseCode::AUTH_REQUIRED, "authentication required")
        .await?;
    Ok(false)
}

pub(super) async fn post<S: Transport>(ctx: &mut Context<'_, S>) -> Result<()> {
    if !ctx.provider.supports_post() {
        return ctx
            .reply(ResponseCode::NOT_SUPPORTED, "POST unimplemented")
            .await;
    }
    if !ctx.session.can_post() {
        return ctx
            .reply(ResponseCode::POSTING_NOT_PERMITTED, "posting not permitted")
            .await;
    }
    ctx.reply(ResponseCode::SEND_POST, "send article to be posted")
        .await?;
    let Some(body) = read_body(ctx).await? else {
        return ctx
            .reply(ResponseCode::POSTING_FAILED, "article too large")
            .await;
    };
    let provider = ctx.provider;
    let result = provider.post(body).await;
    match ctx.checked(result).await? {
        Some(Received::Accepted) => {
            ctx.reply(ResponseCode::POST_OK, "article received OK")
                .await
        }
        Some(Received::Later(reason) | Received::Rejected(reason)) => {
            ctx.reply(ResponseCode::POSTING_FAILED, &reason).await
        }
        None => Ok(()),
    }
}

pub(super) async fn ihave<S: Transport>(ctx: &mut Context<'_, S>, arg: &[u8]) -> Result<()> {
    if !ctx.provider.supports_ihave() {
        return ctx
            .reply(ResponseCode::NOT_SUPPORTED, "IHAVE unimplemented")
            .await;
    }
    let Ok(id) = MessageId::parse(arg) else {
        return invalid_id(ctx).await;
    };
    if !need_post(ctx).await? {
        return Ok(());
    }
    if id.is_reserved() {
        return ctx
            .reply(ResponseCode::TRANSFER_NOT_WANTED, "article not wanted")
            .await;
    }
    let provider = ctx.provider;
    let result = provider.wanted(&id).await;
    match ctx.checked(result).await? {
        Some(Wanted::Yes) => {}
        Some(Wanted::No) => {
            return ctx
                .reply(ResponseCode::TRANSFER_NOT_WANTED, "article not wanted")
                .await;
        }
        Some(Wanted::Later) => {
            return ctx
                .reply(ResponseCode::TRANSFER_LATER, "try again later")
                .await;
        }
        None => return Ok(()),
    }

    ctx.reply(ResponseCode::SEND_TRANSFER, "send article to be transferred")
        .await?;
    let Some(body) = read_body(ctx).await? else {
        return ctx
            .reply(ResponseCode::TRANSFER_REJECTED, "article too large")
            .await;
    };
    let result = provider.receive(&id, body).await;
    match ctx.checked(result).await? {
        Some(Received::Accepted) => {
            ctx.reply(ResponseCode::TRANSFER_OK, "article transferred OK")
                .await
        }
        Some(Received::Later(reason)) => ctx.reply(ResponseCode::TRANSFER_LATER, &reason).await,
        Some(Received::Rejected(reason)) => {
            ctx.reply(ResponseCode::TRANSFER_REJECTED, &reason).await
        }
        None => Ok(()),
    }
}

pub(super) async fn check<S: Transport>(ctx: &mut Context<'_, S>, arg: &[u8]) -> Result<()> {
    if !ctx.provider.supports_stream() {
        return ctx
            .reply(ResponseCode::NOT_SUPPORTED, "CHECK unimplemented")
            .await;
    }
    let Ok(id) = MessageId::parse(arg) else {
        return invalid_id(ctx).await;
    };
    if !need_post(ctx).await? {
        return Ok(());
    }
    if id.is_reserved() {
        return ctx
            .reply(ResponseCode::CHECK_NOT_WANTED, id.as_str())
            .await;
    }
    let provider = ctx.provider;
    let result = provider.wanted(&id).await;
    let code = match ctx.checked(result).await? {
        Some(Wanted::Yes) => ResponseCode::CHECK_SEND,
        Some(Wanted::Later) => ResponseCode::CHECK_LATER,
        Some(Wanted::No) => ResponseCode::CHECK_NOT_WANTED,
        None => return Ok(()),
    };
    ctx.reply(code, id.as_str()).await
}

pub(super) async fn take_this<S: Transport>(ctx: &mut Context<'_, S>, arg: &[u8]) -> Result<()> {
    let body = read_body(ctx).await?;

    if !ctx.provider.supports_stream() {
        return ctx
            .reply(ResponseCode::NOT_SUPPORTED, "TAKETHIS unimplemented")
            .await;
    }
    let Ok(id) = MessageId::parse(arg) else {
        return invalid_id(ctx).await;
    };
    if !need_post(ctx).await? {
        return Ok(());
    }
    let Some(body) = body.filter(|_| !id.is_reserved()) else {
        return ctx
            .reply(ResponseCode::TAKETHIS_REJECTED, id.as_str())
            .await;
    };
    let provider = ctx.provider;
    let result = provider.receive(&id, body).await;
    match ctx.checked(result).await? {
        Some(Received::Accepted) => ctx.reply(ResponseCode::TAKETHIS_OK, id.as_str()).await,
        Some(Received::Later(_) | Received::Rejected(_)) => {
            ctx.reply(ResponseCode::TAKETHIS_REJECTED, id.as_str())
                .await
        }
        None => Ok(()),
    }
}
