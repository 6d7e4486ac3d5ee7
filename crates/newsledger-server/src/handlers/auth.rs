//! AUTHINFO USER/PASS (RFC 4643). SASL is recognised but not offered.

use newsledger_nntp::ResponseCode;
use tracing::info;

use super::{Context, sub_command};
use crate::Result;
use crate::auth::{UserInfo, UserPriv, normalise_user};
use crate::command::{AUTH_COMMANDS, AuthCommand};
use crate::stream::Transport;

pub(super) async fn auth_info<S: Transport>(ctx: &mut Context<'_, S>, rest: &[u8]) -> Result<()> {
    let Some((kind, args)) = sub_command(ctx, AUTH_COMMANDS, rest, None, "AUTHINFO").await? else {
        return Ok(());
    };
    match kind {
        AuthCommand::User => user(ctx, args[0]).await,
        AuthCommand::Pass => pass(ctx, args[0]).await,
        AuthCommand::Sasl => {
            ctx.reply(ResponseCode::NOT_SUPPORTED, "SASL unimplemented")
                .await
        }
    }
}

/// Checks the conditions shared by USER and PASS, answering the first
/// that fails.
async fn precheck<S: Transport>(ctx: &mut Context<'_, S>) -> Result<bool> {
    let (code, text) = if ctx.session.is_authenticated() {
        (ResponseCode::ACCESS_DENIED, "already authenticated")
    } else if ctx.config.user_pass.is_none() {
        (ResponseCode::NOT_SUPPORTED, "AUTHINFO unimplemented")
    } else if !ctx.session.is_tls() && !ctx.config.unsafe_pass {
        (ResponseCode::ENCRYPTION_REQUIRED, "TLS required")
    } else {
        return Ok(true);
    };
    ctx.reply(code, text).await?;
    Ok(false)
}

async fn accept<S: Transport>(ctx: &mut Context<'_, S>, user: &UserInfo) -> Result<()> {
    ctx.session.login(user);
    info!(user = %user.name, "authenticated");
    ctx.reply(ResponseCode::AUTH_ACCEPTED, "authentication accepted")
        .await
}

async fn user<S: Transport>(ctx: &mut Context<'_, S>, arg: &[u8]) -> Result<()> {
    if ctx.session.take_pending_login().is_some() {
        return ctx
            .reply(
                ResponseCode::AUTH_OUT_OF_SEQUENCE,
                "authentication commands issued out of sequence",
            )
            .await;
    }
    if !precheck(ctx).await? {
        return Ok(());
    }
    let Ok(name) = normalise_user(&String::from_utf8_lossy(arg)) else {
        return ctx
            .reply(ResponseCode::AUTH_REJECTED, "authentication failed")
            .await;
    };
    let known = ctx.config.user_pass.as_ref().and_then(|p| p.user(&name));
    match known {
        Some(user) if user.password.is_none() => accept(ctx, &user).await,
        Some(user) => {
            ctx.session.set_pending_login(user);
            ctx.reply(ResponseCode::PASSWORD_REQUIRED, "password required")
                .await
        }
        None if ctx.config.unsafe_early_user_reject => {
            ctx.reply(ResponseCode::AUTH_REJECTED, "authentication failed")
                .await
        }
        None => {
            // no password matches, so PASS always fails
            ctx.session.set_pending_login(UserInfo {
                name,
                password: None,
                privileges: UserPriv::NONE,
            });
            ctx.reply(ResponseCode::PASSWORD_REQUIRED, "password required")
                .await
        }
    }
}

async fn pass<S: Transport>(ctx: &mut Context<'_, S>, arg: &[u8]) -> Result<()> {
    let Some(pending) = ctx.session.take_pending_login() else {
        if !precheck(ctx).await? {
            return Ok(());
        }
        return ctx
            .reply(
                ResponseCode::AUTH_OUT_OF_SEQUENCE,
                "authentication commands issued out of sequence",
            )
            .await;
    };
    // plain comparison; passwords are not required to resist timing
    let matches = pending
        .password
        .as_deref()
        .is_some_and(|expected| expected.as_bytes() == arg);
    if matches {
        accept(ctx, &pending).await
    } else {
        info!(user = %pending.name, "authentication failed");
        ctx.reply(ResponseCode::AUTH_REJECTED, "authentication failed")
            .await
    }
}
