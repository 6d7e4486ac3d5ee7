//! Reader commands: GROUP, LISTGROUP, NEXT, LAST, ARTICLE/HEAD/BODY/STAT,
//! NEWNEWS, OVER/XOVER and HDR/XHDR.
//!
//! Selector outcomes map to fixed codes: an unknown Message-ID is `430`,
//! a number outside the group is `423`, no selected group is `412` and no
//! current article is `420`.

use newsledger_nntp::types::is_valid_header_query;
use newsledger_nntp::{ArticleRange, GroupName, MessageId, ResponseCode, Wildmat};

use super::{Context, parse_since};
use crate::Result;
use crate::provider::{Article, ArticlePart, ArticleTarget};
use crate::session::GroupCursor;
use crate::stream::Transport;

/// How a command addressed its articles.
enum Selector {
    /// `<message-id>`
    Id(MessageId),
    /// A number or `n-m` range in the selected group.
    Range(ArticleRange),
    /// No argument: the current article.
    Current,
}

impl Selector {
    /// Classifies an argument; `None` when it is neither form.
    fn parse(arg: Option<&[u8]>) -> Option<Self> {
        let Some(arg) = arg else {
            return Some(Self::Current);
        };
        if arg.first() == Some(&b'<') {
            return MessageId::parse(arg).ok().map(Self::Id);
        }
        let text = std::str::from_utf8(arg).ok()?;
        ArticleRange::parse(text).ok().map(Self::Range)
    }
}

async fn need_read<S: Transport>(ctx: &mut Context<'_, S>) -> Result<bool> {
    if ctx.session.can_read() {
        return Ok(true);
    }
    ctx.reply(ResponseCode::AUTH_REQUIRED, "authentication required")
        .await?;
    Ok(false)
}

/// The selected group, answering `412` when there is none.
async fn need_group<S: Transport>(ctx: &mut Context<'_, S>) -> Result<Option<GroupCursor>> {
    if let Some(cursor) = ctx.session.current() {
        return Ok(Some(cursor.clone()));
    }
    ctx.reply(ResponseCode::NO_GROUP_SELECTED, "no newsgroup selected")
        .await?;
    Ok(None)
}

/// The selected group and current article, answering `412` or `420`.
async fn need_current<S: Transport>(ctx: &mut Context<'_, S>) -> Result<Option<(GroupName, u64)>> {
    let Some(cursor) = need_group(ctx).await? else {
        return Ok(None);
    };
    match cursor.article {
        Some(number) => Ok(Some((cursor.group, number))),
        None => {
            ctx.reply(
                ResponseCode::NO_CURRENT_ARTICLE,
                "current article number is invalid",
            )
            .await?;
            Ok(None)
        }
    }
}

async fn no_such_id<S: Transport>(ctx: &mut Context<'_, S>) -> Result<()> {
    ctx.reply(
        ResponseCode::NO_ARTICLE_WITH_ID,
        "no article with that message-id",
    )
    .await
}

pub(super) async fn group<S: Transport>(ctx: &mut Context<'_, S>, arg: &[u8]) -> Result<()> {
    let Ok(name) = GroupName::parse(arg) else {
        return ctx
            .reply(ResponseCode::SYNTAX_ERROR, "invalid group name")
            .await;
    };
    if !need_read(ctx).await? {
        return Ok(());
    }
    let provider = ctx.provider;
    let result = provider.group(&name).await;
    let Some(found) = ctx.checked(result).await? else {
        return Ok(());
    };
    let Some(summary) = found else {
        return ctx
            .reply(ResponseCode::NO_SUCH_GROUP, "no such newsgroup")
            .await;
    };
    ctx.session.select(name, summary.first());
    ctx.reply(
        ResponseCode::GROUP_SELECTED,
        &format!(
            "{} {} {} {}",
            summary.count, summary.low, summary.high, summary.name
        ),
    )
    .await
}

pub(super) async fn list_group<S: Transport>(
    ctx: &mut Context<'_, S>,
    args: &[&[u8]],
) -> Result<()> {
    let name = match args.first() {
        Some(arg) => {
            let Ok(name) = GroupName::parse(arg) else {
                return ctx
                    .reply(ResponseCode::SYNTAX_ERROR, "invalid group name")
                    .await;
            };
            name
        }
        None => match need_group(ctx).await? {
            Some(cursor) => cursor.group,
            None => return Ok(()),
        },
    };
    let range = match args.get(1) {
        Some(arg) => {
            let parsed = std::str::from_utf8(arg)
                .ok()
                .and_then(|s| ArticleRange::parse(s).ok());
            let Some(range) = parsed else {
                return ctx
                    .reply(ResponseCode::SYNTAX_ERROR, "invalid range")
                    .await;
            };
            range
        }
        None => ArticleRange::ALL,
    };
    if !need_read(ctx).await? {
        return Ok(());
    }
    let provider = ctx.provider;
    let result = provider.list_group(&name, range).await;
    let Some(found) = ctx.checked(result).await? else {
        return Ok(());
    };
    let Some((summary, numbers)) = found else {
        return ctx
            .reply(ResponseCode::NO_SUCH_GROUP, "no such newsgroup")
            .await;
    };
    ctx.session.select(name, summary.first());
    ctx.reply_lines(
        ResponseCode::GROUP_SELECTED,
        &format!(
            "{} {} {} {} list follows",
            summary.count, summary.low, summary.high, summary.name
        ),
        numbers,
    )
    .await
}

/// NEXT (`forward`) and LAST.
pub(super) async fn step<S: Transport>(ctx: &mut Context<'_, S>, forward: bool) -> Result<()> {
    if !need_read(ctx).await? {
        return Ok(());
    }
    let Some((group, number)) = need_current(ctx).await? else {
        return Ok(());
    };
    let provider = ctx.provider;
    let result = if forward {
        provider.next_article(&group, number).await
    } else {
        provider.previous_article(&group, number).await
    };
    let Some(found) = ctx.checked(result).await? else {
        return Ok(());
    };
    match found {
        Some((number, id)) => {
            ctx.session.set_article(number);
            ctx.reply(ResponseCode::ARTICLE_EXISTS, &format!("{number} {id}"))
                .await
        }
        None if forward => {
            ctx.reply(ResponseCode::NO_NEXT_ARTICLE, "no next article in this group")
                .await
        }
        None => {
            ctx.reply(
                ResponseCode::NO_PREVIOUS_ARTICLE,
                "no previous article in this group",
            )
            .await
        }
    }
}

async fn send_article<S: Transport>(
    ctx: &mut Context<'_, S>,
    part: ArticlePart,
    article: &Article,
) -> Result<()> {
    let code = match part {
        ArticlePart::Full => ResponseCode::ARTICLE_FOLLOWS,
        ArticlePart::Head => ResponseCode::HEAD_FOLLOWS,
        ArticlePart::Body => ResponseCode::BODY_FOLLOWS,
        ArticlePart::Stat => ResponseCode::ARTICLE_EXISTS,
    };
    let writer = ctx.framed.writer();
    writer.queue_status(
        code,
        &format!("{} {}", article.number, article.message_id),
    );
    if part != ArticlePart::Stat {
        let mut dot = writer.dot_writer();
        if let Some(head) = &article.head {
            dot.write(head);
            if !head.ends_with(b"\n") {
                dot.write(b"\n");
            }
        }
        if part == ArticlePart::Full {
            dot.write(b"\n");
        }
        if let Some(body) = &article.body {
            dot.write(body);
        }
        dot.finish();
    }
    writer.flush().await?;
    Ok(())
}

/// ARTICLE, HEAD, BODY and STAT.
pub(super) async fn article<S: Transport>(
    ctx: &mut Context<'_, S>,
    part: ArticlePart,
    arg: Option<&[u8]>,
) -> Result<()> {
    if !need_read(ctx).await? {
        return Ok(());
    }
    let selector = match Selector::parse(arg) {
        Some(Selector::Range(range)) if range.high == Some(range.low) => Selector::Range(range),
        Some(Selector::Range(_)) | None => {
            return ctx
                .reply(ResponseCode::SYNTAX_ERROR, "unrecognised message identifier")
                .await;
        }
        Some(other) => other,
    };
    let provider = ctx.provider;

    match selector {
        Selector::Id(id) => {
            if id.is_reserved() {
                return no_such_id(ctx).await;
            }
            let result = provider.article(ArticleTarget::MessageId(&id), part).await;
            match ctx.checked(result).await? {
                Some(Some(found)) => send_article(ctx, part, &found).await,
                Some(None) => no_such_id(ctx).await,
                None => Ok(()),
            }
        }
        Selector::Range(range) => {
            let Some(cursor) = need_group(ctx).await? else {
                return Ok(());
            };
            let number = range.low;
            let result = provider
                .article(ArticleTarget::Number(&cursor.group, number), part)
                .await;
            match ctx.checked(result).await? {
                Some(Some(found)) => {
                    ctx.session.set_article(number);
                    send_article(ctx, part, &found).await
                }
                Some(None) => {
                    ctx.reply(
                        ResponseCode::NO_ARTICLE_WITH_NUMBER,
                        "no article with that number",
                    )
                    .await
                }
                None => Ok(()),
            }
        }
        Selector::Current => {
            let Some((group, number)) = need_current(ctx).await? else {
                return Ok(());
            };
            let result = provider
                .article(ArticleTarget::Number(&group, number), part)
                .await;
            match ctx.checked(result).await? {
                Some(Some(found)) => send_article(ctx, part, &found).await,
                Some(None) => {
                    ctx.reply(
                        ResponseCode::NO_CURRENT_ARTICLE,
                        "current article number is invalid",
                    )
                    .await
                }
                None => Ok(()),
            }
        }
    }
}

pub(super) async fn new_news<S: Transport>(
    ctx: &mut Context<'_, S>,
    args: &[&[u8]],
) -> Result<()> {
    if !ctx.provider.supports_new_news() {
        return ctx
            .reply(ResponseCode::NOT_SUPPORTED, "NEWNEWS unimplemented")
            .await;
    }
    let Ok(wildmat) = Wildmat::compile(&String::from_utf8_lossy(args[0])) else {
        return ctx
            .reply(ResponseCode::SYNTAX_ERROR, "invalid wildmat")
            .await;
    };
    let Some(since) = parse_since(ctx, &args[1..]).await? else {
        return Ok(());
    };
    if !need_read(ctx).await? {
        return Ok(());
    }
    let provider = ctx.provider;
    let result = provider.new_news(&wildmat, since).await;
    let Some(ids) = ctx.checked(result).await? else {
        return Ok(());
    };
    ctx.reply_lines(
        ResponseCode::NEW_ARTICLES_FOLLOW,
        "list of new articles follows",
        ids,
    )
    .await
}

/// Resolves an explicit range, or the current article when `None`, for
/// OVER and HDR. Answers `412`/`420` and returns `None` on failure.
async fn group_range<S: Transport>(
    ctx: &mut Context<'_, S>,
    range: Option<ArticleRange>,
) -> Result<Option<(GroupName, ArticleRange)>> {
    match range {
        Some(range) => Ok(need_group(ctx)
            .await?
            .map(|cursor| (cursor.group, range))),
        None => Ok(need_current(ctx)
            .await?
            .map(|(group, number)| (group, ArticleRange::single(number)))),
    }
}

/// Answer for a range or current selection that matched nothing.
async fn empty_selection<S: Transport>(
    ctx: &mut Context<'_, S>,
    legacy: bool,
    current: bool,
) -> Result<()> {
    if legacy || current {
        ctx.reply(
            ResponseCode::NO_CURRENT_ARTICLE,
            "no article in that range",
        )
        .await
    } else {
        ctx.reply(
            ResponseCode::NO_ARTICLE_WITH_NUMBER,
            "no articles in that range",
        )
        .await
    }
}

/// OVER and XOVER (`legacy`).
pub(super) async fn over<S: Transport>(
    ctx: &mut Context<'_, S>,
    legacy: bool,
    arg: Option<&[u8]>,
) -> Result<()> {
    if !need_read(ctx).await? {
        return Ok(());
    }
    let Some(selector) = Selector::parse(arg) else {
        return ctx
            .reply(ResponseCode::SYNTAX_ERROR, "invalid range")
            .await;
    };
    let provider = ctx.provider;

    let range = match selector {
        Selector::Id(id) => {
            if legacy || !provider.supports_over_by_msgid() {
                return ctx
                    .reply(ResponseCode::NOT_SUPPORTED, "OVER MSGID unimplemented")
                    .await;
            }
            if id.is_reserved() {
                return no_such_id(ctx).await;
            }
            let result = provider.overview_by_id(&id).await;
            return match ctx.checked(result).await? {
                Some(Some(line)) => {
                    ctx.reply_lines(
                        ResponseCode::OVERVIEW_FOLLOWS,
                        "overview information follows",
                        [line],
                    )
                    .await
                }
                Some(None) => no_such_id(ctx).await,
                None => Ok(()),
            };
        }
        Selector::Range(range) => Some(range),
        Selector::Current => None,
    };
    let Some((group, range_or_current)) = group_range(ctx, range).await? else {
        return Ok(());
    };
    let result = provider.overview(&group, range_or_current).await;
    let Some(lines) = ctx.checked(result).await? else {
        return Ok(());
    };
    if lines.is_empty() {
        return empty_selection(ctx, legacy, range.is_none()).await;
    }
    ctx.reply_lines(
        ResponseCode::OVERVIEW_FOLLOWS,
        "overview information follows",
        lines,
    )
    .await
}

/// HDR and XHDR (`legacy`).
pub(super) async fn hdr<S: Transport>(
    ctx: &mut Context<'_, S>,
    legacy: bool,
    args: &[&[u8]],
) -> Result<()> {
    let provider = ctx.provider;
    if !provider.supports_hdr() {
        return ctx
            .reply(ResponseCode::NOT_SUPPORTED, "HDR unimplemented")
            .await;
    }
    if !need_read(ctx).await? {
        return Ok(());
    }
    let field = String::from_utf8_lossy(args[0]).to_ascii_lowercase();
    if !is_valid_header_query(&field) {
        return ctx
            .reply(ResponseCode::SYNTAX_ERROR, "invalid header query")
            .await;
    }
    let Some(selector) = Selector::parse(args.get(1).copied()) else {
        return ctx
            .reply(ResponseCode::SYNTAX_ERROR, "invalid range")
            .await;
    };
    let (code, text) = if legacy {
        (ResponseCode::HEAD_FOLLOWS, "header follows")
    } else {
        (ResponseCode::HDR_FOLLOWS, "headers follow")
    };

    let range = match selector {
        Selector::Id(id) => {
            if id.is_reserved() {
                return no_such_id(ctx).await;
            }
            let result = provider.header_by_id(&field, &id).await;
            return match ctx.checked(result).await? {
                Some(Some(entry)) => ctx.reply_lines(code, text, [entry]).await,
                Some(None) => no_such_id(ctx).await,
                None => Ok(()),
            };
        }
        Selector::Range(range) => Some(range),
        Selector::Current => None,
    };
    let Some((group, range_or_current)) = group_range(ctx, range).await? else {
        return Ok(());
    };
    let result = provider.header(&field, &group, range_or_current).await;
    let Some(entries) = ctx.checked(result).await? else {
        return Ok(());
    };
    if entries.is_empty() {
        return empty_selection(ctx, legacy, range.is_none()).await;
    }
    ctx.reply_lines(code, text, entries).await
}
