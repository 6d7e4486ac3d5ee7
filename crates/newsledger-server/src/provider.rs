//! The content provider consumed by the command handlers.
//!
//! Providers return plain data; the handlers own the mapping from each
//! outcome to its status code. `None`/empty results mean "not found" and
//! the handler picks 411, 423, 430 or 420 depending on how the client
//! addressed the article. Errors become `403`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newsledger_nntp::{
    ActiveEntry, ArticleRange, GroupName, HdrEntry, MessageId, NewsgroupsEntry, Overview, Wildmat,
};

use crate::error::ProviderResult;

/// Which part of an article ARTICLE/HEAD/BODY/STAT asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticlePart {
    /// Headers, blank line, body.
    Full,
    /// Headers only.
    Head,
    /// Body only.
    Body,
    /// Existence only.
    Stat,
}

/// How an article is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleTarget<'a> {
    /// By Message-ID, independent of the selected group.
    MessageId(&'a MessageId),
    /// By number within a group.
    Number(&'a GroupName, u64),
}

/// An article, or the requested part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Number within the addressed group, 0 when looked up by Message-ID.
    pub number: u64,
    /// The article's Message-ID.
    pub message_id: MessageId,
    /// Header block with LF line endings, when requested.
    pub head: Option<Vec<u8>>,
    /// Body with LF line endings, when requested.
    pub body: Option<Vec<u8>>,
}

/// Counters of a selected group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    /// Group name.
    pub name: GroupName,
    /// Estimated number of articles.
    pub count: u64,
    /// Low watermark; equals `high` (both 0) for an empty group.
    pub low: u64,
    /// High watermark.
    pub high: u64,
}

impl GroupSummary {
    /// Returns the number of the first article, if any.
    #[must_use]
    pub const fn first(&self) -> Option<u64> {
        if self.count == 0 { None } else { Some(self.low) }
    }
}

/// Answer to "do you want this Message-ID?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wanted {
    /// Send it.
    Yes,
    /// Not now; offer it again later.
    Later,
    /// Never send it.
    No,
}

/// Result of receiving an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Stored.
    Accepted,
    /// Temporarily refused; may be offered again.
    Later(String),
    /// Refused for good.
    Rejected(String),
}

/// Storage backend serving the reader and transit commands.
#[async_trait]
pub trait Provider: Send + Sync {
    /// NEWNEWS is implemented.
    fn supports_new_news(&self) -> bool;
    /// OVER accepts a Message-ID.
    fn supports_over_by_msgid(&self) -> bool;
    /// HDR and XHDR are implemented.
    fn supports_hdr(&self) -> bool;
    /// IHAVE is implemented.
    fn supports_ihave(&self) -> bool;
    /// POST is implemented.
    fn supports_post(&self) -> bool;
    /// CHECK, TAKETHIS and MODE STREAM are implemented.
    fn supports_stream(&self) -> bool;

    /// Looks up an article.
    async fn article(
        &self,
        target: ArticleTarget<'_>,
        part: ArticlePart,
    ) -> ProviderResult<Option<Article>>;

    /// Looks up a group's counters.
    async fn group(&self, name: &GroupName) -> ProviderResult<Option<GroupSummary>>;

    /// Lists article numbers of a group within `range`.
    async fn list_group(
        &self,
        name: &GroupName,
        range: ArticleRange,
    ) -> ProviderResult<Option<(GroupSummary, Vec<u64>)>>;

    /// Finds the first article after `number`.
    async fn next_article(
        &self,
        group: &GroupName,
        number: u64,
    ) -> ProviderResult<Option<(u64, MessageId)>>;

    /// Finds the last article before `number`.
    async fn previous_article(
        &self,
        group: &GroupName,
        number: u64,
    ) -> ProviderResult<Option<(u64, MessageId)>>;

    /// Message-IDs of articles arrived since `since` in matching groups.
    async fn new_news(
        &self,
        groups: &Wildmat,
        since: DateTime<Utc>,
    ) -> ProviderResult<Vec<MessageId>>;

    /// Groups created since `since`.
    async fn new_groups(&self, since: DateTime<Utc>) -> ProviderResult<Vec<ActiveEntry>>;

    /// Active file entries, optionally filtered.
    async fn active(&self, filter: Option<&Wildmat>) -> ProviderResult<Vec<ActiveEntry>>;

    /// Group descriptions, optionally filtered.
    async fn newsgroups(&self, filter: Option<&Wildmat>) -> ProviderResult<Vec<NewsgroupsEntry>>;

    /// Overview of one article by Message-ID.
    async fn overview_by_id(&self, id: &MessageId) -> ProviderResult<Option<Overview>>;

    /// Overview of the articles of a group within `range`.
    async fn overview(
        &self,
        group: &GroupName,
        range: ArticleRange,
    ) -> ProviderResult<Vec<Overview>>;

    /// One header (lowercase name) of an article by Message-ID.
    async fn header_by_id(&self, field: &str, id: &MessageId)
    -> ProviderResult<Option<HdrEntry>>;

    /// One header (lowercase name) of the articles of a group within
    /// `range`.
    async fn header(
        &self,
        field: &str,
        group: &GroupName,
        range: ArticleRange,
    ) -> ProviderResult<Vec<HdrEntry>>;

    /// Whether an offered article is wanted (IHAVE, CHECK).
    async fn wanted(&self, id: &MessageId) -> ProviderResult<Wanted>;

    /// Accepts a locally posted article.
    async fn post(&self, article: Vec<u8>) -> ProviderResult<Received>;

    /// Accepts a transferred article (IHAVE, TAKETHIS).
    async fn receive(&self, id: &MessageId, article: Vec<u8>) -> ProviderResult<Received>;
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
    fn test_first_article() {
        let name = GroupName::parse(b"misc.test").unwrap();
        let empty = GroupSummary {
            name: name.clone(),
            count: 0,
            low: 0,
            high: 0,
        };
        assert_eq!(empty.first(), None);
        let full = GroupSummary {
            name,
            count: 3,
            low: 4,
            high: 6,
        };
        assert_eq!(full.first(), Some(4));
    }
}
