//! The local side of a synchronisation.
//!
//! A [`SyncStore`] remembers, per remote, how far each group has been
//! mirrored and takes in the articles the puller fetches. Ingestion must
//! be idempotent on Message-ID: after an interrupted pass the puller
//! re-fetches everything above the last persisted watermark, some of which
//! the store may already hold.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newsledger_nntp::{GroupName, MessageId};

use crate::error::StoreResult;

/// One entry of the staged group list of a scan pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempGroup {
    /// Group name.
    pub name: GroupName,
    /// High watermark the remote listed; `None` when the listing did not
    /// carry a usable one and `GROUP` must be asked.
    pub remote_high: Option<u64>,
    /// Local watermark when the group was staged.
    pub local: u64,
}

/// Result of handing an article to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingest {
    /// Stored as a new article.
    Accepted,
    /// Already present; nothing changed.
    Duplicate,
    /// Refused for a reason the remote cannot fix by resending.
    Rejected(String),
}

/// Persistent state and article sink for one remote.
///
/// Per-group watermark updates are a read-modify-write the store has to
/// serialise; the puller assumes it is the only writer for its groups.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Returns when NEWNEWS last completed.
    async fn last_new_news(&self) -> StoreResult<Option<DateTime<Utc>>>;

    /// Records when a NEWNEWS sweep started that has now completed.
    async fn set_last_new_news(&self, at: DateTime<Utc>) -> StoreResult<()>;

    /// Returns when NEWGROUPS last completed.
    async fn last_new_groups(&self) -> StoreResult<Option<DateTime<Utc>>>;

    /// Records when a NEWGROUPS query started that has now completed.
    async fn set_last_new_groups(&self, at: DateTime<Utc>) -> StoreResult<()>;

    /// Returns the group's watermark, or `None` if the group is not
    /// tracked.
    async fn watermark(&self, group: &GroupName) -> StoreResult<Option<u64>>;

    /// Persists the group's watermark.
    async fn set_watermark(&self, group: &GroupName, watermark: u64) -> StoreResult<()>;

    /// Starts tracking a group at watermark 0.
    async fn add_group(&self, group: &GroupName) -> StoreResult<()>;

    /// Returns all tracked groups.
    async fn tracked_groups(&self) -> StoreResult<Vec<GroupName>>;

    /// Clears the staging area for a new group list.
    async fn start_temp_groups(&self) -> StoreResult<()>;

    /// Adds one group to the staging area.
    async fn stage_group(&self, group: TempGroup) -> StoreResult<()>;

    /// Discards a partially staged list.
    async fn cancel_temp_groups(&self) -> StoreResult<()>;

    /// Marks the staged list complete.
    async fn finish_temp_groups(&self) -> StoreResult<()>;

    /// Takes the next staged group; `None` once all have been taken.
    async fn next_temp_group(&self) -> StoreResult<Option<TempGroup>>;

    /// Releases the staging area after a pass.
    async fn done_temp_groups(&self) -> StoreResult<()>;

    /// Returns true if the article should be fetched.
    async fn is_wanted(&self, id: &MessageId) -> StoreResult<bool>;

    /// Returns true if the referenced article is stored.
    async fn reference_exists(&self, id: &MessageId) -> StoreResult<bool>;

    /// Stores an article. `article` is the decoded body of a `220`
    /// response: headers, blank line, body.
    async fn ingest(&self, id: &MessageId, article: Vec<u8>) -> StoreResult<Ingest>;
}
