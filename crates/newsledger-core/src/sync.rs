//! The spool as a puller's synchronisation store.
//!
//! Each remote gets its own [`SpoolSyncStore`]; the watermarks and query
//! times are per remote while the articles land in the shared spool.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newsledger_nntp::{GroupName, MessageId};
use newsledger_puller::{Ingest, StoreResult, SyncStore, TempGroup};
use tokio::sync::Mutex;
use tracing::debug;

use crate::spool::{Filing, Spool};

#[derive(Debug, Default)]
struct SyncState {
    last_new_news: Option<DateTime<Utc>>,
    last_new_groups: Option<DateTime<Utc>>,
    watermarks: BTreeMap<GroupName, u64>,
    staging: Vec<TempGroup>,
    staged: VecDeque<TempGroup>,
}

/// Synchronisation state for one remote, backed by a [`Spool`].
#[derive(Debug)]
pub struct SpoolSyncStore {
    spool: Arc<Spool>,
    state: Mutex<SyncState>,
}

impl SpoolSyncStore {
    /// Creates a store with no tracked groups.
    #[must_use]
    pub fn new(spool: Arc<Spool>) -> Self {
        Self {
            spool,
            state: Mutex::new(SyncState::default()),
        }
    }

    /// Returns the spool articles are filed into.
    #[must_use]
    pub const fn spool(&self) -> &Arc<Spool> {
        &self.spool
    }
}

#[async_trait]
impl SyncStore for SpoolSyncStore {
    async fn last_new_news(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.state.lock().await.last_new_news)
    }

    async fn set_last_new_news(&self, at: DateTime<Utc>) -> StoreResult<()> {
        self.state.lock().await.last_new_news = Some(at);
        Ok(())
    }

    async fn last_new_groups(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.state.lock().await.last_new_groups)
    }

    async fn set_last_new_groups(&self, at: DateTime<Utc>) -> StoreResult<()> {
        self.state.lock().await.last_new_groups = Some(at);
        Ok(())
    }

    async fn watermark(&self, group: &GroupName) -> StoreResult<Option<u64>> {
        Ok(self.state.lock().await.watermarks.get(group).copied())
    }

    async fn set_watermark(&self, group: &GroupName, watermark: u64) -> StoreResult<()> {
        debug!(%group, watermark, "watermark saved");
        self.state
            .lock()
            .await
            .watermarks
            .insert(group.clone(), watermark);
        Ok(())
    }

    async fn add_group(&self, group: &GroupName) -> StoreResult<()> {
        self.spool.create_group(group, "", true).await;
        self.state
            .lock()
            .await
            .watermarks
            .entry(group.clone())
            .or_insert(0);
        Ok(())
    }

    async fn tracked_groups(&self) -> StoreResult<Vec<GroupName>> {
        Ok(self.state.lock().await.watermarks.keys().cloned().collect())
    }

    async fn start_temp_groups(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.staging.clear();
        Ok(())
    }

    async fn stage_group(&self, group: TempGroup) -> StoreResult<()> {
        self.state.lock().await.staging.push(group);
        Ok(())
    }

    async fn cancel_temp_groups(&self) -> StoreResult<()> {
        self.state.lock().await.staging.clear();
        Ok(())
    }

    async fn finish_temp_groups(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let staged = std::mem::take(&mut state.staging);
        state.staged = staged.into();
        Ok(())
    }

    async fn next_temp_group(&self) -> StoreResult<Option<TempGroup>> {
        Ok(self.state.lock().await.staged.pop_front())
    }

    async fn done_temp_groups(&self) -> StoreResult<()> {
        self.state.lock().await.staged.clear();
        Ok(())
    }

    async fn is_wanted(&self, id: &MessageId) -> StoreResult<bool> {
        Ok(!self.spool.contains(id).await)
    }

    async fn reference_exists(&self, id: &MessageId) -> StoreResult<bool> {
        Ok(self.spool.contains(id).await)
    }

    async fn ingest(&self, id: &MessageId, article: Vec<u8>) -> StoreResult<Ingest> {
        Ok(match self.spool.receive(id, &article).await {
            Filing::Stored(_) => Ingest::Accepted,
            Filing::Duplicate => Ingest::Duplicate,
            Filing::Refused(reason) => Ingest::Rejected(reason.to_string()),
        })
    }
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

    fn name(s: &str) -> GroupName {
        GroupName::parse(s.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_add_group_creates_spool_group() {
        let spool = Arc::new(Spool::default());
        let store = SpoolSyncStore::new(Arc::clone(&spool));
        store.add_group(&name("misc.test")).await.unwrap();
        assert!(spool.has_group(&name("misc.test")).await);
        assert_eq!(store.watermark(&name("misc.test")).await.unwrap(), Some(0));

        store.set_watermark(&name("misc.test"), 9).await.unwrap();
        store.add_group(&name("misc.test")).await.unwrap();
        assert_eq!(store.watermark(&name("misc.test")).await.unwrap(), Some(9));
        assert_eq!(store.tracked_groups().await.unwrap(), [name("misc.test")]);
    }

    #[tokio::test]
    async fn test_temp_group_staging() {
        let store = SpoolSyncStore::new(Arc::new(Spool::default()));
        let staged = TempGroup {
            name: name("misc.test"),
            remote_high: Some(5),
            local: 0,
        };
        store.start_temp_groups().await.unwrap();
        store.stage_group(staged.clone()).await.unwrap();
        store.cancel_temp_groups().await.unwrap();
        store.finish_temp_groups().await.unwrap();
        assert_eq!(store.next_temp_group().await.unwrap(), None);

        store.start_temp_groups().await.unwrap();
        store.stage_group(staged.clone()).await.unwrap();
        store.finish_temp_groups().await.unwrap();
        assert_eq!(store.next_temp_group().await.unwrap(), Some(staged));
        assert_eq!(store.next_temp_group().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let spool = Arc::new(Spool::default());
        let store = SpoolSyncStore::new(Arc::clone(&spool));
        store.add_group(&name("misc.test")).await.unwrap();
        let id = MessageId::parse(b"<1@x>").unwrap();
        let raw = b"Newsgroups: misc.test\nMessage-ID: <1@x>\n\nbody\n".to_vec();

        assert!(store.is_wanted(&id).await.unwrap());
        assert_eq!(store.ingest(&id, raw.clone()).await.unwrap(), Ingest::Accepted);
        assert_eq!(store.ingest(&id, raw).await.unwrap(), Ingest::Duplicate);
        assert!(!store.is_wanted(&id).await.unwrap());
        assert!(store.reference_exists(&id).await.unwrap());
        assert_eq!(spool.len().await, 1);

        let stray = MessageId::parse(b"<2@x>").unwrap();
        let outcome = store
            .ingest(&stray, b"Newsgroups: alt.none\nMessage-ID: <2@x>\n\n".to_vec())
            .await
            .unwrap();
        assert!(matches!(outcome, Ingest::Rejected(_)));
    }
}
