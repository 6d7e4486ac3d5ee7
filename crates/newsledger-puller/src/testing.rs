//! In-memory [`SyncStore`] for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newsledger_nntp::{GroupName, MessageId};

use crate::error::{StoreError, StoreResult};
use crate::store::{Ingest, SyncStore, TempGroup};

#[derive(Default)]
struct Inner {
    last_new_news: Option<DateTime<Utc>>,
    last_new_groups: Option<DateTime<Utc>>,
    watermarks: HashMap<GroupName, u64>,
    staging: Vec<TempGroup>,
    staged: VecDeque<TempGroup>,
    articles: HashMap<MessageId, Vec<u8>>,
    failing: HashSet<MessageId>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn have(&self, id: &MessageId) {
        self.inner
            .lock()
            .unwrap()
            .articles
            .insert(id.clone(), Vec::new());
    }

    pub fn fail_ingest(&self, id: &MessageId) {
        self.inner.lock().unwrap().failing.insert(id.clone());
    }

    pub fn article(&self, id: &MessageId) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().articles.get(id).cloned()
    }

    pub fn track(&self, group: &str, watermark: u64) {
        self.inner
            .lock()
            .unwrap()
            .watermarks
            .insert(GroupName::parse(group.as_bytes()).unwrap(), watermark);
    }

    pub fn mark(&self, group: &str) -> Option<u64> {
        let name = GroupName::parse(group.as_bytes()).unwrap();
        self.inner.lock().unwrap().watermarks.get(&name).copied()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn last_new_news(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.inner.lock().unwrap().last_new_news)
    }

    async fn set_last_new_news(&self, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.lock().unwrap().last_new_news = Some(at);
        Ok(())
    }

    async fn last_new_groups(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.inner.lock().unwrap().last_new_groups)
    }

    async fn set_last_new_groups(&self, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.lock().unwrap().last_new_groups = Some(at);
        Ok(())
    }

    async fn watermark(&self, group: &GroupName) -> StoreResult<Option<u64>> {
        Ok(self.inner.lock().unwrap().watermarks.get(group).copied())
    }

    async fn set_watermark(&self, group: &GroupName, watermark: u64) -> StoreResult<()> {
        self.inner
            .lock()
            .unwrap()
            .watermarks
            .insert(group.clone(), watermark);
        Ok(())
    }

    async fn add_group(&self, group: &GroupName) -> StoreResult<()> {
        self.inner
            .lock()
            .unwrap()
            .watermarks
            .entry(group.clone())
            .or_insert(0);
        Ok(())
    }

    async fn tracked_groups(&self) -> StoreResult<Vec<GroupName>> {
        let mut groups: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .watermarks
            .keys()
            .cloned()
            .collect();
        groups.sort();
        Ok(groups)
    }

    async fn start_temp_groups(&self) -> StoreResult<()> {
        self.inner.lock().unwrap().staging.clear();
        Ok(())
    }

    async fn stage_group(&self, group: TempGroup) -> StoreResult<()> {
        self.inner.lock().unwrap().staging.push(group);
        Ok(())
    }

    async fn cancel_temp_groups(&self) -> StoreResult<()> {
        self.inner.lock().unwrap().staging.clear();
        Ok(())
    }

    async fn finish_temp_groups(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let staged = std::mem::take(&mut inner.staging);
        inner.staged = staged.into();
        Ok(())
    }

    async fn next_temp_group(&self) -> StoreResult<Option<TempGroup>> {
        Ok(self.inner.lock().unwrap().staged.pop_front())
    }

    async fn done_temp_groups(&self) -> StoreResult<()> {
        self.inner.lock().unwrap().staged.clear();
        Ok(())
    }

    async fn is_wanted(&self, id: &MessageId) -> StoreResult<bool> {
        Ok(!self.inner.lock().unwrap().articles.contains_key(id))
    }

    async fn reference_exists(&self, id: &MessageId) -> StoreResult<bool> {
        Ok(self.inner.lock().unwrap().articles.contains_key(id))
    }

    async fn ingest(&self, id: &MessageId, article: Vec<u8>) -> StoreResult<Ingest> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing.contains(id) {
            return Err(StoreError::new("injected failure"));
        }
        if inner.articles.contains_key(id) {
            return Ok(Ingest::Duplicate);
        }
        inner.articles.insert(id.clone(), article);
        Ok(Ingest::Accepted)
    }
}
