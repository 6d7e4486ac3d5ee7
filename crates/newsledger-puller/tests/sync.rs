//! End-to-end synchronisation against an in-process server.
//!
//! The remote is a newsledger server over TCP serving one spool; the
//! local side is a second spool behind a `SpoolSyncStore`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use newsledger_core::{Spool, SpoolSyncStore};
use newsledger_nntp::{GroupName, MessageId, Wildmat};
use newsledger_puller::{
    Error, Ingest, Puller, PullerConfig, StoreError, StoreResult, SyncStore, TempGroup,
};
use newsledger_server::{ConfigHandle, ListenParams, RunConfig, Server};

fn group() -> GroupName {
    GroupName::parse(b"misc.test").unwrap()
}

fn id(n: u64) -> MessageId {
    MessageId::parse(format!("<{n}@remote.test>").as_bytes()).unwrap()
}

fn article(n: u64) -> Vec<u8> {
    format!(
        "From: poster@example.org\nSubject: article {n}\nNewsgroups: misc.test\nMessage-ID: <{n}@remote.test>\n\nbody {n}\n"
    )
    .into_bytes()
}

/// Starts a server on a loopback port with `count` articles in
/// misc.test.
async fn remote(count: u64) -> (Server, Arc<Spool>, u16) {
    let spool = Arc::new(Spool::new("remote.test"));
    spool.create_group(&group(), "Testing", true).await;
    for n in 1..=count {
        spool.receive(&id(n), &article(n)).await;
    }
    let server = Server::new(spool.clone(), ConfigHandle::new(RunConfig::default()));
    let addr = server
        .listen("127.0.0.1:0".parse().unwrap(), ListenParams::default())
        .await
        .unwrap();
    (server, spool, addr.port())
}

fn config(port: u16) -> PullerConfig {
    PullerConfig::builder("127.0.0.1").port(port).build()
}

/// Delegates to a real store but fails ingesting one Message-ID.
struct FailingStore {
    inner: Arc<SpoolSyncStore>,
    fail_on: MessageId,
}

#[async_trait]
impl SyncStore for FailingStore {
    async fn last_new_news(&self) -> StoreResult<Option<DateTime<Utc>>> {
        self.inner.last_new_news().await
    }

    async fn set_last_new_news(&self, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.set_last_new_news(at).await
    }

    async fn last_new_groups(&self) -> StoreResult<Option<DateTime<Utc>>> {
        self.inner.last_new_groups().await
    }

    async fn set_last_new_groups(&self, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.set_last_new_groups(at).await
    }

    async fn watermark(&self, group: &GroupName) -> StoreResult<Option<u64>> {
        self.inner.watermark(group).await
    }

    async fn set_watermark(&self, group: &GroupName, watermark: u64) -> StoreResult<()> {
        self.inner.set_watermark(group, watermark).await
    }

    async fn add_group(&self, group: &GroupName) -> StoreResult<()> {
        self.inner.add_group(group).await
    }

    async fn tracked_groups(&self) -> StoreResult<Vec<GroupName>> {
        self.inner.tracked_groups().await
    }

    async fn start_temp_groups(&self) -> StoreResult<()> {
        self.inner.start_temp_groups().await
    }

    async fn stage_group(&self, group: TempGroup) -> StoreResult<()> {
        self.inner.stage_group(group).await
    }

    async fn cancel_temp_groups(&self) -> StoreResult<()> {
        self.inner.cancel_temp_groups().await
    }

    async fn finish_temp_groups(&self) -> StoreResult<()> {
        self.inner.finish_temp_groups().await
    }

    async fn next_temp_group(&self) -> StoreResult<Option<TempGroup>> {
        self.inner.next_temp_group().await
    }

    async fn done_temp_groups(&self) -> StoreResult<()> {
        self.inner.done_temp_groups().await
    }

    async fn is_wanted(&self, id: &MessageId) -> StoreResult<bool> {
        self.inner.is_wanted(id).await
    }

    async fn reference_exists(&self, id: &MessageId) -> StoreResult<bool> {
        self.inner.reference_exists(id).await
    }

    async fn ingest(&self, id: &MessageId, article: Vec<u8>) -> StoreResult<Ingest> {
        if id == &self.fail_on {
            return Err(StoreError::new("disk full"));
        }
        self.inner.ingest(id, article).await
    }
}

/// A local store that already mirrored the first `count` articles.
async fn local(count: u64) -> Arc<SpoolSyncStore> {
    let store = Arc::new(SpoolSyncStore::new(Arc::new(Spool::new("local.test"))));
    store.add_group(&group()).await.unwrap();
    for n in 1..=count {
        assert_eq!(store.ingest(&id(n), article(n)).await.unwrap(), Ingest::Accepted);
    }
    store.set_watermark(&group(), count).await.unwrap();
    store
}

#[tokio::test]
async fn test_interrupted_sync_resumes() {
    let (server, _, port) = remote(150).await;
    let store = local(100).await;

    let failing = Puller::new(
        config(port),
        Arc::new(FailingStore {
            inner: Arc::clone(&store),
            fail_on: id(121),
        }),
    );
    let error = failing.sync_once().await.unwrap_err();
    assert!(matches!(error, Error::ConsumerFailed(_)));
    assert!(error.is_fatal());
    assert_eq!(store.watermark(&group()).await.unwrap(), Some(120));
    assert_eq!(store.spool().len().await, 120);

    let puller = Puller::new(config(port), store.clone());
    let report = puller.sync_once().await.unwrap();
    assert_eq!(report.ingested, 30);
    assert_eq!(report.duplicates, 0);
    assert_eq!(store.watermark(&group()).await.unwrap(), Some(150));
    assert_eq!(store.spool().len().await, 150);

    let again = puller.sync_once().await.unwrap();
    assert_eq!(again.requested, 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_known_articles_are_not_requested() {
    let (server, _, port) = remote(10).await;
    let store = local(0).await;
    for n in [3, 4] {
        store.ingest(&id(n), article(n)).await.unwrap();
    }

    let puller = Puller::new(config(port), store.clone());
    let report = puller.sync_once().await.unwrap();
    assert_eq!(report.requested, 8);
    assert_eq!(report.ingested, 8);
    assert_eq!(store.watermark(&group()).await.unwrap(), Some(10));
    assert_eq!(store.spool().len().await, 10);

    server.shutdown().await;
}

#[tokio::test]
async fn test_new_group_auto_add() {
    let (server, remote_spool, port) = remote(2).await;
    let other = GroupName::parse(b"alt.test").unwrap();
    remote_spool.create_group(&other, "Other", true).await;

    let store = Arc::new(SpoolSyncStore::new(Arc::new(Spool::default())));
    let config = PullerConfig::builder("127.0.0.1")
        .port(port)
        .auto_add(Wildmat::compile("misc.*").unwrap())
        .build();
    let puller = Puller::new(config, store.clone());
    let report = puller.sync_once().await.unwrap();

    assert_eq!(report.ingested, 2);
    assert_eq!(store.tracked_groups().await.unwrap(), [group()]);
    assert!(store.spool().has_group(&group()).await);
    assert!(!store.spool().has_group(&other).await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_new_news_sweep() {
    let (server, remote_spool, port) = remote(1).await;
    let store = local(1).await;
    let config = PullerConfig::builder("127.0.0.1")
        .port(port)
        .new_news(true)
        .build();
    let puller = Puller::new(config, store.clone());

    // the first pass only records when the sweep started
    puller.sync_once().await.unwrap();
    assert!(store.last_new_news().await.unwrap().is_some());

    // the group scan fetches it, so the sweep finds it already stored
    remote_spool.receive(&id(2), &article(2)).await;
    let report = puller.sync_once().await.unwrap();
    assert_eq!(report.ingested, 1);
    assert_eq!(store.spool().len().await, 2);

    server.shutdown().await;
}
