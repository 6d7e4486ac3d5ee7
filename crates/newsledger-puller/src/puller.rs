//! The synchronisation loop for one remote.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use newsledger_nntp::{ArticleRange, GroupName};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::client::{Client, RemoteGroup};
use crate::config::PullerConfig;
use crate::pipeline::{self, ArticleRef, Progress};
use crate::store::{SyncStore, TempGroup};
use crate::stream::{PullStream, default_tls_config};
use crate::{Error, Result};

/// Longest NEWNEWS wildmat sent in one command.
const NEWNEWS_PATTERN_LIMIT: usize = 400;

/// Totals for one scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Groups that were compared with the remote.
    pub groups: usize,
    /// `ARTICLE` requests written.
    pub requested: usize,
    /// Articles stored as new.
    pub ingested: usize,
    /// Articles the store already had.
    pub duplicates: usize,
    /// Articles refused or too large.
    pub rejected: usize,
}

impl PassReport {
    const fn absorb(&mut self, progress: &Progress) {
        self.requested += progress.requested;
        self.ingested += progress.ingested;
        self.duplicates += progress.duplicates;
        self.rejected += progress.rejected;
    }
}

/// Mirrors one remote into a [`SyncStore`].
pub struct Puller {
    config: PullerConfig,
    store: Arc<dyn SyncStore>,
    tls: Arc<rustls::ClientConfig>,
}

impl Puller {
    /// Creates a puller trusting the bundled web PKI roots for TLS.
    #[must_use]
    pub fn new(config: PullerConfig, store: Arc<dyn SyncStore>) -> Self {
        Self {
            config,
            store,
            tls: default_tls_config(),
        }
    }

    /// Keeps the remote mirrored until `cancel` fires.
    ///
    /// Failed sessions are retried after the retry delay; a session the
    /// remote ended with `400` is retried after the idle delay.
    pub async fn run(&self, cancel: CancellationToken) {
        let span = info_span!("puller", remote = %self.config.address());
        async {
            loop {
                let outcome = tokio::select! {
                    () = cancel.cancelled() => break,
                    outcome = self.session(&cancel) => outcome,
                };
                let delay = match outcome {
                    Ok(()) => break,
                    Err(Error::Discontinued(reason)) => {
                        info!(%reason, delay = ?self.config.idle_delay, "remote ended session");
                        self.config.idle_delay
                    }
                    Err(error) => {
                        warn!(%error, delay = ?self.config.retry_delay, "session failed");
                        self.config.retry_delay
                    }
                };
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            info!("puller stopped");
        }
        .instrument(span)
        .await;
    }

    /// Connects and runs scan passes until cancelled or the session fails.
    async fn session(&self, cancel: &CancellationToken) -> Result<()> {
        debug!("connecting");
        let stream = PullStream::connect(&self.config, &self.tls).await?;
        let mut client = Client::connect(stream).await?;
        client.handshake().await?;
        loop {
            let report = self.pass(&mut client).await?;
            info!(
                groups = report.groups,
                ingested = report.ingested,
                duplicates = report.duplicates,
                "scan pass done"
            );
            tokio::select! {
                () = cancel.cancelled() => {
                    client.quit().await?;
                    return Ok(());
                }
                () = tokio::time::sleep(self.config.rescan_delay) => {}
            }
        }
    }

    /// Connects, runs one scan pass and disconnects.
    ///
    /// # Errors
    ///
    /// Returns the first error that ended the pass.
    pub async fn sync_once(&self) -> Result<PassReport> {
        let stream = PullStream::connect(&self.config, &self.tls).await?;
        let mut client = Client::connect(stream).await?;
        client.handshake().await?;
        let report = self.pass(&mut client).await?;
        client.quit().await?;
        Ok(report)
    }

    /// One scan pass over an established session.
    ///
    /// # Errors
    ///
    /// Fatal errors end the pass at once. A non-fatal error in one group
    /// is logged and the pass moves on to the next group.
    pub async fn pass<S>(&self, client: &mut Client<S>) -> Result<PassReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let started = Utc::now();
        let mut report = PassReport::default();

        if self.config.new_groups {
            match self.discover_groups(client, started).await {
                Ok(()) => {}
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => warn!(%error, "NEWGROUPS failed"),
            }
        }

        self.stage_groups(client).await?;
        while let Some(group) = self.store.next_temp_group().await? {
            let name = group.name.clone();
            report.groups += 1;
            match self.sync_group(client, group, &mut report).await {
                Ok(()) => {}
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => warn!(group = %name, %error, "group skipped"),
            }
        }
        self.store.done_temp_groups().await?;

        if self.config.new_news && client.state().new_news {
            match self.sweep_new_news(client, started, &mut report).await {
                Ok(()) => {}
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => warn!(%error, "NEWNEWS sweep failed"),
            }
        }
        Ok(report)
    }

    /// Starts tracking groups the remote created since the last query.
    async fn discover_groups<S>(&self, client: &mut Client<S>, started: DateTime<Utc>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let Some(since) = self.store.last_new_groups().await? else {
            // first pass: LIST covers everything that exists now
            self.store.set_last_new_groups(started).await?;
            return Ok(());
        };
        for name in client.new_groups(since).await? {
            self.track_if_wanted(&name).await?;
        }
        self.store.set_last_new_groups(started).await?;
        Ok(())
    }

    /// Returns the local watermark of a group, tracking it first if it is
    /// new and matches the auto-add policy.
    async fn track_if_wanted(&self, name: &GroupName) -> Result<Option<u64>> {
        if let Some(watermark) = self.store.watermark(name).await? {
            return Ok(Some(watermark));
        }
        if !self.config.wants_new_group(name.as_str()) {
            return Ok(None);
        }
        self.store.add_group(name).await?;
        info!(group = %name, "tracking new group");
        Ok(Some(0))
    }

    /// Stages the remote's group list, keeping only tracked groups.
    async fn stage_groups<S>(&self, client: &mut Client<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let groups = client.list_groups().await?;
        self.store.start_temp_groups().await?;
        match self.stage_all(groups).await {
            Ok(()) => Ok(self.store.finish_temp_groups().await?),
            Err(error) => {
                if let Err(cancel_error) = self.store.cancel_temp_groups().await {
                    warn!(%cancel_error, "could not discard staged groups");
                }
                Err(error)
            }
        }
    }

    async fn stage_all(&self, groups: Vec<RemoteGroup>) -> Result<()> {
        for group in groups {
            let Some(local) = self.track_if_wanted(&group.name).await? else {
                continue;
            };
            self.store
                .stage_group(TempGroup {
                    name: group.name,
                    remote_high: group.high,
                    local,
                })
                .await?;
        }
        Ok(())
    }

    async fn reset(&self, name: &GroupName, local: u64, remote: u64) -> Result<u64> {
        warn!(group = %name, local, remote, "remote watermark went backwards, rescanning");
        self.store.set_watermark(name, 0).await?;
        Ok(0)
    }

    /// Brings one staged group up to the remote's high watermark.
    async fn sync_group<S>(
        &self,
        client: &mut Client<S>,
        group: TempGroup,
        report: &mut PassReport,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let TempGroup {
            name,
            remote_high,
            mut local,
        } = group;

        if let Some(high) = remote_high {
            if high == local {
                return Ok(());
            }
            if local > high {
                local = self.reset(&name, local, high).await?;
            }
        }

        let selected = match client.group(&name).await {
            Ok(high) => high,
            Err(Error::NoSuchGroup(_)) => {
                info!(group = %name, "group gone on remote, watermark reset");
                self.store.set_watermark(&name, 0).await?;
                return Ok(());
            }
            Err(error) => return Err(error),
        };
        let high = remote_high.map_or(selected, |listed| listed.max(selected));
        if local > high {
            local = self.reset(&name, local, high).await?;
        }
        if local == high {
            return Ok(());
        }
        self.fetch_group(client, &name, local, high, report).await
    }

    /// Lists and fetches `local + 1 ..= high` in slices, persisting the
    /// watermark after each slice.
    async fn fetch_group<S>(
        &self,
        client: &mut Client<S>,
        name: &GroupName,
        local: u64,
        high: u64,
        report: &mut PassReport,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let slice = client.state().quirks.slice_size();
        let mut watermark = local;
        let mut low = local + 1;
        debug!(group = %name, low, high, "fetching");

        loop {
            let range = if high > low + slice - 1 {
                ArticleRange::new(low, Some(low + slice - 1))
            } else {
                ArticleRange::new(low, None)
            };
            let articles = client.list_slice(range).await?;

            let mut progress = Progress::default();
            let fetched = pipeline::fetch(
                client.framed(),
                self.store.as_ref(),
                articles,
                self.config.max_article_size,
                &mut progress,
            )
            .await;
            report.absorb(&progress);

            let persisted = match progress.handled {
                Some(handled) if handled > watermark => self
                    .store
                    .set_watermark(name, handled)
                    .await
                    .map(|()| handled),
                _ => Ok(watermark),
            };
            fetched?;
            watermark = persisted?;

            let Some(end) = range.high else {
                break;
            };
            low = end.max(watermark) + 1;
            if low > high {
                break;
            }
        }
        debug!(group = %name, watermark, "group done");
        Ok(())
    }

    /// Fetches articles NEWNEWS reports for the tracked groups.
    async fn sweep_new_news<S>(
        &self,
        client: &mut Client<S>,
        started: DateTime<Utc>,
        report: &mut PassReport,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let Some(since) = self.store.last_new_news().await? else {
            // the group scan just covered everything up to now
            self.store.set_last_new_news(started).await?;
            return Ok(());
        };
        let groups = self.store.tracked_groups().await?;
        for pattern in newnews_patterns(&groups) {
            let articles: Vec<ArticleRef> = client.new_news(&pattern, since).await?;
            let mut progress = Progress::default();
            let fetched = pipeline::fetch(
                client.framed(),
                self.store.as_ref(),
                articles,
                self.config.max_article_size,
                &mut progress,
            )
            .await;
            report.absorb(&progress);
            fetched?;
        }
        self.store.set_last_new_news(started).await?;
        Ok(())
    }
}

/// Joins group names into wildmats short enough for one command line.
fn newnews_patterns(groups: &[GroupName]) -> Vec<String> {
    let mut patterns = Vec::new();
    let mut current = String::new();
    for name in groups {
        if !current.is_empty() && current.len() + 1 + name.as_str().len() > NEWNEWS_PATTERN_LIMIT {
            patterns.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(',');
        }
        current.push_str(name.as_str());
    }
    if !current.is_empty() {
        patterns.push(current);
    }
    patterns
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
    use std::time::Duration;

    use newsledger_nntp::Wildmat;
    use tokio_test::io::Builder;

    use super::*;
    use crate::testing::MemoryStore;

    fn puller(store: &Arc<MemoryStore>, config: PullerConfig) -> Puller {
        let store: Arc<dyn SyncStore> = store.clone();
        Puller::new(config, store)
    }

    #[tokio::test]
    async fn test_pass_fetches_delta() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"LIST ACTIVE\r\n")
            .read(b"215 list\r\nmisc.test 3 1 y\r\nalt.other 5 1 y\r\n.\r\n")
            .write(b"GROUP misc.test\r\n")
            .read(b"211 3 1 3 misc.test\r\n")
            .write(b"XHDR Message-ID 2-\r\n")
            .read(b"221 follows\r\n2 <b@x>\r\n3 <c@x>\r\n.\r\n")
            .write(b"ARTICLE 2\r\n")
            .write(b"ARTICLE 3\r\n")
            .read(b"220 2 <b@x>\r\nMessage-ID: <b@x>\r\n\r\nb\r\n.\r\n")
            .read(b"220 3 <c@x>\r\nMessage-ID: <c@x>\r\n\r\nc\r\n.\r\n")
            .build();
        let store = Arc::new(MemoryStore::default());
        store.track("misc.test", 1);
        let puller = puller(&store, PullerConfig::new("remote"));

        let mut client = Client::connect(mock).await.unwrap();
        let report = puller.pass(&mut client).await.unwrap();
        assert_eq!(report.groups, 1);
        assert_eq!(report.ingested, 2);
        assert_eq!(store.mark("misc.test"), Some(3));
        assert_eq!(store.mark("alt.other"), None);
    }

    #[tokio::test]
    async fn test_up_to_date_group_is_not_selected() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"LIST ACTIVE\r\n")
            .read(b"215 list\r\nmisc.test 3 1 y\r\n.\r\n")
            .build();
        let store = Arc::new(MemoryStore::default());
        store.track("misc.test", 3);
        let puller = puller(&store, PullerConfig::new("remote"));
        let mut client = Client::connect(mock).await.unwrap();
        let report = puller.pass(&mut client).await.unwrap();
        assert_eq!(report.requested, 0);
    }

    #[tokio::test]
    async fn test_watermark_regression_rescans() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"LIST ACTIVE\r\n")
            .read(b"215 list\r\nmisc.test 5 1 y\r\n.\r\n")
            .write(b"GROUP misc.test\r\n")
            .read(b"211 5 1 5 misc.test\r\n")
            .write(b"XHDR Message-ID 1-\r\n")
            .read(b"423 nothing there\r\n")
            .build();
        let store = Arc::new(MemoryStore::default());
        store.track("misc.test", 10);
        let puller = puller(&store, PullerConfig::new("remote"));
        let mut client = Client::connect(mock).await.unwrap();
        puller.pass(&mut client).await.unwrap();
        assert_eq!(store.mark("misc.test"), Some(0));
    }

    #[tokio::test]
    async fn test_vanished_group_resets() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"LIST ACTIVE\r\n")
            .read(b"500 unknown\r\n")
            .write(b"LIST NEWSGROUPS\r\n")
            .read(b"215 list\r\nmisc.test\tTesting\r\n.\r\n")
            .write(b"GROUP misc.test\r\n")
            .read(b"411 no such group\r\n")
            .build();
        let store = Arc::new(MemoryStore::default());
        store.track("misc.test", 7);
        let puller = puller(&store, PullerConfig::new("remote"));
        let mut client = Client::connect(mock).await.unwrap();
        puller.pass(&mut client).await.unwrap();
        assert_eq!(store.mark("misc.test"), Some(0));
    }

    #[tokio::test]
    async fn test_auto_add_policy() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"LIST ACTIVE\r\n")
            .read(b"215 list\r\nmisc.new 0 1 y\r\nalt.new 0 1 y\r\n.\r\n")
            .build();
        let store = Arc::new(MemoryStore::default());
        let config = PullerConfig::builder("remote")
            .auto_add(Wildmat::compile("misc.*").unwrap())
            .build();
        let puller = puller(&store, config);
        let mut client = Client::connect(mock).await.unwrap();
        puller.pass(&mut client).await.unwrap();
        assert_eq!(store.mark("misc.new"), Some(0));
        assert_eq!(store.mark("alt.new"), None);
    }

    #[tokio::test]
    async fn test_group_error_skips_group() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"LIST ACTIVE\r\n")
            .read(b"215 list\r\na.one 2 1 y\r\nb.two 1 1 y\r\n.\r\n")
            .write(b"GROUP a.one\r\n")
            .read(b"480 authentication required\r\n")
            .write(b"GROUP b.two\r\n")
            .read(b"211 1 1 1 b.two\r\n")
            .write(b"XHDR Message-ID 1-\r\n")
            .read(b"221 follows\r\n1 <one@x>\r\n.\r\n")
            .write(b"ARTICLE 1\r\n")
            .read(b"430 gone\r\n")
            .build();
        let store = Arc::new(MemoryStore::default());
        store.track("a.one", 0);
        store.track("b.two", 0);
        let puller = puller(&store, PullerConfig::new("remote"));
        let mut client = Client::connect(mock).await.unwrap();
        let report = puller.pass(&mut client).await.unwrap();
        assert_eq!(report.groups, 2);
        assert_eq!(store.mark("a.one"), Some(0));
        assert_eq!(store.mark("b.two"), Some(1));
    }

    #[tokio::test]
    async fn test_slices() {
        let mut mock = Builder::new();
        mock.read(b"200 hi\r\n")
            .write(b"LIST ACTIVE\r\n")
            .read(b"215 list\r\nmisc.big 1000 1 y\r\n.\r\n")
            .write(b"GROUP misc.big\r\n")
            .read(b"211 1000 1 1000 misc.big\r\n")
            .write(b"XHDR Message-ID 1-800\r\n")
            .read(b"221 follows\r\n800 <800@x>\r\n.\r\n")
            .write(b"ARTICLE 800\r\n")
            .read(b"220 800 <800@x>\r\nMessage-ID: <800@x>\r\n\r\nx\r\n.\r\n")
            .write(b"XHDR Message-ID 801-\r\n")
            .read(b"221 follows\r\n1000 <1000@x>\r\n.\r\n")
            .write(b"ARTICLE 1000\r\n")
            .read(b"220 1000 <1000@x>\r\nMessage-ID: <1000@x>\r\n\r\nx\r\n.\r\n");
        let store = Arc::new(MemoryStore::default());
        store.track("misc.big", 0);
        let puller = puller(&store, PullerConfig::new("remote"));
        let mut client = Client::connect(mock.build()).await.unwrap();
        let report = puller.pass(&mut client).await.unwrap();
        assert_eq!(report.ingested, 2);
        assert_eq!(store.mark("misc.big"), Some(1000));
    }

    #[tokio::test]
    async fn test_new_groups_first_pass_records_time() {
        let mock = Builder::new()
            .read(b"200 hi\r\n")
            .write(b"LIST ACTIVE\r\n")
            .read(b"215 list\r\n.\r\n")
            .build();
        let store = Arc::new(MemoryStore::default());
        let config = PullerConfig::builder("remote").new_groups(true).build();
        let puller = puller(&store, config);
        let mut client = Client::connect(mock).await.unwrap();
        puller.pass(&mut client).await.unwrap();
        assert!(store.last_new_groups().await.unwrap().is_some());
    }

    #[test]
    fn test_newnews_patterns() {
        let groups: Vec<GroupName> = (0..100)
            .map(|i| GroupName::parse(format!("misc.group{i:03}").as_bytes()).unwrap())
            .collect();
        let patterns = newnews_patterns(&groups);
        assert!(patterns.len() > 1);
        assert!(patterns.iter().all(|p| p.len() <= NEWNEWS_PATTERN_LIMIT));
        assert_eq!(
            patterns.iter().map(|p| p.split(',').count()).sum::<usize>(),
            100
        );
        assert!(newnews_patterns(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let store = Arc::new(MemoryStore::default());
        let config = PullerConfig::builder("127.0.0.1")
            .port(1)
            .retry_delay(Duration::from_secs(3600))
            .build();
        let puller = puller(&store, config);
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        let run = tokio::spawn(async move { puller.run(cancel).await });
        stopper.cancel();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
    }
}
