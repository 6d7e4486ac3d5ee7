//! In-memory article spool.
//!
//! Groups number their articles in arrival order, starting at 1. Every
//! article is indexed by Message-ID and filed under each carried group
//! its Newsgroups header names; groups it names that are not carried
//! here are ignored.

mod model;
mod provider;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use newsledger_nntp::{ActiveEntry, GroupName, MessageId, NewsgroupsEntry, Wildmat};
use newsledger_server::GroupSummary;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub use model::{ParsedArticle, StoredArticle};

use crate::{Error, Result};

/// Outcome of filing an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filing {
    /// Stored under the returned Message-ID.
    Stored(MessageId),
    /// An article with this Message-ID is already spooled.
    Duplicate,
    /// Refused for good.
    Refused(Error),
}

#[derive(Debug)]
struct GroupState {
    description: String,
    created: DateTime<Utc>,
    posting: bool,
    articles: BTreeMap<u64, MessageId>,
    high: u64,
}

impl GroupState {
    fn summary(&self, name: &GroupName) -> GroupSummary {
        match (self.articles.first_key_value(), self.articles.last_key_value()) {
            (Some((&low, _)), Some((&high, _))) => GroupSummary {
                name: name.clone(),
                count: self.articles.len() as u64,
                low,
                high,
            },
            _ => GroupSummary {
                name: name.clone(),
                count: 0,
                low: 0,
                high: 0,
            },
        }
    }

    fn active(&self, name: &GroupName) -> ActiveEntry {
        let summary = self.summary(name);
        ActiveEntry {
            name: name.clone(),
            high: summary.high,
            low: summary.low,
            status: if self.posting { "y" } else { "n" }.to_owned(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    groups: BTreeMap<GroupName, GroupState>,
    articles: HashMap<MessageId, Arc<StoredArticle>>,
    arrivals: Vec<MessageId>,
}

/// Thread-safe in-memory store of groups and articles.
#[derive(Debug)]
pub struct Spool {
    host: String,
    inner: RwLock<Inner>,
}

impl Default for Spool {
    fn default() -> Self {
        Self::new("newsledger")
    }
}

impl Spool {
    /// Creates an empty spool. `host` names it in Xref headers and
    /// generated Message-IDs.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Creates a group. Returns false if it already exists.
    pub async fn create_group(&self, name: &GroupName, description: &str, posting: bool) -> bool {
        let mut inner = self.inner.write().await;
        if inner.groups.contains_key(name) {
            return false;
        }
        inner.groups.insert(
            name.clone(),
            GroupState {
                description: description.to_owned(),
                created: Utc::now(),
                posting,
                articles: BTreeMap::new(),
                high: 0,
            },
        );
        info!(group = %name, "group created");
        true
    }

    /// Returns true if the group exists.
    pub async fn has_group(&self, name: &GroupName) -> bool {
        self.inner.read().await.groups.contains_key(name)
    }

    /// Returns true if an article with this Message-ID is spooled.
    pub async fn contains(&self, id: &MessageId) -> bool {
        self.inner.read().await.articles.contains_key(id)
    }

    /// Looks up an article by Message-ID.
    pub async fn get(&self, id: &MessageId) -> Option<Arc<StoredArticle>> {
        self.inner.read().await.articles.get(id).cloned()
    }

    /// Number of spooled articles.
    pub async fn len(&self) -> usize {
        self.inner.read().await.articles.len()
    }

    /// Returns true when no article is spooled.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.articles.is_empty()
    }

    /// Files a transferred article offered as `id`.
    ///
    /// The Message-ID header must be present and equal to `id`.
    pub async fn receive(&self, id: &MessageId, raw: &[u8]) -> Filing {
        let article = match ParsedArticle::parse(raw) {
            Ok(article) => article,
            Err(error) => return Filing::Refused(error),
        };
        match article.message_id() {
            Ok(Some(found)) if &found == id => {}
            Ok(Some(found)) => {
                return Filing::Refused(Error::IdMismatch {
                    expected: id.to_string(),
                    found: found.to_string(),
                });
            }
            Ok(None) => return Filing::Refused(Error::MissingHeader("Message-ID")),
            Err(error) => return Filing::Refused(error),
        }
        self.insert(id.clone(), article, false).await
    }

    /// Files a locally posted article, adding a Message-ID if it has none.
    pub async fn post(&self, raw: &[u8]) -> Filing {
        let mut article = match ParsedArticle::parse(raw) {
            Ok(article) => article,
            Err(error) => return Filing::Refused(error),
        };
        for required in ["From", "Subject", "Newsgroups"] {
            if article.header(required).is_none() {
                return Filing::Refused(Error::MissingHeader(required));
            }
        }
        let id = match article.message_id() {
            Ok(Some(id)) => id,
            Ok(None) => {
                let id = match self.generate_id(raw) {
                    Ok(id) => id,
                    Err(error) => return Filing::Refused(error),
                };
                article.prepend_header("Message-ID", id.as_str());
                id
            }
            Err(error) => return Filing::Refused(error),
        };
        self.insert(id, article, true).await
    }

    fn generate_id(&self, raw: &[u8]) -> Result<MessageId> {
        let mut hasher = Sha256::new();
        hasher.update(raw);
        hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        let digest = hasher.finalize();
        let local = hex::encode(&digest[..12]);
        Ok(MessageId::from_core(&format!("{local}@{}", self.host))?)
    }

    async fn insert(&self, id: MessageId, article: ParsedArticle, posting: bool) -> Filing {
        let wanted = article.newsgroups();
        let mut inner = self.inner.write().await;
        if inner.articles.contains_key(&id) {
            return Filing::Duplicate;
        }

        let mut carried = Vec::new();
        for name in wanted {
            let Some(group) = inner.groups.get(&name) else {
                continue;
            };
            if posting && !group.posting {
                return Filing::Refused(Error::PostingNotAllowed(name.to_string()));
            }
            if !carried.contains(&name) {
                carried.push(name);
            }
        }
        if carried.is_empty() {
            return Filing::Refused(Error::NoGroups);
        }

        let mut filed = Vec::with_capacity(carried.len());
        for name in carried {
            if let Some(group) = inner.groups.get_mut(&name) {
                group.high += 1;
                group.articles.insert(group.high, id.clone());
                filed.push((name, group.high));
            }
        }
        let xref = std::iter::once(self.host.clone())
            .chain(filed.iter().map(|(g, n)| format!("{g}:{n}")))
            .collect::<Vec<_>>()
            .join(" ");
        debug!(%id, %xref, "article filed");

        let stored = StoredArticle {
            message_id: id.clone(),
            article,
            filed,
            xref,
            arrived: Utc::now(),
        };
        inner.articles.insert(id.clone(), Arc::new(stored));
        inner.arrivals.push(id.clone());
        Filing::Stored(id)
    }

    async fn summary(&self, name: &GroupName) -> Option<GroupSummary> {
        let inner = self.inner.read().await;
        inner.groups.get(name).map(|g| g.summary(name))
    }

    async fn active_entries(
        &self,
        filter: Option<&Wildmat>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<ActiveEntry> {
        let inner = self.inner.read().await;
        inner
            .groups
            .iter()
            .filter(|(name, _)| filter.is_none_or(|w| w.matches(name.as_str())))
            .filter(|(_, group)| since.is_none_or(|t| group.created >= t))
            .map(|(name, group)| group.active(name))
            .collect()
    }

    async fn descriptions(&self, filter: Option<&Wildmat>) -> Vec<NewsgroupsEntry> {
        let inner = self.inner.read().await;
        inner
            .groups
            .iter()
            .filter(|(name, _)| filter.is_none_or(|w| w.matches(name.as_str())))
            .map(|(name, group)| NewsgroupsEntry {
                name: name.clone(),
                description: group.description.clone(),
            })
            .collect()
    }

    /// Message-IDs that arrived since `since` in groups matching `groups`,
    /// oldest first.
    async fn arrived_since(&self, groups: &Wildmat, since: DateTime<Utc>) -> Vec<MessageId> {
        let inner = self.inner.read().await;
        inner
            .arrivals
            .iter()
            .filter_map(|id| inner.articles.get(id))
            .filter(|a| a.arrived >= since)
            .filter(|a| a.filed.iter().any(|(g, _)| groups.matches(g.as_str())))
            .map(|a| a.message_id.clone())
            .collect()
    }

    /// Articles of a group whose numbers lie in `range`.
    async fn numbered(
        &self,
        name: &GroupName,
        range: newsledger_nntp::ArticleRange,
    ) -> Vec<(u64, Arc<StoredArticle>)> {
        let inner = self.inner.read().await;
        let Some(group) = inner.groups.get(name) else {
            return Vec::new();
        };
        if range.is_empty() {
            return Vec::new();
        }
        let upper = range.high.unwrap_or(u64::MAX);
        group
            .articles
            .range(range.low..=upper)
            .filter_map(|(&n, id)| inner.articles.get(id).map(|a| (n, Arc::clone(a))))
            .collect()
    }

    async fn by_number(&self, name: &GroupName, number: u64) -> Option<Arc<StoredArticle>> {
        let inner = self.inner.read().await;
        let id = inner.groups.get(name)?.articles.get(&number)?;
        inner.articles.get(id).cloned()
    }

    async fn neighbour(
        &self,
        name: &GroupName,
        number: u64,
        forward: bool,
    ) -> Option<(u64, MessageId)> {
        let inner = self.inner.read().await;
        let articles = &inner.groups.get(name)?.articles;
        let found = if forward {
            articles.range(number.saturating_add(1)..).next()
        } else {
            articles.range(..number).next_back()
        };
        found.map(|(&n, id)| (n, id.clone()))
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
    use newsledger_nntp::ArticleRange;

    use super::*;

    fn group(name: &str) -> GroupName {
        GroupName::parse(name.as_bytes()).unwrap()
    }

    fn id(s: &str) -> MessageId {
        MessageId::parse(s.as_bytes()).unwrap()
    }

    fn article(id: &str, groups: &str) -> Vec<u8> {
        format!(
            "From: a@example.org\nSubject: test\nNewsgroups: {groups}\nMessage-ID: {id}\n\nbody\n"
        )
        .into_bytes()
    }

    async fn spool() -> Spool {
        let spool = Spool::new("spool.test");
        spool.create_group(&group("misc.test"), "Testing", true).await;
        spool.create_group(&group("alt.test"), "", false).await;
        spool
    }

    #[tokio::test]
    async fn test_create_group_once() {
        let spool = spool().await;
        assert!(!spool.create_group(&group("misc.test"), "again", true).await);
        assert!(spool.has_group(&group("alt.test")).await);
        assert!(!spool.has_group(&group("rec.none")).await);
    }

    #[tokio::test]
    async fn test_receive_numbers_per_group() {
        let spool = spool().await;
        let first = id("<1@x>");
        assert_eq!(
            spool.receive(&first, &article("<1@x>", "misc.test,alt.test,rec.none")).await,
            Filing::Stored(first.clone())
        );
        let second = id("<2@x>");
        spool.receive(&second, &article("<2@x>", "misc.test")).await;

        let stored = spool.get(&first).await.unwrap();
        assert_eq!(stored.xref, "spool.test misc.test:1 alt.test:1");
        let summary = spool.summary(&group("misc.test")).await.unwrap();
        assert_eq!((summary.count, summary.low, summary.high), (2, 1, 2));
        assert_eq!(spool.len().await, 2);
    }

    #[tokio::test]
    async fn test_receive_duplicate_and_refusals() {
        let spool = spool().await;
        let first = id("<1@x>");
        spool.receive(&first, &article("<1@x>", "misc.test")).await;
        assert_eq!(
            spool.receive(&first, &article("<1@x>", "misc.test")).await,
            Filing::Duplicate
        );
        assert!(matches!(
            spool.receive(&id("<3@x>"), &article("<4@x>", "misc.test")).await,
            Filing::Refused(Error::IdMismatch { .. })
        ));
        assert_eq!(
            spool.receive(&id("<5@x>"), &article("<5@x>", "rec.none")).await,
            Filing::Refused(Error::NoGroups)
        );
        assert_eq!(
            spool.receive(&id("<6@x>"), b"Newsgroups: misc.test\n\nbody\n").await,
            Filing::Refused(Error::MissingHeader("Message-ID"))
        );
    }

    #[tokio::test]
    async fn test_post_generates_id() {
        let spool = spool().await;
        let raw = b"From: a@example.org\nSubject: hi\nNewsgroups: misc.test\n\nbody\n";
        let Filing::Stored(generated) = spool.post(raw).await else {
            panic!("post refused");
        };
        assert!(generated.as_str().ends_with("@spool.test>"));
        let stored = spool.get(&generated).await.unwrap();
        assert!(stored.article.head.starts_with(b"Message-ID: <"));
    }

    #[tokio::test]
    async fn test_post_checks() {
        let spool = spool().await;
        assert_eq!(
            spool.post(b"Subject: hi\nNewsgroups: misc.test\n\nbody\n").await,
            Filing::Refused(Error::MissingHeader("From"))
        );
        assert_eq!(
            spool.post(&article("<7@x>", "alt.test")).await,
            Filing::Refused(Error::PostingNotAllowed("alt.test".into()))
        );
    }

    #[tokio::test]
    async fn test_ranges_and_neighbours() {
        let spool = spool().await;
        for n in 1..=4 {
            let mid = format!("<{n}@x>");
            spool.receive(&id(&mid), &article(&mid, "misc.test")).await;
        }
        let name = group("misc.test");
        let listed: Vec<u64> = spool
            .numbered(&name, ArticleRange::new(2, None))
            .await
            .iter()
            .map(|(n, _)| *n)
            .collect();
        assert_eq!(listed, [2, 3, 4]);
        assert!(spool.numbered(&name, ArticleRange::new(3, Some(2))).await.is_empty());
        assert_eq!(spool.neighbour(&name, 2, true).await.unwrap().0, 3);
        assert_eq!(spool.neighbour(&name, 2, false).await.unwrap().0, 1);
        assert!(spool.neighbour(&name, 4, true).await.is_none());
        assert!(spool.by_number(&name, 9).await.is_none());
    }

    #[tokio::test]
    async fn test_arrived_since() {
        let spool = spool().await;
        let before = Utc::now();
        spool.receive(&id("<1@x>"), &article("<1@x>", "misc.test")).await;
        spool.receive(&id("<2@x>"), &article("<2@x>", "alt.test")).await;
        let misc = Wildmat::compile("misc.*").unwrap();
        assert_eq!(spool.arrived_since(&misc, before).await, [id("<1@x>")]);
        let later = Utc::now() + chrono::Duration::seconds(60);
        assert!(spool.arrived_since(&Wildmat::any(), later).await.is_empty());
    }
}
