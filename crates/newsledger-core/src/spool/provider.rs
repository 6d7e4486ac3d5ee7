//! The spool as the server's content provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newsledger_nntp::{
    ActiveEntry, ArticleRange, GroupName, HdrEntry, MessageId, NewsgroupsEntry, Overview, Wildmat,
};
use newsledger_server::{
    Article, ArticlePart, ArticleTarget, GroupSummary, Provider, ProviderResult, Received, Wanted,
};

use super::{Filing, Spool, StoredArticle};

fn part_of(article: &StoredArticle, number: u64, part: ArticlePart) -> Article {
    let head = matches!(part, ArticlePart::Full | ArticlePart::Head);
    let body = matches!(part, ArticlePart::Full | ArticlePart::Body);
    Article {
        number,
        message_id: article.message_id.clone(),
        head: head.then(|| article.article.head.clone()),
        body: body.then(|| article.article.body.clone()),
    }
}

fn received(filing: Filing) -> Received {
    match filing {
        Filing::Stored(_) => Received::Accepted,
        Filing::Duplicate => Received::Rejected("duplicate article".into()),
        Filing::Refused(error) => Received::Rejected(error.to_string()),
    }
}

#[async_trait]
impl Provider for Spool {
    fn supports_new_news(&self) -> bool {
        true
    }

    fn supports_over_by_msgid(&self) -> bool {
        true
    }

    fn supports_hdr(&self) -> bool {
        true
    }

    fn supports_ihave(&self) -> bool {
        true
    }

    fn supports_post(&self) -> bool {
        true
    }

    fn supports_stream(&self) -> bool {
        true
    }

    async fn article(
        &self,
        target: ArticleTarget<'_>,
        part: ArticlePart,
    ) -> ProviderResult<Option<Article>> {
        Ok(match target {
            ArticleTarget::MessageId(id) => self.get(id).await.map(|a| part_of(&a, 0, part)),
            ArticleTarget::Number(group, number) => self
                .by_number(group, number)
                .await
                .map(|a| part_of(&a, number, part)),
        })
    }

    async fn group(&self, name: &GroupName) -> ProviderResult<Option<GroupSummary>> {
        Ok(self.summary(name).await)
    }

    async fn list_group(
        &self,
        name: &GroupName,
        range: ArticleRange,
    ) -> ProviderResult<Option<(GroupSummary, Vec<u64>)>> {
        let Some(summary) = self.summary(name).await else {
            return Ok(None);
        };
        let numbers = self
            .numbered(name, range)
            .await
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        Ok(Some((summary, numbers)))
    }

    async fn next_article(
        &self,
        group: &GroupName,
        number: u64,
    ) -> ProviderResult<Option<(u64, MessageId)>> {
        Ok(self.neighbour(group, number, true).await)
    }

    async fn previous_article(
        &self,
        group: &GroupName,
        number: u64,
    ) -> ProviderResult<Option<(u64, MessageId)>> {
        Ok(self.neighbour(group, number, false).await)
    }

    async fn new_news(
        &self,
        groups: &Wildmat,
        since: DateTime<Utc>,
    ) -> ProviderResult<Vec<MessageId>> {
        Ok(self.arrived_since(groups, since).await)
    }

    async fn new_groups(&self, since: DateTime<Utc>) -> ProviderResult<Vec<ActiveEntry>> {
        Ok(self.active_entries(None, Some(since)).await)
    }

    async fn active(&self, filter: Option<&Wildmat>) -> ProviderResult<Vec<ActiveEntry>> {
        Ok(self.active_entries(filter, None).await)
    }

    async fn newsgroups(&self, filter: Option<&Wildmat>) -> ProviderResult<Vec<NewsgroupsEntry>> {
        Ok(self.descriptions(filter).await)
    }

    async fn overview_by_id(&self, id: &MessageId) -> ProviderResult<Option<Overview>> {
        Ok(self.get(id).await.map(|a| a.overview(0)))
    }

    async fn overview(
        &self,
        group: &GroupName,
        range: ArticleRange,
    ) -> ProviderResult<Vec<Overview>> {
        Ok(self
            .numbered(group, range)
            .await
            .iter()
            .map(|(n, a)| a.overview(*n))
            .collect())
    }

    async fn header_by_id(
        &self,
        field: &str,
        id: &MessageId,
    ) -> ProviderResult<Option<HdrEntry>> {
        Ok(self.get(id).await.map(|a| a.header_entry(field, 0)))
    }

    async fn header(
        &self,
        field: &str,
        group: &GroupName,
        range: ArticleRange,
    ) -> ProviderResult<Vec<HdrEntry>> {
        Ok(self
            .numbered(group, range)
            .await
            .iter()
            .map(|(n, a)| a.header_entry(field, *n))
            .collect())
    }

    async fn wanted(&self, id: &MessageId) -> ProviderResult<Wanted> {
        Ok(if self.contains(id).await {
            Wanted::No
        } else {
            Wanted::Yes
        })
    }

    async fn post(&self, article: Vec<u8>) -> ProviderResult<Received> {
        Ok(received(Spool::post(self, &article).await))
    }

    async fn receive(&self, id: &MessageId, article: Vec<u8>) -> ProviderResult<Received> {
        Ok(received(Spool::receive(self, id, &article).await))
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

    const ARTICLE: &[u8] =
        b"From: a@example.org\nSubject: hi\nNewsgroups: misc.test\nMessage-ID: <1@x>\n\nbody\n";

    async fn spool() -> (Spool, GroupName, MessageId) {
        let spool = Spool::new("spool.test");
        let name = GroupName::parse(b"misc.test").unwrap();
        spool.create_group(&name, "Testing", true).await;
        let id = MessageId::parse(b"<1@x>").unwrap();
        spool.receive(&id, ARTICLE).await;
        (spool, name, id)
    }

    #[tokio::test]
    async fn test_article_parts() {
        let (spool, name, id) = spool().await;
        let provider: &dyn Provider = &spool;
        let full = provider
            .article(ArticleTarget::Number(&name, 1), ArticlePart::Full)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(full.number, 1);
        assert!(full.head.is_some() && full.body.is_some());
        let body = provider
            .article(ArticleTarget::MessageId(&id), ArticlePart::Body)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body.number, 0);
        assert_eq!(body.head, None);
        assert_eq!(body.body.as_deref(), Some(&b"body\n"[..]));
        let stat = provider
            .article(ArticleTarget::Number(&name, 1), ArticlePart::Stat)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((stat.head, stat.body), (None, None));
        assert!(
            provider
                .article(ArticleTarget::Number(&name, 2), ArticlePart::Full)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_wanted_and_receive() {
        let (spool, _, id) = spool().await;
        let provider: &dyn Provider = &spool;
        assert_eq!(provider.wanted(&id).await.unwrap(), Wanted::No);
        let other = MessageId::parse(b"<2@x>").unwrap();
        assert_eq!(provider.wanted(&other).await.unwrap(), Wanted::Yes);
        assert_eq!(
            provider.receive(&id, ARTICLE.to_vec()).await.unwrap(),
            Received::Rejected("duplicate article".into())
        );
    }

    #[tokio::test]
    async fn test_listings() {
        let (spool, name, _) = spool().await;
        let provider: &dyn Provider = &spool;
        let active = provider.active(None).await.unwrap();
        assert_eq!(active[0].to_string(), "misc.test 1 1 y");
        let none = Wildmat::compile("alt.*").unwrap();
        assert!(provider.newsgroups(Some(&none)).await.unwrap().is_empty());
        let over = provider.overview(&name, ArticleRange::ALL).await.unwrap();
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].message_id, "<1@x>");
        let hdr = provider
            .header("subject", &name, ArticleRange::ALL)
            .await
            .unwrap();
        assert_eq!(hdr[0].to_string(), "1 hi");
        let (summary, numbers) = provider
            .list_group(&name, ArticleRange::ALL)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(numbers, [1]);
    }
}
