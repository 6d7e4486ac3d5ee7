//! Pipelined article fetching.
//!
//! A dispatch loop decides wantedness and writes `ARTICLE` requests
//! ahead of their responses; a consumer reads the responses in the same
//! order and hands the articles to the store. The two share a bounded
//! queue, so a slow store holds back further requests.
//!
//! Articles that are not wanted still travel through the queue as skip
//! slots. The consumer therefore sees every listed article in listing
//! order, and [`Progress::handled`] never passes an article whose
//! response is still outstanding.

use std::collections::HashSet;
use std::io;

use newsledger_nntp::framing::{FramedReader, FramedWriter};
use newsledger_nntp::{FramedStream, MessageId, ResponseCode, parse_response};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::store::{Ingest, SyncStore};
use crate::{Error, Result};

/// Requests allowed in flight ahead of the consumer.
pub const QUEUE_DEPTH: usize = 32;

/// An article some listing named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    /// Number in the selected group; `None` when fetched by Message-ID.
    pub number: Option<u64>,
    /// Message-ID.
    pub id: MessageId,
    /// First reference, when the listing carried one.
    pub reference: Option<MessageId>,
}

impl ArticleRef {
    /// An article known by its number in the selected group.
    #[must_use]
    pub const fn numbered(number: u64, id: MessageId, reference: Option<MessageId>) -> Self {
        Self {
            number: Some(number),
            id,
            reference,
        }
    }

    /// An article known only by Message-ID.
    #[must_use]
    pub const fn by_id(id: MessageId) -> Self {
        Self {
            number: None,
            id,
            reference: None,
        }
    }

    fn request(&self) -> String {
        match self.number {
            Some(number) => format!("ARTICLE {number}"),
            None => format!("ARTICLE {}", self.id),
        }
    }
}

/// Counters for one fetch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Highest article number fully dealt with: stored, known, refused
    /// by the store, or gone on the remote.
    pub handled: Option<u64>,
    /// `ARTICLE` requests written.
    pub requested: usize,
    /// Articles the store took as new.
    pub ingested: usize,
    /// Articles the store already had.
    pub duplicates: usize,
    /// Articles the store refused or that were too large.
    pub rejected: usize,
}

impl Progress {
    fn advance(&mut self, number: u64) {
        self.handled = Some(self.handled.map_or(number, |h| h.max(number)));
    }
}

enum Slot {
    Skip(Option<u64>),
    Fetch(ArticleRef),
}

/// Fetches `articles` over `framed` into `store`.
///
/// `progress` is updated as responses are consumed and stays valid when
/// an error is returned, so the caller can persist what was handled
/// before the failure.
pub(crate) async fn fetch<S>(
    framed: &mut FramedStream<S>,
    store: &dyn SyncStore,
    articles: Vec<ArticleRef>,
    max_article_size: usize,
    progress: &mut Progress,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, writer) = framed.split_mut();
    let (queue, pending) = mpsc::channel(QUEUE_DEPTH);
    let (failed_tx, failed_rx) = oneshot::channel();

    let (dispatched, consumed) = tokio::join!(
        dispatch(writer, store, articles, queue, failed_rx),
        consume(reader, store, pending, max_article_size, progress, failed_tx),
    );

    if let Err(error) = consumed {
        return Err(Error::ConsumerFailed(Box::new(error)));
    }
    progress.requested += dispatched?;
    Ok(())
}

async fn dispatch<W>(
    writer: &mut FramedWriter<W>,
    store: &dyn SyncStore,
    articles: Vec<ArticleRef>,
    queue: mpsc::Sender<Slot>,
    mut failed: oneshot::Receiver<()>,
) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut queued: HashSet<MessageId> = HashSet::new();
    let mut requested = 0;

    for article in articles {
        if !matches!(failed.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
            debug!("consumer stopped, no further requests");
            break;
        }

        let wanted = !queued.contains(&article.id) && store.is_wanted(&article.id).await?;
        let slot = if wanted {
            if let Some(reference) = &article.reference
                && !queued.contains(reference)
                && !store.reference_exists(reference).await?
            {
                debug!(id = %article.id, %reference, "reference not available yet");
            }
            writer.queue_line(&article.request());
            writer.flush().await?;
            requested += 1;
            queued.insert(article.id.clone());
            Slot::Fetch(article)
        } else {
            Slot::Skip(article.number)
        };

        if queue.send(slot).await.is_err() {
            debug!("consumer gone, no further requests");
            break;
        }
    }
    Ok(requested)
}

async fn consume<R>(
    reader: &mut FramedReader<R>,
    store: &dyn SyncStore,
    mut pending: mpsc::Receiver<Slot>,
    max_article_size: usize,
    progress: &mut Progress,
    failed: oneshot::Sender<()>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    while let Some(slot) = pending.recv().await {
        let (number, handled) = match slot {
            Slot::Skip(number) => (number, true),
            Slot::Fetch(article) => {
                match receive(reader, store, &article, max_article_size, progress).await {
                    Ok(handled) => (article.number, handled),
                    Err(error) => {
                        let _ = failed.send(());
                        return Err(error);
                    }
                }
            }
        };
        if let Some(number) = number.filter(|_| handled) {
            progress.advance(number);
        }
    }
    Ok(())
}

/// Reads one `ARTICLE` response. Returns whether the article counts as
/// handled.
async fn receive<R>(
    reader: &mut FramedReader<R>,
    store: &dyn SyncStore,
    article: &ArticleRef,
    max_article_size: usize,
    progress: &mut Progress,
) -> Result<bool>
where
    R: AsyncRead + Unpin,
{
    let line = reader.read_line().await?.ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed mid-pipeline")
    })?;
    let response = parse_response(&line)?;
    match response.code {
        ResponseCode::ARTICLE_FOLLOWS => {}
        ResponseCode::HEAD_FOLLOWS | ResponseCode::BODY_FOLLOWS => {
            warn!(id = %article.id, code = %response.code, "partial article, ignored");
            reader.dot_reader().discard().await?;
            return Ok(false);
        }
        ResponseCode::SERVICE_DISCONTINUED => return Err(Error::Discontinued(response.text)),
        code if (420..440).contains(&code.as_u16()) => {
            debug!(id = %article.id, %code, text = %response.text, "article unavailable");
            return Ok(true);
        }
        code => {
            warn!(id = %article.id, %code, text = %response.text, "unexpected ARTICLE response");
            return Ok(false);
        }
    }

    let body = match reader.dot_reader().read_to_end(max_article_size).await {
        Ok(body) => body,
        Err(newsledger_nntp::Error::BodyTooLarge { limit }) => {
            warn!(id = %article.id, limit, "article too large, skipped");
            progress.rejected += 1;
            return Ok(true);
        }
        Err(e) => return Err(e.into()),
    };

    match store.ingest(&article.id, body).await? {
        Ingest::Accepted => {
            debug!(id = %article.id, number = ?article.number, "article stored");
            progress.ingested += 1;
        }
        Ingest::Duplicate => progress.duplicates += 1,
        Ingest::Rejected(reason) => {
            debug!(id = %article.id, %reason, "article refused by store");
            progress.rejected += 1;
        }
    }
    Ok(true)
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
    use tokio_test::io::Builder;

    use super::*;
    use crate::testing::MemoryStore;

    fn id(s: &str) -> MessageId {
        MessageId::parse(s.as_bytes()).unwrap()
    }

    fn numbered(n: u64, s: &str) -> ArticleRef {
        ArticleRef::numbered(n, id(s), None)
    }

    #[tokio::test]
    async fn test_fetch_in_order() {
        let mock = Builder::new()
            .write(b"ARTICLE 1\r\n")
            .write(b"ARTICLE 3\r\n")
            .read(b"220 1 <a@x>\r\nMessage-ID: <a@x>\r\n\r\nfirst\r\n.\r\n")
            .read(b"220 3 <c@x>\r\nMessage-ID: <c@x>\r\n\r\n..dotted\r\n.\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let store = MemoryStore::default();
        store.have(&id("<b@x>"));

        let mut progress = Progress::default();
        let articles = vec![numbered(1, "<a@x>"), numbered(2, "<b@x>"), numbered(3, "<c@x>")];
        fetch(&mut framed, &store, articles, 1 << 20, &mut progress)
            .await
            .unwrap();

        assert_eq!(progress.handled, Some(3));
        assert_eq!(progress.requested, 2);
        assert_eq!(progress.ingested, 2);
        assert_eq!(
            store.article(&id("<c@x>")).unwrap(),
            b"Message-ID: <c@x>\n\n.dotted\n".to_vec()
        );
    }

    #[tokio::test]
    async fn test_negative_and_odd_responses() {
        let mock = Builder::new()
            .write(b"ARTICLE 1\r\n")
            .write(b"ARTICLE 2\r\n")
            .write(b"ARTICLE 3\r\n")
            .read(b"423 no such article\r\n")
            .read(b"221 2 <b@x>\r\nSubject: b\r\n.\r\n")
            .read(b"502 permission denied\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let store = MemoryStore::default();
        let mut progress = Progress::default();
        let articles = vec![numbered(1, "<a@x>"), numbered(2, "<b@x>"), numbered(3, "<c@x>")];
        fetch(&mut framed, &store, articles, 1 << 20, &mut progress)
            .await
            .unwrap();

        // only the 423 counts
        assert_eq!(progress.handled, Some(1));
        assert_eq!(progress.ingested, 0);
    }

    #[tokio::test]
    async fn test_duplicate_in_listing_requested_once() {
        let mock = Builder::new()
            .write(b"ARTICLE 4\r\n")
            .read(b"220 4 <d@x>\r\nMessage-ID: <d@x>\r\n\r\nbody\r\n.\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let store = MemoryStore::default();
        let mut progress = Progress::default();
        let articles = vec![numbered(4, "<d@x>"), numbered(5, "<d@x>")];
        fetch(&mut framed, &store, articles, 1 << 20, &mut progress)
            .await
            .unwrap();
        assert_eq!(progress.requested, 1);
        assert_eq!(progress.handled, Some(5));
    }

    #[tokio::test]
    async fn test_oversized_article_is_skipped() {
        let mock = Builder::new()
            .write(b"ARTICLE 1\r\n")
            .read(b"220 1 <a@x>\r\nMessage-ID: <a@x>\r\n\r\n0123456789\r\n.\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let store = MemoryStore::default();
        let mut progress = Progress::default();
        fetch(&mut framed, &store, vec![numbered(1, "<a@x>")], 8, &mut progress)
            .await
            .unwrap();
        assert_eq!(progress.rejected, 1);
        assert_eq!(progress.handled, Some(1));
        assert!(store.article(&id("<a@x>")).is_none());
    }

    #[tokio::test]
    async fn test_store_failure_keeps_progress() {
        let mock = Builder::new()
            .write(b"ARTICLE 1\r\n")
            .write(b"ARTICLE 2\r\n")
            .read(b"220 1 <a@x>\r\nMessage-ID: <a@x>\r\n\r\none\r\n.\r\n")
            .read(b"220 2 <b@x>\r\nMessage-ID: <b@x>\r\n\r\ntwo\r\n.\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let store = MemoryStore::default();
        store.fail_ingest(&id("<b@x>"));
        let mut progress = Progress::default();
        let articles = vec![numbered(1, "<a@x>"), numbered(2, "<b@x>")];
        let err = fetch(&mut framed, &store, articles, 1 << 20, &mut progress)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::ConsumerFailed(_)));
        assert!(err.is_fatal());
        assert_eq!(progress.handled, Some(1));
        assert_eq!(progress.ingested, 1);
    }

    #[tokio::test]
    async fn test_fetch_by_message_id() {
        let mock = Builder::new()
            .write(b"ARTICLE <n@x>\r\n")
            .read(b"220 0 <n@x>\r\nMessage-ID: <n@x>\r\n\r\nnews\r\n.\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let store = MemoryStore::default();
        let mut progress = Progress::default();
        fetch(
            &mut framed,
            &store,
            vec![ArticleRef::by_id(id("<n@x>"))],
            1 << 20,
            &mut progress,
        )
        .await
        .unwrap();
        assert_eq!(progress.ingested, 1);
        assert_eq!(progress.handled, None);
    }
}
