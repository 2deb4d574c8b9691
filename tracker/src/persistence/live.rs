//! Push-based query results.
//!
//! A storage engine owns one [`LiveQueries`] registry and takes its write
//! lock for every mutation. After a commit, while the lock is still held,
//! each registered query is re-evaluated and its listener receives the new
//! result set if it changed. Every commit is therefore seen on its own: two
//! writes never collapse into one emission.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use puzzle::Puzzle;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use super::PersistenceError;

/// One emission of a live query.
pub type FeedItem = Result<Vec<Puzzle>, PersistenceError>;

/// The result sets a storage engine can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Every puzzle, newest id first.
    All,
    /// Solved puzzles in leaderboard order.
    Ranking,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::All => "all",
            QueryKind::Ranking => "ranking",
        }
    }
}

/// Evaluates a [`QueryKind`] against committed storage.
pub trait QuerySource: Send + Sync + 'static {
    fn evaluate(&self, query: QueryKind) -> impl Future<Output = FeedItem> + Send;
}

struct Listener {
    query: QueryKind,
    tx: mpsc::UnboundedSender<FeedItem>,
    last: Option<Vec<Puzzle>>,
}

impl Listener {
    fn offer(&mut self, item: FeedItem) {
        match item {
            Ok(rows) if self.last.as_ref() == Some(&rows) => {
                tracing::trace!(feed = self.query.as_str(), "Result set unchanged");
            }
            Ok(rows) => {
                tracing::debug!(feed = self.query.as_str(), rows = rows.len(), "Live query emitting");
                self.last = Some(rows.clone());
                let _ = self.tx.send(Ok(rows));
            }
            Err(e) => {
                tracing::warn!(feed = self.query.as_str(), "Live query evaluation failed: {}", e);
                let _ = self.tx.send(Err(e));
            }
        }
    }
}

/// Registry of live queries plus the write lock of the engine that owns it.
pub struct LiveQueries<S> {
    source: Arc<S>,
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl<S> Clone for LiveQueries<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

impl<S: QuerySource> LiveQueries<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Take the write lock. Mutations happen while the returned guard is
    /// alive; [`LiveWrite::publish`] then reports the commit.
    pub async fn begin_write(&self) -> LiveWrite<'_, S> {
        LiveWrite {
            source: &self.source,
            listeners: self.listeners.lock().await,
        }
    }

    /// Follow `query`. The first emission is the result set as of
    /// registration; every later commit that changes it emits again.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch(&self, query: QueryKind) -> LiveQuery {
        let (tx, rx) = mpsc::unbounded_channel();
        let live = self.clone();
        let task = tokio::spawn(async move {
            // Holding the write lock keeps commits from slipping between the
            // initial evaluation and registration.
            let mut listeners = live.listeners.lock().await;
            let mut listener = Listener {
                query,
                tx,
                last: None,
            };
            listener.offer(live.source.evaluate(query).await);
            listeners.push(listener);
            tracing::debug!(feed = query.as_str(), "Live query started");
        });
        LiveQuery { rx, task }
    }
}

/// An in-progress write. Dropping it without [`LiveWrite::publish`] releases
/// the lock without notifying anyone, which is what failed and no-op writes
/// do.
pub struct LiveWrite<'a, S> {
    source: &'a S,
    listeners: MutexGuard<'a, Vec<Listener>>,
}

impl<S: QuerySource> LiveWrite<'_, S> {
    /// Re-evaluate every live query against the state this write committed,
    /// then release the lock.
    pub async fn publish(mut self) {
        self.listeners.retain(|l| !l.tx.is_closed());
        for listener in self.listeners.iter_mut() {
            let item = self.source.evaluate(listener.query).await;
            listener.offer(item);
        }
    }
}

/// A continuously re-evaluated query result.
///
/// Yields the current result set first, then one result set per committed
/// write that changed it. Evaluation failures are yielded as `Err` and the
/// query keeps running. Dropping the `LiveQuery` unregisters it.
pub struct LiveQuery {
    rx: mpsc::UnboundedReceiver<FeedItem>,
    task: JoinHandle<()>,
}

impl LiveQuery {
    /// Wait for the next emission. `None` once the storage engine is gone.
    pub async fn recv(&mut self) -> Option<FeedItem> {
        self.rx.recv().await
    }
}

impl Stream for LiveQuery {
    type Item = FeedItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        // Only matters if registration has not finished yet.
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    /// `count` puzzles, ids 1..=count; every odd id is solved.
    #[derive(Default)]
    struct CountingSource {
        count: AtomicU32,
        failing: AtomicBool,
    }

    impl QuerySource for CountingSource {
        async fn evaluate(&self, query: QueryKind) -> FeedItem {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PersistenceError::InvalidRow("boom".into()));
            }
            let n = self.count.load(Ordering::SeqCst);
            Ok((1..=n)
                .map(|i| Puzzle::new(format!("p{i}")).with_id(i64::from(i)))
                .map(|p| if p.id % 2 == 1 { p.solved_with(1) } else { p })
                .filter(|p| query == QueryKind::All || p.solved)
                .collect())
        }
    }

    async fn write(live: &LiveQueries<CountingSource>, count: u32) {
        let commit = live.begin_write().await;
        live.source().count.store(count, Ordering::SeqCst);
        commit.publish().await;
    }

    fn lens(items: Vec<FeedItem>) -> Vec<usize> {
        items.into_iter().map(|i| i.unwrap().len()).collect()
    }

    async fn drain(q: &mut LiveQuery) -> Vec<FeedItem> {
        let mut items = Vec::new();
        while let Ok(Some(item)) = tokio::time::timeout(Duration::from_millis(50), q.recv()).await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn emits_initial_result() {
        let live = LiveQueries::new(CountingSource::default());
        live.source().count.store(2, Ordering::SeqCst);
        let mut q = live.watch(QueryKind::All);
        assert_eq!(q.next().await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn back_to_back_writes_emit_separately() {
        let live = LiveQueries::new(CountingSource::default());
        let mut q = live.watch(QueryKind::All);
        assert!(q.recv().await.unwrap().unwrap().is_empty());

        write(&live, 1).await;
        write(&live, 2).await;
        assert_eq!(lens(drain(&mut q).await), vec![1, 2]);
    }

    #[tokio::test]
    async fn unchanged_results_are_not_re_emitted() {
        let live = LiveQueries::new(CountingSource::default());
        let mut ranking = live.watch(QueryKind::Ranking);
        assert!(ranking.recv().await.unwrap().unwrap().is_empty());

        // Id 2 is unsolved, so only the first and third writes change the ranking.
        write(&live, 1).await;
        write(&live, 2).await;
        write(&live, 3).await;
        assert_eq!(lens(drain(&mut ranking).await), vec![1, 2]);
    }

    #[tokio::test]
    async fn unpublished_write_emits_nothing() {
        let live = LiveQueries::new(CountingSource::default());
        let mut q = live.watch(QueryKind::All);
        q.recv().await.unwrap().unwrap();

        {
            let _abandoned = live.begin_write().await;
            live.source().count.store(5, Ordering::SeqCst);
        }
        assert!(drain(&mut q).await.is_empty());
    }

    #[tokio::test]
    async fn errors_are_forwarded_and_query_keeps_running() {
        let live = LiveQueries::new(CountingSource::default());
        live.source().failing.store(true, Ordering::SeqCst);
        let mut q = live.watch(QueryKind::All);
        assert!(q.recv().await.unwrap().is_err());

        live.source().failing.store(false, Ordering::SeqCst);
        write(&live, 1).await;
        assert_eq!(q.recv().await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_queries_are_unregistered() {
        let live = LiveQueries::new(CountingSource::default());
        let mut q = live.watch(QueryKind::All);
        q.recv().await.unwrap().unwrap();
        drop(q);

        write(&live, 1).await;
        assert!(live.listeners.lock().await.is_empty());
    }

    #[tokio::test]
    async fn ends_when_engine_is_dropped() {
        let live = LiveQueries::new(CountingSource::default());
        let mut q = live.watch(QueryKind::All);
        q.recv().await.unwrap().unwrap();
        drop(live);
        assert!(q.recv().await.is_none());
    }
}
