use std::sync::Arc;

use puzzle::Puzzle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::Instrument;

use super::commands::*;
use super::events::{Feed, StateEvent};
use super::handle::Subscription;
use super::snapshot::PuzzleState;
use crate::persistence::{FeedItem, LiveQuery, PuzzleRepository};

/// The two live queries the state is built from.
struct Feeds {
    all: LiveQuery,
    ranking: LiveQuery,
    /// Set until both freshly started feeds have reported once.
    priming: Option<Priming>,
}

impl Feeds {
    fn start<R: PuzzleRepository>(repo: &R) -> Self {
        Self {
            all: repo.query_all(),
            ranking: repo.query_ranking(),
            priming: Some(Priming::default()),
        }
    }

    /// Fold one emission into `current`. `None` while still priming.
    fn accept(
        &mut self,
        feed: Feed,
        rows: Vec<Puzzle>,
        current: &PuzzleState,
    ) -> Option<PuzzleState> {
        let Some(priming) = self.priming.as_mut() else {
            return Some(match feed {
                Feed::All => PuzzleState::combine(rows, current.ranking.clone()),
                Feed::Ranking => PuzzleState::combine(current.all_puzzles.clone(), rows),
            });
        };
        let (all, ranking) = priming.offer(feed, rows)?;
        self.priming = None;
        Some(PuzzleState::combine(all, ranking))
    }
}

/// First results of restarted feeds. A state retained from before a
/// teardown is never mixed with a fresh result from only one feed.
#[derive(Debug, Default)]
struct Priming {
    all: Option<Vec<Puzzle>>,
    ranking: Option<Vec<Puzzle>>,
}

impl Priming {
    /// Record a feed's latest result; both once each feed has reported.
    fn offer(&mut self, feed: Feed, rows: Vec<Puzzle>) -> Option<(Vec<Puzzle>, Vec<Puzzle>)> {
        match feed {
            Feed::All => self.all = Some(rows),
            Feed::Ranking => self.ranking = Some(rows),
        }
        if self.all.is_some() && self.ranking.is_some() {
            Some((self.all.take()?, self.ranking.take()?))
        } else {
            None
        }
    }
}

/// The actor's end of the writer task: its job queue and its join handle.
pub(crate) struct WriterLink {
    pub(crate) jobs: mpsc::UnboundedSender<WriterJob>,
    pub(crate) task: JoinHandle<()>,
}

/// Everything the actor owns besides its channels.
struct AggregatorState {
    current: PuzzleState,
    feeds: Option<Feeds>,
    /// Set while the feeds are running with no subscriber attached.
    idle_deadline: Option<Instant>,
    grace_period: Duration,
}

/// The main aggregator loop.
/// Owns the published state. Processes commands and feed emissions sequentially;
/// storage writes are handed to the writer task so the loop never waits on I/O.
pub(crate) async fn run_aggregator<R: PuzzleRepository>(
    repo: Arc<R>,
    grace_period: Duration,
    cmd_rx: mpsc::Receiver<AggregatorCommand>,
    state_tx: watch::Sender<PuzzleState>,
    event_tx: broadcast::Sender<StateEvent>,
    writer: WriterLink,
) {
    run_aggregator_inner(repo, grace_period, cmd_rx, state_tx, event_tx, writer)
        .instrument(tracing::info_span!("aggregator"))
        .await;
}

async fn run_aggregator_inner<R: PuzzleRepository>(
    repo: Arc<R>,
    grace_period: Duration,
    mut cmd_rx: mpsc::Receiver<AggregatorCommand>,
    state_tx: watch::Sender<PuzzleState>,
    event_tx: broadcast::Sender<StateEvent>,
    writer: WriterLink,
) {
    let WriterLink {
        jobs: write_tx,
        task: writer_task,
    } = writer;
    tracing::info!(grace_ms = grace_period.as_millis() as u64, "Aggregator started");

    let mut state = AggregatorState {
        current: PuzzleState::default(),
        feeds: None,
        idle_deadline: None,
        grace_period,
    };
    let mut shutdown_reply: Option<oneshot::Sender<()>> = None;

    loop {
        let feeds_running = state.feeds.is_some();
        let idle = state.idle_deadline.is_some();

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    tracing::info!("All handles dropped; aggregator shutting down");
                    break;
                };
                let shutdown =
                    handle_command(&mut state, repo.as_ref(), cmd, &state_tx, &event_tx, &write_tx);
                if let Some(reply) = shutdown {
                    tracing::info!("Aggregator shutting down");
                    shutdown_reply = Some(reply);
                    break;
                }
            }

            (feed, item) = next_feed_item(&mut state.feeds) => {
                handle_feed_item(&mut state, feed, item, &state_tx, &event_tx);
            }

            _ = state_tx.closed(), if feeds_running && !idle => {
                tracing::debug!(
                    grace_ms = state.grace_period.as_millis() as u64,
                    "Last subscriber left; keeping live queries for the grace period"
                );
                state.idle_deadline = Some(Instant::now() + state.grace_period);
            }

            _ = idle_elapsed(state.idle_deadline) => {
                state.idle_deadline = None;
                if state_tx.receiver_count() == 0 {
                    tracing::info!("Grace period elapsed; stopping live queries");
                    state.feeds = None;
                }
            }
        }
    }

    // Closing the queue lets the writer finish what is already in it.
    drop(state);
    drop(write_tx);
    if let Err(e) = writer_task.await {
        tracing::error!("Writer task failed: {}", e);
    }
    if let Some(reply) = shutdown_reply {
        let _ = reply.send(());
    }
    tracing::info!("Aggregator exited");
}

fn handle_command<R: PuzzleRepository>(
    state: &mut AggregatorState,
    repo: &R,
    cmd: AggregatorCommand,
    state_tx: &watch::Sender<PuzzleState>,
    event_tx: &broadcast::Sender<StateEvent>,
    write_tx: &mpsc::UnboundedSender<WriterJob>,
) -> Option<oneshot::Sender<()>> {
    match cmd {
        AggregatorCommand::Write { op, reply } => {
            tracing::debug!(kind = ?op.kind(), id = op.puzzle().id, "Queueing write");
            queue(write_tx, WriterJob::Apply { op, reply });
        }
        AggregatorCommand::Find { id, reply } => {
            queue(write_tx, WriterJob::Find { id, reply });
        }
        AggregatorCommand::Subscribe { reply } => {
            if state.feeds.is_none() {
                tracing::info!("Starting live queries");
                state.feeds = Some(Feeds::start(repo));
            } else if state.idle_deadline.take().is_some() {
                tracing::debug!("Subscriber returned within the grace period; reusing live queries");
            }
            let subscription = Subscription::new(state_tx.subscribe(), event_tx.subscribe());
            let _ = reply.send(subscription);
        }
        AggregatorCommand::Shutdown { reply } => return Some(reply),
    }
    None
}

fn queue(write_tx: &mpsc::UnboundedSender<WriterJob>, job: WriterJob) {
    if let Err(mpsc::error::SendError(job)) = write_tx.send(job) {
        job.fail(AggregatorError::Internal("Writer closed".into()));
    }
}

fn handle_feed_item(
    state: &mut AggregatorState,
    feed: Feed,
    item: Option<FeedItem>,
    state_tx: &watch::Sender<PuzzleState>,
    event_tx: &broadcast::Sender<StateEvent>,
) {
    match item {
        Some(Ok(rows)) => {
            let Some(feeds) = state.feeds.as_mut() else {
                return;
            };
            let Some(next) = feeds.accept(feed, rows, &state.current) else {
                tracing::debug!(feed = feed.as_str(), "Waiting for the other feed's first result");
                return;
            };
            tracing::debug!(
                feed = feed.as_str(),
                all = next.all_puzzles.len(),
                ranked = next.ranking.len(),
                "Publishing state"
            );
            state.current = next.clone();
            state_tx.send_replace(next);
        }
        Some(Err(e)) => {
            tracing::warn!(feed = feed.as_str(), "Live query failed: {}", e);
            let _ = event_tx.send(StateEvent::FeedFailed {
                feed,
                error: e.into(),
            });
        }
        None => {
            tracing::warn!(feed = feed.as_str(), "Live query ended; storage closed");
            state.feeds = None;
            state.idle_deadline = None;
        }
    }
}

/// Next emission from whichever feed is ready first. Pending while the feeds
/// are stopped.
async fn next_feed_item(feeds: &mut Option<Feeds>) -> (Feed, Option<FeedItem>) {
    match feeds {
        Some(feeds) => tokio::select! {
            item = feeds.all.recv() => (Feed::All, item),
            item = feeds.ranking.recv() => (Feed::Ranking, item),
        },
        None => std::future::pending().await,
    }
}

async fn idle_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(titles: &[&str]) -> Vec<Puzzle> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| Puzzle::new(*t).with_id(i as i64 + 1))
            .collect()
    }

    #[test]
    fn priming_waits_for_both_feeds() {
        let mut priming = Priming::default();
        assert_eq!(priming.offer(Feed::All, rows(&["a"])), None);
        assert_eq!(priming.offer(Feed::All, rows(&["a", "b"])), None);
        let (all, ranking) = priming.offer(Feed::Ranking, rows(&["b"])).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(ranking, rows(&["b"]));
    }

    #[test]
    fn priming_in_either_order() {
        let mut priming = Priming::default();
        assert_eq!(priming.offer(Feed::Ranking, Vec::new()), None);
        assert_eq!(priming.offer(Feed::All, Vec::new()), Some((Vec::new(), Vec::new())));
    }
}
