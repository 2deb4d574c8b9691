//! Puzzle tracker.
//!
//! Stores puzzle records, keeps two live views over them (every record, and
//! the solved-puzzle leaderboard) and merges both into one observable state.
//!
//! ## Layers
//!
//! - [`persistence`]: the storage engines ([`persistence::SqlitePuzzleStore`],
//!   [`persistence::MemoryPuzzleStore`]) behind the
//!   [`persistence::PuzzleRepository`] trait, including live queries that
//!   re-emit whenever a write changes their result.
//! - [`aggregator`]: an actor that owns the combined [`PuzzleState`], starts
//!   the live queries on demand, and applies writes in the order they were
//!   issued.
//! - [`config`] and [`telemetry`]: environment-driven settings and tracing
//!   setup for embedding applications.
//!
//! [`PuzzleTracker::open`] wires all of it together over a SQLite file.

pub mod aggregator;
pub mod config;
pub mod persistence;
pub mod telemetry;

use std::sync::Arc;

pub use aggregator::{
    spawn_aggregator, AggregatorConfig, AggregatorError, AggregatorHandle, PuzzleState,
    StateEvent, Subscription, WriteOutcome, WriteTicket,
};
pub use config::TrackerConfig;
pub use persistence::PersistenceError;
pub use puzzle::{Puzzle, PuzzleId, ValidationError, NEW_PUZZLE_ID};

use persistence::{Database, SqlitePuzzleStore};

/// A running tracker: the database plus the aggregator over it.
pub struct PuzzleTracker {
    database: Database,
    handle: AggregatorHandle,
}

impl PuzzleTracker {
    /// Open the database at `config.database_path`, run migrations and spawn
    /// the aggregator. Must be called from within a tokio runtime.
    pub async fn open(config: &TrackerConfig) -> Result<Self, PersistenceError> {
        let database = Database::open(&config.database_path).await?;
        let store = Arc::new(SqlitePuzzleStore::new(database.pool().clone()));
        let handle = spawn_aggregator(store, config.aggregator.clone());

        tracing::info!(
            path = %config.database_path.display(),
            "Puzzle tracker ready"
        );
        Ok(Self { database, handle })
    }

    pub fn handle(&self) -> AggregatorHandle {
        self.handle.clone()
    }

    /// Stop the aggregator and close the database.
    pub async fn close(self) {
        self.handle.shutdown().await;
        self.database.close().await;
        tracing::info!("Puzzle tracker closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn open_add_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::with_database(dir.path().join("nested").join("puzzles.db"));

        let tracker = PuzzleTracker::open(&config).await.unwrap();
        let handle = tracker.handle();
        let mut sub = handle.subscribe().await.unwrap();
        handle
            .add_puzzle(Puzzle::new("Door").with_time_limit(300))
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        let state = timeout(
            Duration::from_secs(5),
            sub.wait_for(|s| s.all_puzzles.len() == 1),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(state.all_puzzles[0].title, "Door");
        drop(sub);
        tracker.close().await;

        let tracker = PuzzleTracker::open(&config).await.unwrap();
        let found = tracker.handle().find_puzzle(1).await.unwrap();
        assert_eq!(found.map(|p| p.title), Some("Door".to_string()));
        tracker.close().await;
    }

    #[tokio::test]
    async fn close_keeps_writes_that_were_never_awaited() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::with_database(dir.path().join("puzzles.db"));

        let tracker = PuzzleTracker::open(&config).await.unwrap();
        let handle = tracker.handle();
        for i in 0..50 {
            let _ticket = handle
                .add_puzzle(Puzzle::new(format!("p{i}")))
                .await
                .unwrap();
        }
        tracker.close().await;

        let tracker = PuzzleTracker::open(&config).await.unwrap();
        let handle = tracker.handle();
        for id in 1..=50 {
            let found = handle.find_puzzle(id).await.unwrap();
            assert!(found.is_some(), "puzzle {id} was not stored");
        }
        tracker.close().await;
    }
}
