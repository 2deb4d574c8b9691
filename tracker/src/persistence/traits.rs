//! Repository contract between the state aggregator and a storage engine.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send`, which the aggregator's spawned writer
//! task requires.

use std::future::Future;

use puzzle::{Puzzle, PuzzleId};

use super::{LiveQuery, PersistenceError};

/// Pass-through façade over a puzzle storage engine.
///
/// Implementations forward each call to the engine unchanged: no caching,
/// no extra validation. A missing id is never an error for `update` or
/// `delete`.
pub trait PuzzleRepository: Send + Sync {
    /// Insert-or-replace. A record carrying the sentinel id gets a fresh id;
    /// the id actually stored is returned.
    fn insert(
        &self,
        puzzle: &Puzzle,
    ) -> impl Future<Output = Result<PuzzleId, PersistenceError>> + Send;
    fn update(&self, puzzle: &Puzzle) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    fn delete(&self, puzzle: &Puzzle) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    fn find(
        &self,
        id: PuzzleId,
    ) -> impl Future<Output = Result<Option<Puzzle>, PersistenceError>> + Send;
    /// Every puzzle, newest id first.
    fn query_all(&self) -> LiveQuery;
    /// Solved puzzles in leaderboard order.
    fn query_ranking(&self) -> LiveQuery;
}
