//! Orderings shared by every storage backend.
//!
//! The SQLite engine expresses these in SQL; the in-memory engine and the
//! tests use the functions here directly.

use std::cmp::Ordering;

use crate::record::Puzzle;

/// Leaderboard order: time limit ascending (absent counts as zero), then
/// attempts ascending, then id ascending.
pub fn ranking_order(a: &Puzzle, b: &Puzzle) -> Ordering {
    a.ranking_time_limit()
        .cmp(&b.ranking_time_limit())
        .then(a.attempts.cmp(&b.attempts))
        .then(a.id.cmp(&b.id))
}

/// Listing order: most recently assigned id first.
pub fn listing_order(a: &Puzzle, b: &Puzzle) -> Ordering {
    b.id.cmp(&a.id)
}

/// Solved puzzles only, in leaderboard order.
pub fn rank<'a, I>(puzzles: I) -> Vec<Puzzle>
where
    I: IntoIterator<Item = &'a Puzzle>,
{
    let mut ranked: Vec<Puzzle> = puzzles.into_iter().filter(|p| p.solved).cloned().collect();
    ranked.sort_by(ranking_order);
    ranked
}

/// Every puzzle, in listing order.
pub fn list_all<'a, I>(puzzles: I) -> Vec<Puzzle>
where
    I: IntoIterator<Item = &'a Puzzle>,
{
    let mut all: Vec<Puzzle> = puzzles.into_iter().cloned().collect();
    all.sort_by(listing_order);
    all
}
