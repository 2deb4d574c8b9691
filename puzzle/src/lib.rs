//! Domain types for the puzzle tracker.
//!
//! This crate owns the puzzle record, the rules applied to it before it is
//! persisted, and the two orderings every storage backend must reproduce.
//! It performs no I/O.

pub mod ranking;
pub mod record;

pub use ranking::{list_all, listing_order, rank, ranking_order};
pub use record::{Puzzle, PuzzleId, ValidationError, NEW_PUZZLE_ID};
