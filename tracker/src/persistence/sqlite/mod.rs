//! SQLite-backed storage engine.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**: one writer and multiple concurrent readers, so live queries
//!   can re-evaluate while a write is in flight.
//! - **Embedded migrations**: `sqlx::migrate!` runs `migrations/001_create_puzzle.sql`
//!   when [`Database::open`] is called. The schema is idempotent.
//!
//! ## Storage engine
//!
//! [`SqlitePuzzleStore`] holds a pool clone and its live-query registry. The
//! registry's lock serializes every mutation, and each commit re-runs the
//! open live queries before the lock is released.
//! Row decoding lives in [`helpers`].

mod database;
pub(crate) mod helpers;
mod puzzle_store;

pub use database::Database;
pub use puzzle_store::SqlitePuzzleStore;
