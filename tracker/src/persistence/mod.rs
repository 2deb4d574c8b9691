//! Storage engines, live queries and the repository contract.
//!
//! Two engines implement [`PuzzleRepository`]:
//!
//! | Engine | Backing |
//! |--------|---------|
//! | [`SqlitePuzzleStore`] | `puzzle` table in a SQLite database (production) |
//! | [`MemoryPuzzleStore`] | in-process table (ephemeral sessions, test doubles) |
//!
//! Both normalize hints before writing and serialize their writes. Each
//! committed write re-evaluates every open [`LiveQuery`] before the next
//! write starts, so consecutive writes emit separately.

mod live;
mod memory_store;
pub mod sqlite;
pub mod traits;

pub use live::{FeedItem, LiveQuery, QueryKind};
pub use memory_store::MemoryPuzzleStore;
pub use sqlite::{Database, SqlitePuzzleStore};
pub use traits::PuzzleRepository;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Invalid row: {0}")]
    InvalidRow(String),
}
