use std::collections::BTreeMap;

use puzzle::{list_all, rank, Puzzle, PuzzleId};
use tokio::sync::RwLock;

use super::live::{FeedItem, LiveQueries, LiveQuery, QueryKind, QuerySource};
use super::traits::PuzzleRepository;
use super::PersistenceError;

#[derive(Debug)]
struct Table {
    rows: BTreeMap<PuzzleId, Puzzle>,
    /// Next id handed out to a sentinel insert. Only ever grows.
    next_id: PuzzleId,
}

/// Reads the in-process table for live queries.
struct TableQueries {
    table: RwLock<Table>,
}

impl QuerySource for TableQueries {
    async fn evaluate(&self, query: QueryKind) -> FeedItem {
        let table = self.table.read().await;
        Ok(match query {
            QueryKind::All => list_all(table.rows.values()),
            QueryKind::Ranking => rank(table.rows.values()),
        })
    }
}

/// In-process puzzle storage engine.
///
/// Same contract as [`super::SqlitePuzzleStore`]: fresh ids start at 1 and
/// are never reused, and update/delete of a missing id is a no-op. Nothing
/// survives the process.
pub struct MemoryPuzzleStore {
    live: LiveQueries<TableQueries>,
}

impl Default for MemoryPuzzleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPuzzleStore {
    pub fn new() -> Self {
        Self {
            live: LiveQueries::new(TableQueries {
                table: RwLock::new(Table {
                    rows: BTreeMap::new(),
                    next_id: 1,
                }),
            }),
        }
    }

    fn table(&self) -> &RwLock<Table> {
        &self.live.source().table
    }

    /// Insert-or-replace. Returns the id the record was stored under.
    pub async fn insert(&self, puzzle: &Puzzle) -> Result<PuzzleId, PersistenceError> {
        let mut puzzle = puzzle.normalized();
        let commit = self.live.begin_write().await;
        let id = {
            let mut table = self.table().write().await;
            if puzzle.is_new() {
                puzzle.id = table.next_id;
            }
            table.next_id = table.next_id.max(puzzle.id + 1);
            let id = puzzle.id;
            table.rows.insert(id, puzzle);
            id
        };
        commit.publish().await;
        Ok(id)
    }

    /// Replace the row with the same id, if there is one.
    pub async fn update(&self, puzzle: &Puzzle) -> Result<(), PersistenceError> {
        let commit = self.live.begin_write().await;
        let replaced = {
            let mut table = self.table().write().await;
            match table.rows.get_mut(&puzzle.id) {
                Some(row) => {
                    *row = puzzle.normalized();
                    true
                }
                None => false,
            }
        };
        if replaced {
            commit.publish().await;
        } else {
            tracing::debug!(id = puzzle.id, "Update matched no puzzle");
        }
        Ok(())
    }

    pub async fn delete(&self, puzzle: &Puzzle) -> Result<(), PersistenceError> {
        let commit = self.live.begin_write().await;
        let removed = self.table().write().await.rows.remove(&puzzle.id).is_some();
        if removed {
            commit.publish().await;
        }
        Ok(())
    }

    pub async fn find(&self, id: PuzzleId) -> Result<Option<Puzzle>, PersistenceError> {
        Ok(self.table().read().await.rows.get(&id).cloned())
    }

    pub fn query_all(&self) -> LiveQuery {
        self.live.watch(QueryKind::All)
    }

    pub fn query_ranking(&self) -> LiveQuery {
        self.live.watch(QueryKind::Ranking)
    }
}

impl PuzzleRepository for MemoryPuzzleStore {
    async fn insert(&self, puzzle: &Puzzle) -> Result<PuzzleId, PersistenceError> {
        MemoryPuzzleStore::insert(self, puzzle).await
    }

    async fn update(&self, puzzle: &Puzzle) -> Result<(), PersistenceError> {
        MemoryPuzzleStore::update(self, puzzle).await
    }

    async fn delete(&self, puzzle: &Puzzle) -> Result<(), PersistenceError> {
        MemoryPuzzleStore::delete(self, puzzle).await
    }

    async fn find(&self, id: PuzzleId) -> Result<Option<Puzzle>, PersistenceError> {
        MemoryPuzzleStore::find(self, id).await
    }

    fn query_all(&self) -> LiveQuery {
        MemoryPuzzleStore::query_all(self)
    }

    fn query_ranking(&self) -> LiveQuery {
        MemoryPuzzleStore::query_ranking(self)
    }
}
