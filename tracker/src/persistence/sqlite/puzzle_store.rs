//! SQLite storage engine for puzzles.

use puzzle::{Puzzle, PuzzleId};
use sqlx::SqlitePool;

use super::helpers::{decode_row, encode_time_limit, PuzzleRow, PUZZLE_COLUMNS};
use crate::persistence::live::{FeedItem, LiveQueries, LiveQuery, QueryKind, QuerySource};
use crate::persistence::traits::PuzzleRepository;
use crate::persistence::PersistenceError;

/// Runs the two live queries against the pool.
struct PuzzleQueries {
    pool: SqlitePool,
}

impl QuerySource for PuzzleQueries {
    async fn evaluate(&self, query: QueryKind) -> FeedItem {
        match query {
            QueryKind::All => fetch_all(&self.pool).await,
            QueryKind::Ranking => fetch_ranking(&self.pool).await,
        }
    }
}

/// SQLite implementation of the puzzle storage engine.
///
/// Every mutation runs under the live-query write lock, so writes are
/// serialized and each commit is reported to the live queries on its own.
pub struct SqlitePuzzleStore {
    pool: SqlitePool,
    live: LiveQueries<PuzzleQueries>,
}

impl SqlitePuzzleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            live: LiveQueries::new(PuzzleQueries { pool: pool.clone() }),
            pool,
        }
    }

    /// Insert-or-replace. A sentinel id lets SQLite assign the next id;
    /// any other id replaces the row sharing it.
    pub async fn insert(&self, puzzle: &Puzzle) -> Result<PuzzleId, PersistenceError> {
        let puzzle = puzzle.normalized();
        let commit = self.live.begin_write().await;

        let id = if puzzle.is_new() {
            sqlx::query(
                r#"
                INSERT INTO puzzle
                    (title, hint1, hint2, hint3, time_limit_sec, solved, attempts)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&puzzle.title)
            .bind(&puzzle.hint1)
            .bind(&puzzle.hint2)
            .bind(&puzzle.hint3)
            .bind(encode_time_limit(&puzzle))
            .bind(puzzle.solved)
            .bind(i64::from(puzzle.attempts))
            .execute(&self.pool)
            .await?
            .last_insert_rowid()
        } else {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO puzzle
                    (id, title, hint1, hint2, hint3, time_limit_sec, solved, attempts)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(puzzle.id)
            .bind(&puzzle.title)
            .bind(&puzzle.hint1)
            .bind(&puzzle.hint2)
            .bind(&puzzle.hint3)
            .bind(encode_time_limit(&puzzle))
            .bind(puzzle.solved)
            .bind(i64::from(puzzle.attempts))
            .execute(&self.pool)
            .await?;
            puzzle.id
        };

        tracing::debug!(id, "Inserted puzzle");
        commit.publish().await;
        Ok(id)
    }

    /// Replace the row with the same id. Matching nothing is not an error.
    pub async fn update(&self, puzzle: &Puzzle) -> Result<(), PersistenceError> {
        let puzzle = puzzle.normalized();
        let commit = self.live.begin_write().await;

        let result = sqlx::query(
            r#"
            UPDATE puzzle
            SET title = ?, hint1 = ?, hint2 = ?, hint3 = ?,
                time_limit_sec = ?, solved = ?, attempts = ?
            WHERE id = ?
            "#,
        )
        .bind(&puzzle.title)
        .bind(&puzzle.hint1)
        .bind(&puzzle.hint2)
        .bind(&puzzle.hint3)
        .bind(encode_time_limit(&puzzle))
        .bind(puzzle.solved)
        .bind(i64::from(puzzle.attempts))
        .bind(puzzle.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(id = puzzle.id, "Update matched no puzzle");
        } else {
            commit.publish().await;
        }
        Ok(())
    }

    pub async fn delete(&self, puzzle: &Puzzle) -> Result<(), PersistenceError> {
        let commit = self.live.begin_write().await;

        let result = sqlx::query("DELETE FROM puzzle WHERE id = ?")
            .bind(puzzle.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::debug!(id = puzzle.id, "Deleted puzzle");
            commit.publish().await;
        }
        Ok(())
    }

    pub async fn find(&self, id: PuzzleId) -> Result<Option<Puzzle>, PersistenceError> {
        let row: Option<PuzzleRow> = sqlx::query_as(&format!(
            "SELECT {PUZZLE_COLUMNS} FROM puzzle WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_row).transpose()
    }

    /// Live feed of every puzzle, newest id first.
    pub fn query_all(&self) -> LiveQuery {
        self.live.watch(QueryKind::All)
    }

    /// Live feed of solved puzzles in leaderboard order.
    pub fn query_ranking(&self) -> LiveQuery {
        self.live.watch(QueryKind::Ranking)
    }
}

async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Puzzle>, PersistenceError> {
    let rows: Vec<PuzzleRow> = sqlx::query_as(&format!(
        "SELECT {PUZZLE_COLUMNS} FROM puzzle ORDER BY id DESC"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_row).collect()
}

/// An absent time limit orders as 0; `id` makes full ties deterministic.
async fn fetch_ranking(pool: &SqlitePool) -> Result<Vec<Puzzle>, PersistenceError> {
    let rows: Vec<PuzzleRow> = sqlx::query_as(&format!(
        r#"
        SELECT {PUZZLE_COLUMNS}
        FROM puzzle
        WHERE solved = 1
        ORDER BY COALESCE(time_limit_sec, 0) ASC, attempts ASC, id ASC
        "#
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_row).collect()
}

impl PuzzleRepository for SqlitePuzzleStore {
    async fn insert(&self, puzzle: &Puzzle) -> Result<PuzzleId, PersistenceError> {
        SqlitePuzzleStore::insert(self, puzzle).await
    }

    async fn update(&self, puzzle: &Puzzle) -> Result<(), PersistenceError> {
        SqlitePuzzleStore::update(self, puzzle).await
    }

    async fn delete(&self, puzzle: &Puzzle) -> Result<(), PersistenceError> {
        SqlitePuzzleStore::delete(self, puzzle).await
    }

    async fn find(&self, id: PuzzleId) -> Result<Option<Puzzle>, PersistenceError> {
        SqlitePuzzleStore::find(self, id).await
    }

    fn query_all(&self) -> LiveQuery {
        SqlitePuzzleStore::query_all(self)
    }

    fn query_ranking(&self) -> LiveQuery {
        SqlitePuzzleStore::query_ranking(self)
    }
}
