//! Pool setup and schema migration for the puzzle database.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::persistence::PersistenceError;

const FILE_POOL_SIZE: u32 = 5;

/// A migrated SQLite pool. Cloning shares the pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the puzzle database at `path`, creating the file and its parent
    /// directories when missing. The schema is brought up to date before
    /// this returns.
    pub async fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        let pool_options = SqlitePoolOptions::new().max_connections(FILE_POOL_SIZE);

        let db = Self::connect(options, pool_options).await?;
        tracing::info!(path = %path.display(), "Opened puzzle database");
        Ok(db)
    }

    /// In-memory database with the schema applied.
    ///
    /// Pinned to one connection that never expires; a second connection
    /// would see a different, empty database.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(sqlx::Error::from)?
            .journal_mode(SqliteJournalMode::Wal);
        let pool_options = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);

        Self::connect(options, pool_options).await
    }

    async fn connect(
        options: SqliteConnectOptions,
        pool_options: SqlitePoolOptions,
    ) -> Result<Self, PersistenceError> {
        let pool = pool_options.connect_with(options).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| PersistenceError::Migration(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection, waiting for checked-out ones.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
