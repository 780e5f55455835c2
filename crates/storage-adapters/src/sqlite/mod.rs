//! # SQLite store
//!
//! One pool, four repository ports. Every port operation is a single statement
//! (or a single transaction), so concurrent events never interleave inside a
//! record's read-modify-write.

mod blocks;
mod liveboards;
pub mod migrations;
mod reports;
mod settings;

use std::str::FromStr;
use std::time::Duration;

use domains::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::StorageError;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `url` and applies any
    /// pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // Ensure directory exists
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|source| StorageError::CreateDir { path: parent.to_path_buf(), source })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .min_connections(1)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        info!(url, "SQLite store opened");
        Self::from_pool(pool).await
    }

    /// A private in-memory database. The pool is pinned to one connection
    /// that never expires, otherwise each connection would see its own
    /// empty database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(StorageError::Connect)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        debug!("in-memory SQLite store opened");
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        migrations::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Get the underlying pool for direct queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Maps driver failures onto the port error type.
pub(crate) fn internal(err: sqlx::Error) -> AppError {
    AppError::Internal(format!("database: {err}"))
}
