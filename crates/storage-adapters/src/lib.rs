//! # storage-adapters
//!
//! Persistence adapters for the report desk ports. SQLite is the only backend;
//! it sits behind the `db-sqlite` feature so another can be added beside it.

use thiserror::Error;

#[cfg(feature = "db-sqlite")]
pub mod sqlite;

#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteStore;

/// Failures while opening or migrating a store. Errors from individual port
/// operations are reported as `domains::AppError` instead.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("could not create database directory {}: {source}", path.display())]
    CreateDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "db-sqlite")]
    #[error("could not open database: {0}")]
    Connect(#[source] sqlx::Error),

    #[cfg(feature = "db-sqlite")]
    #[error("migration v{version} ({name}) failed: {source}")]
    Migration {
        version: i64,
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },
}
