//! Shelfsync Store - Local state persistence
//!
//! SQLite-based local store for:
//! - Mirrored entity rows (books, chapters, ...)
//! - Per-table sync cursors
//! - Schema migrations
//!
//! ## Architecture
//!
//! This crate is the sole owner of the embedded database handle. The sync
//! orchestrator never issues raw SQL; it calls the typed operations on
//! [`StoreManager`], which keeps row upserts and cursor advances inside a
//! single transaction so a crash can never advance a cursor past data that
//! was not written.
//!
//! ## Key Components
//!
//! - [`StorePool`] - Connection pool with WAL journal mode and pragmas
//! - [`StoreManager`] - Lifecycle (initialize/migrate), cursor repository,
//!   transactional batch apply
//! - [`Migration`] - Versioned SQL migrations applied in order

pub mod manager;
pub mod migrations;
pub mod pool;

pub use manager::{InitProgress, InitStage, ProgressCallback, StoreManager};
pub use migrations::Migration;
pub use pool::StorePool;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to open or create the database file
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A persisted value could not be converted to its domain type
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store was used before `initialize` succeeded
    #[error("Store is not initialized")]
    NotInitialized,
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
