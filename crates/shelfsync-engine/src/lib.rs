//! Shelfsync Engine - Incremental sync orchestration
//!
//! Provides:
//! - Cursor-based incremental mirroring of remote tables into the local store
//! - Partial-failure isolation across independently syncable tables
//! - Single retry after an auth refresh signal for auth-class remote errors
//! - A background scheduler that probes before syncing
//!
//! ## Modules
//!
//! - [`orchestrator`] - Per-table sync runs, cursors, listeners
//! - [`scheduler`] - Background task wiring and the periodic run loop
//! - [`runtime`] - In-process implementation of the background runtime port

pub mod orchestrator;
pub mod runtime;
pub mod scheduler;

pub use orchestrator::{ListenerHandle, SyncMode, SyncOrchestrator};
pub use runtime::InProcessRuntime;
pub use scheduler::{BackgroundScheduler, MIN_BACKGROUND_INTERVAL};

use thiserror::Error;

use shelfsync_core::domain::DomainError;
use shelfsync_core::ports::RemoteError;
use shelfsync_store::StoreError;

/// Process-level errors for sync operations.
///
/// Per-table failures never surface here; they are recorded in the table's
/// report so one table's failure cannot block another table's sync. These
/// variants abort an operation before any table is touched.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local store has not been initialized yet
    #[error("Local store is not ready")]
    StoreNotReady,

    /// Another sync run is in flight; the request is rejected, not queued
    #[error("Sync already in progress")]
    SyncInProgress,

    /// A domain-level rejection (e.g. unknown table name)
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A store operation outside the per-table sync path failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A remote probe failed
    #[error("Remote probe failed: {0}")]
    Remote(#[from] RemoteError),
}
