//! Per-table sync cursors
//!
//! A [`SyncCursor`] is the watermark for one mirrored table: the
//! `updated_at` of the last remote row that was durably committed locally.
//! Cursors are persisted by the store so they survive process restarts and
//! are mutated only by the sync orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The Unix epoch, used as the cursor value before any successful sync
/// and after a forced full resync.
pub fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Lifecycle state of a cursor, as last recorded by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorStatus {
    /// No sync is touching this table.
    Idle,
    /// A sync run is currently processing this table.
    Syncing,
    /// The last sync attempt for this table failed.
    Error,
}

impl CursorStatus {
    /// Stable string form used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorStatus::Idle => "idle",
            CursorStatus::Syncing => "syncing",
            CursorStatus::Error => "error",
        }
    }

    /// Parses the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(CursorStatus::Idle),
            "syncing" => Some(CursorStatus::Syncing),
            "error" => Some(CursorStatus::Error),
            _ => None,
        }
    }
}

/// Watermark for one synchronized table.
///
/// Invariant: `last_synced_at` is monotonically non-decreasing for a given
/// table. The only sanctioned regression is an explicit reset to the epoch
/// for a forced full resync, which goes through [`SyncCursor::reset`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Registry name of the table this cursor tracks.
    pub table_name: String,
    /// `updated_at` of the last durably committed remote row.
    pub last_synced_at: DateTime<Utc>,
    /// Last recorded lifecycle state.
    pub status: CursorStatus,
}

impl SyncCursor {
    /// Creates a fresh cursor at the epoch, as used on a table's first sync.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            last_synced_at: epoch(),
            status: CursorStatus::Idle,
        }
    }

    /// Advances the watermark, ignoring regressions.
    ///
    /// Remote pages are fetched in `updated_at` ascending order, so a
    /// regression here would indicate a misbehaving remote; it is dropped
    /// rather than allowed to move the watermark backwards.
    pub fn advance(&mut self, ts: DateTime<Utc>) {
        if ts > self.last_synced_at {
            self.last_synced_at = ts;
        }
    }

    /// Resets the watermark to the epoch for a forced full resync.
    pub fn reset(&mut self) {
        self.last_synced_at = epoch();
        self.status = CursorStatus::Idle;
    }
}
