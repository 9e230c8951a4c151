//! Per-table sync reports
//!
//! One [`TableSyncReport`] is produced per table per sync run and delivered
//! to registered listeners. Reports are ephemeral: they are not persisted
//! and are dropped after delivery.

use serde::{Deserialize, Serialize};

/// Outcome of syncing one table during one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSyncReport {
    /// Registry name of the table.
    pub table_name: String,
    /// Whether every page for this table committed.
    pub success: bool,
    /// Number of rows durably upserted during the run. Non-zero on a
    /// failed report when pages committed before the failure.
    pub records_synced: u64,
    /// Error message when `success` is false.
    pub error: Option<String>,
}

impl TableSyncReport {
    /// A successful report for `records_synced` rows.
    pub fn ok(table_name: impl Into<String>, records_synced: u64) -> Self {
        Self {
            table_name: table_name.into(),
            success: true,
            records_synced,
            error: None,
        }
    }

    /// A failed report carrying the error message and the rows that did
    /// commit before the failure.
    pub fn failed(
        table_name: impl Into<String>,
        error: impl Into<String>,
        records_synced: u64,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            success: false,
            records_synced,
            error: Some(error.into()),
        }
    }
}
