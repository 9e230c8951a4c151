//! Incremental sync orchestrator
//!
//! The [`SyncOrchestrator`] mirrors a fixed set of remote tables into the
//! local store, one table at a time, with bounded, auditable failure.
//!
//! ## Sync Flow (per table)
//!
//! 1. Read the table's cursor; a missing cursor means the epoch (full sync)
//! 2. Fetch remote rows with `updated_at > cursor`, ascending, page by page
//! 3. Upsert each page and advance the cursor in one store transaction
//! 4. Record a per-table report and notify listeners
//!
//! ## Failure Policy
//!
//! An auth-class remote error gets exactly one retry after signaling the
//! auth refresher. Any other failure marks the table failed and the run
//! moves on: one table's failure never blocks another table's sync. Only
//! "store not ready" and "sync already in progress" reject the whole run,
//! and both are checked before any table is touched.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use shelfsync_core::config::SyncConfig;
use shelfsync_core::domain::{epoch, CursorStatus, TableDescriptor, TableRegistry, TableSyncReport};
use shelfsync_core::ports::{AuthRefresher, RemoteError, RemoteRow, RemoteSource};
use shelfsync_store::StoreManager;

use crate::SyncError;

/// Which caller is driving the run. Background runs use a smaller page size
/// to bound memory and the time spent inside the OS execution budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Foreground,
    Background,
}

impl SyncMode {
    /// Page size for this mode.
    pub fn batch_size(self, config: &SyncConfig) -> u32 {
        let size = match self {
            SyncMode::Foreground => config.foreground_batch_size,
            SyncMode::Background => config.background_batch_size,
        };
        size.max(1)
    }
}

/// Opaque handle returned by [`SyncOrchestrator::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

type Listener = Arc<dyn Fn(&TableSyncReport) + Send + Sync>;

/// Releases the in-flight slot when a run ends, even on early return.
struct RunSlot<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Mirrors registered remote tables into the local store.
///
/// One instance exists per process, constructed once at startup and shared
/// via `Arc`. At most one sync run is in flight at a time; a second request
/// is rejected immediately rather than queued.
pub struct SyncOrchestrator {
    store: Arc<StoreManager>,
    remote: Arc<dyn RemoteSource>,
    auth: Arc<dyn AuthRefresher>,
    registry: TableRegistry,
    config: SyncConfig,
    in_flight: AtomicBool,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<StoreManager>,
        remote: Arc<dyn RemoteSource>,
        auth: Arc<dyn AuthRefresher>,
        registry: TableRegistry,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            remote,
            auth,
            registry,
            config,
            in_flight: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// The registered tables, in sync order.
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    // ========================================================================
    // Sync runs
    // ========================================================================

    /// Syncs every registered table sequentially.
    ///
    /// Always resolves with one report per table once it starts; per-table
    /// failures are recorded in their reports. Rejects outright only when
    /// the store is not ready or a run is already in flight.
    pub async fn sync_all(&self, mode: SyncMode) -> Result<Vec<TableSyncReport>, SyncError> {
        // Check-and-set before any await so re-entrant callers are rejected
        // deterministically.
        let _slot = self.acquire_run_slot()?;
        if !self.store.is_ready().await {
            return Err(SyncError::StoreNotReady);
        }

        info!(mode = ?mode, tables = self.registry.len(), "Sync run started");

        let mut reports = Vec::with_capacity(self.registry.len());
        for table in self.registry.iter() {
            let report = self.sync_table(table, mode).await;
            self.notify(&report);
            reports.push(report);
        }

        let failed = reports.iter().filter(|r| !r.success).count();
        let records: u64 = reports.iter().map(|r| r.records_synced).sum();
        info!(
            tables = reports.len(),
            failed, records, "Sync run finished"
        );
        Ok(reports)
    }

    /// Syncs a single table incrementally from its current cursor.
    /// Unknown table names are rejected.
    pub async fn sync_one(&self, table_name: &str) -> Result<TableSyncReport, SyncError> {
        let table = self.registry.get(table_name)?.clone();
        let _slot = self.acquire_run_slot()?;
        if !self.store.is_ready().await {
            return Err(SyncError::StoreNotReady);
        }

        let report = self.sync_table(&table, SyncMode::Foreground).await;
        self.notify(&report);
        Ok(report)
    }

    /// Resets a table's cursor to the epoch, then performs a normal
    /// single-table sync. Unknown table names are rejected.
    pub async fn force_full_sync(&self, table_name: &str) -> Result<TableSyncReport, SyncError> {
        let table = self.registry.get(table_name)?.clone();
        let _slot = self.acquire_run_slot()?;
        if !self.store.is_ready().await {
            return Err(SyncError::StoreNotReady);
        }

        info!(table = table_name, "Forced full resync");
        self.store.reset_cursors(Some(table_name)).await?;

        let report = self.sync_table(&table, SyncMode::Foreground).await;
        self.notify(&report);
        Ok(report)
    }

    /// Syncs one table, converting any failure into a failed report.
    ///
    /// Pages committed before a mid-run failure stay committed; the failed
    /// report carries their count so callers see the durable progress.
    async fn sync_table(&self, table: &TableDescriptor, mode: SyncMode) -> TableSyncReport {
        let mut committed: u64 = 0;
        match self.sync_table_inner(table, mode, &mut committed).await {
            Ok(()) => TableSyncReport::ok(&table.name, committed),
            Err(err) => {
                let message = format!("{err:#}");
                warn!(
                    table = %table.name,
                    committed,
                    error = %message,
                    "Table sync failed"
                );
                if let Err(store_err) = self
                    .store
                    .set_cursor_status(&table.name, CursorStatus::Error)
                    .await
                {
                    warn!(
                        table = %table.name,
                        error = %store_err,
                        "Failed to record error status on cursor"
                    );
                }
                TableSyncReport::failed(&table.name, message, committed)
            }
        }
    }

    async fn sync_table_inner(
        &self,
        table: &TableDescriptor,
        mode: SyncMode,
        committed: &mut u64,
    ) -> anyhow::Result<()> {
        let since = match self.store.cursor(&table.name).await? {
            Some(cursor) => cursor.last_synced_at,
            None => epoch(),
        };
        self.store
            .set_cursor_status(&table.name, CursorStatus::Syncing)
            .await?;

        let limit = mode.batch_size(&self.config);
        let mut offset: u32 = 0;

        loop {
            // Remote fetch completes before any store transaction opens, so
            // the connection is never held across a network await.
            let rows = self
                .fetch_with_auth_retry(table, since, limit, offset)
                .await
                .with_context(|| format!("Remote fetch for '{}' failed", table.name))?;

            let Some(last) = rows.last() else {
                break;
            };
            let batch_cursor = last.updated_at;

            *committed += self
                .store
                .apply_batch(table, &rows, batch_cursor)
                .await
                .with_context(|| format!("Local write for '{}' failed", table.name))?;

            if (rows.len() as u32) < limit {
                break;
            }
            offset += limit;
        }

        if *committed == 0 {
            // Nothing fetched: no batch wrote the idle status, restore it
            self.store
                .set_cursor_status(&table.name, CursorStatus::Idle)
                .await?;
        }

        debug!(table = %table.name, records = *committed, "Table synced");
        Ok(())
    }

    /// Fetches a page, retrying exactly once after a refresh signal when the
    /// failure is auth-class.
    async fn fetch_with_auth_retry(
        &self,
        table: &TableDescriptor,
        since: DateTime<Utc>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RemoteRow>, RemoteError> {
        match self.remote.fetch_page(table, since, limit, offset).await {
            Err(err) if err.is_auth() => {
                warn!(
                    table = %table.name,
                    error = %err,
                    "Auth-class remote error, signaling refresh and retrying once"
                );
                if let Err(refresh_err) = self.auth.refresh_session().await {
                    warn!(
                        error = %format!("{refresh_err:#}"),
                        "Session refresh failed, retrying with existing credentials"
                    );
                }
                self.remote.fetch_page(table, since, limit, offset).await
            }
            other => other,
        }
    }

    async fn probe_with_auth_retry(
        &self,
        table: &TableDescriptor,
        since: DateTime<Utc>,
    ) -> Result<bool, RemoteError> {
        match self.remote.has_changes(table, since).await {
            Err(err) if err.is_auth() => {
                warn!(
                    table = %table.name,
                    error = %err,
                    "Auth-class error on probe, signaling refresh and retrying once"
                );
                if let Err(refresh_err) = self.auth.refresh_session().await {
                    warn!(
                        error = %format!("{refresh_err:#}"),
                        "Session refresh failed, retrying with existing credentials"
                    );
                }
                self.remote.has_changes(table, since).await
            }
            other => other,
        }
    }

    fn acquire_run_slot(&self) -> Result<RunSlot<'_>, SyncError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::SyncInProgress);
        }
        Ok(RunSlot {
            flag: &self.in_flight,
        })
    }

    /// Whether a sync run is currently in flight.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    // ========================================================================
    // Queries and maintenance
    // ========================================================================

    /// Watermark of the last successful sync for a table.
    ///
    /// Returns the epoch when no cursor exists yet or the store cannot be
    /// read; never errors.
    pub async fn last_sync(&self, table_name: &str) -> DateTime<Utc> {
        match self.store.cursor(table_name).await {
            Ok(Some(cursor)) => cursor.last_synced_at,
            Ok(None) => epoch(),
            Err(err) => {
                warn!(table = table_name, error = %err, "Cursor read failed, reporting epoch");
                epoch()
            }
        }
    }

    /// Deletes all local rows for a table (logout/reset). Unknown table
    /// names are rejected; cursors are untouched.
    pub async fn clear_local_data(&self, table_name: &str) -> Result<(), SyncError> {
        let table = self.registry.get(table_name)?;
        self.store.clear_table(table).await?;
        Ok(())
    }

    /// Rewrites cursor rows to the epoch (development/testing reset),
    /// verified by re-reading after the write.
    pub async fn reset_sync_metadata(&self, table_name: Option<&str>) -> Result<(), SyncError> {
        if let Some(name) = table_name {
            self.registry.get(name)?;
        }
        self.store.reset_cursors(table_name).await?;
        Ok(())
    }

    /// Cheap existence probe: whether the remote has rows newer than the
    /// table's cursor. Performs no local writes.
    pub async fn has_remote_changes(&self, table_name: &str) -> Result<bool, SyncError> {
        let table = self.registry.get(table_name)?.clone();
        let since = self.last_sync(table_name).await;
        Ok(self.probe_with_auth_retry(&table, since).await?)
    }

    /// Probes every registered table. Probe failures are logged and
    /// reported as "no changes" so a flaky probe cannot trigger a sync.
    pub async fn remote_changes_summary(&self) -> HashMap<String, bool> {
        let mut summary = HashMap::with_capacity(self.registry.len());
        for table in self.registry.iter() {
            let since = self.last_sync(&table.name).await;
            let changed = match self.probe_with_auth_retry(table, since).await {
                Ok(changed) => changed,
                Err(err) => {
                    warn!(table = %table.name, error = %err, "Change probe failed");
                    false
                }
            };
            summary.insert(table.name.clone(), changed);
        }
        summary
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Registers a listener invoked once per table per run with that
    /// table's report. Returns a handle for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&TableSyncReport) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().push((id, Arc::new(callback)));
        ListenerHandle(id)
    }

    /// Removes a previously registered listener. Unknown handles are a no-op.
    pub fn unsubscribe(&self, handle: ListenerHandle) {
        self.lock_listeners().retain(|(id, _)| *id != handle.0);
    }

    fn notify(&self, report: &TableSyncReport) {
        // Snapshot outside the lock so a callback can subscribe or
        // unsubscribe re-entrantly without deadlocking.
        let snapshot: Vec<(u64, Listener)> = self
            .lock_listeners()
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();
        for (id, callback) in snapshot {
            // A panicking listener must not break delivery to the others
            // or abort the run.
            if std::panic::catch_unwind(AssertUnwindSafe(|| callback(report))).is_err() {
                warn!(
                    listener = id,
                    table = %report.table_name,
                    "Sync listener panicked, continuing delivery"
                );
            }
        }
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_by_mode() {
        let config = SyncConfig {
            foreground_batch_size: 500,
            background_batch_size: 100,
        };
        assert_eq!(SyncMode::Foreground.batch_size(&config), 500);
        assert_eq!(SyncMode::Background.batch_size(&config), 100);
    }

    #[test]
    fn test_batch_size_floor_is_one() {
        let config = SyncConfig {
            foreground_batch_size: 0,
            background_batch_size: 0,
        };
        assert_eq!(SyncMode::Foreground.batch_size(&config), 1);
        assert_eq!(SyncMode::Background.batch_size(&config), 1);
    }
}
