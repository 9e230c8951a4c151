//! Shared fixtures for engine integration tests: an in-memory store with a
//! small library schema, a programmable mock remote, and a counting auth
//! refresher spy.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use shelfsync_core::config::SyncConfig;
use shelfsync_core::domain::{TableDescriptor, TableRegistry};
use shelfsync_core::ports::{AuthRefresher, RemoteError, RemoteRow, RemoteSource};
use shelfsync_engine::SyncOrchestrator;
use shelfsync_store::{Migration, StoreManager};

pub const LIBRARY_SCHEMA: Migration = Migration {
    version: 2,
    name: "library",
    sql: "CREATE TABLE books (
              id         TEXT PRIMARY KEY NOT NULL,
              title      TEXT,
              updated_at TEXT NOT NULL
          );
          CREATE TABLE chapters (
              id         TEXT PRIMARY KEY NOT NULL,
              book_id    TEXT,
              title      TEXT,
              updated_at TEXT NOT NULL
          );",
};

pub fn books() -> TableDescriptor {
    TableDescriptor::new("books", &["id", "title", "updated_at"])
}

pub fn chapters() -> TableDescriptor {
    TableDescriptor::new("chapters", &["id", "book_id", "title", "updated_at"])
}

pub fn registry() -> TableRegistry {
    TableRegistry::new(vec![books(), chapters()]).unwrap()
}

pub fn sync_config() -> SyncConfig {
    SyncConfig {
        foreground_batch_size: 500,
        background_batch_size: 100,
    }
}

/// Deterministic timestamp helper: hours after a fixed base instant.
pub fn ts(hours: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hours as i64)
}

pub fn book_row(id: &str, title: &str, updated_at: DateTime<Utc>) -> RemoteRow {
    RemoteRow {
        id: id.to_string(),
        updated_at,
        fields: serde_json::json!({
            "id": id,
            "title": title,
            "updated_at": updated_at.to_rfc3339(),
        }),
    }
}

pub fn chapter_row(id: &str, book_id: &str, updated_at: DateTime<Utc>) -> RemoteRow {
    RemoteRow {
        id: id.to_string(),
        updated_at,
        fields: serde_json::json!({
            "id": id,
            "book_id": book_id,
            "title": format!("Chapter {id}"),
            "updated_at": updated_at.to_rfc3339(),
        }),
    }
}

// ============================================================================
// Mock remote
// ============================================================================

/// Programmable in-memory remote: holds rows per table and per-call fetch
/// outcomes (`None` = serve normally, `Some` = fail), plus a probe error
/// queue.
#[derive(Default)]
pub struct MockRemote {
    rows: Mutex<HashMap<String, Vec<RemoteRow>>>,
    fetch_failures: Mutex<HashMap<String, VecDeque<Option<RemoteError>>>>,
    probe_failures: Mutex<HashMap<String, VecDeque<RemoteError>>>,
    pub fetch_calls: AtomicU32,
    pub probe_calls: AtomicU32,
    pub last_fetch_limit: AtomicU32,
    delay: Mutex<Option<Duration>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&self, table: &str, row: RemoteRow) {
        self.rows
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Queue an error for the next fetch on `table`; subsequent fetches
    /// succeed (or hit the next queued outcome).
    pub fn fail_next_fetch(&self, table: &str, error: RemoteError) {
        self.fetch_failures
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push_back(Some(error));
    }

    /// Let the next fetch on `table` serve rows normally, then fail the one
    /// after it. Used to break a paged run mid-way.
    pub fn fail_second_fetch(&self, table: &str, error: RemoteError) {
        let mut failures = self.fetch_failures.lock().unwrap();
        let queue = failures.entry(table.to_string()).or_default();
        queue.push_back(None);
        queue.push_back(Some(error));
    }

    pub fn fail_next_probe(&self, table: &str, error: RemoteError) {
        self.probe_failures
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push_back(error);
    }

    /// Delay every fetch, to hold a sync run open for concurrency tests.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    fn matching_rows(&self, table: &str, since: DateTime<Utc>) -> Vec<RemoteRow> {
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<RemoteRow> = rows
            .get(table)
            .map(|all| {
                all.iter()
                    .filter(|r| r.updated_at > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by_key(|r| r.updated_at);
        matching
    }
}

#[async_trait::async_trait]
impl RemoteSource for MockRemote {
    async fn fetch_page(
        &self,
        table: &TableDescriptor,
        since: DateTime<Utc>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RemoteRow>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.last_fetch_limit.store(limit, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .fetch_failures
            .lock()
            .unwrap()
            .get_mut(&table.name)
            .and_then(VecDeque::pop_front);
        if let Some(Some(err)) = outcome {
            return Err(err);
        }

        Ok(self
            .matching_rows(&table.name, since)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn has_changes(
        &self,
        table: &TableDescriptor,
        since: DateTime<Utc>,
    ) -> Result<bool, RemoteError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self
            .probe_failures
            .lock()
            .unwrap()
            .get_mut(&table.name)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        Ok(!self.matching_rows(&table.name, since).is_empty())
    }
}

// ============================================================================
// Auth spy
// ============================================================================

/// Counts refresh invocations; always reports success.
#[derive(Default)]
pub struct SpyAuth {
    pub refreshes: AtomicU32,
}

impl SpyAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AuthRefresher for SpyAuth {
    async fn refresh_session(&self) -> anyhow::Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub async fn setup_store() -> Arc<StoreManager> {
    let store = Arc::new(StoreManager::in_memory(vec![LIBRARY_SCHEMA]));
    store.initialize(None).await.expect("store init failed");
    store
}

pub fn orchestrator(
    store: Arc<StoreManager>,
    remote: Arc<MockRemote>,
    auth: Arc<SpyAuth>,
) -> Arc<SyncOrchestrator> {
    Arc::new(SyncOrchestrator::new(
        store,
        remote,
        auth,
        registry(),
        sync_config(),
    ))
}
