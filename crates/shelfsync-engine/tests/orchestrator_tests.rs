//! Integration tests for the sync orchestrator
//!
//! Each test wires an in-memory store, a programmable mock remote, and an
//! auth refresher spy, then drives full sync runs and asserts on reports,
//! cursors, and local row counts.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::*;

use shelfsync_core::domain::{epoch, CursorStatus, TableSyncReport};
use shelfsync_core::ports::RemoteError;
use shelfsync_engine::{SyncError, SyncMode, SyncOrchestrator};
use shelfsync_store::StoreManager;

fn report<'a>(reports: &'a [TableSyncReport], table: &str) -> &'a TableSyncReport {
    reports
        .iter()
        .find(|r| r.table_name == table)
        .unwrap_or_else(|| panic!("no report for table '{table}'"))
}

async fn wire() -> (Arc<StoreManager>, Arc<MockRemote>, Arc<SpyAuth>, Arc<SyncOrchestrator>) {
    let store = setup_store().await;
    let remote = Arc::new(MockRemote::new());
    let auth = Arc::new(SpyAuth::new());
    let orch = orchestrator(store.clone(), remote.clone(), auth.clone());
    (store, remote, auth, orch)
}

// ============================================================================
// Basic scenarios
// ============================================================================

#[tokio::test]
async fn test_empty_remote_succeeds_with_zero_records() {
    let (store, _remote, _auth, orch) = wire().await;

    let reports = orch.sync_all(SyncMode::Foreground).await.unwrap();
    assert_eq!(reports.len(), 2);
    for r in &reports {
        assert!(r.success);
        assert_eq!(r.records_synced, 0);
    }

    // Cursor untouched by an empty fetch: still at the epoch default
    assert_eq!(orch.last_sync("books").await, epoch());
    let cursor = store.cursor("books").await.unwrap().unwrap();
    assert_eq!(cursor.status, CursorStatus::Idle);
}

#[tokio::test]
async fn test_one_new_row_in_a_zero_in_b() {
    let (_store, remote, _auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));

    let reports = orch.sync_all(SyncMode::Foreground).await.unwrap();
    let books_report = report(&reports, "books");
    let chapters_report = report(&reports, "chapters");

    assert!(books_report.success);
    assert_eq!(books_report.records_synced, 1);
    assert!(chapters_report.success);
    assert_eq!(chapters_report.records_synced, 0);

    // The cursor lands on the synced row's updated_at
    assert_eq!(orch.last_sync("books").await, ts(1));
    assert_eq!(orch.last_sync("chapters").await, epoch());
}

#[tokio::test]
async fn test_second_run_with_no_new_data_is_idempotent() {
    let (_store, remote, _auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));
    remote.add_row("books", book_row("b2", "Hyperion", ts(2)));

    let first = orch.sync_all(SyncMode::Foreground).await.unwrap();
    assert_eq!(report(&first, "books").records_synced, 2);
    let cursor_after_first = orch.last_sync("books").await;

    let second = orch.sync_all(SyncMode::Foreground).await.unwrap();
    assert_eq!(report(&second, "books").records_synced, 0);
    assert_eq!(orch.last_sync("books").await, cursor_after_first);
}

#[tokio::test]
async fn test_paged_fetch_processes_all_rows_in_order() {
    let store = setup_store().await;
    let remote = Arc::new(MockRemote::new());
    let auth = Arc::new(SpyAuth::new());
    // Page size 2 against 5 rows forces three fetches for books
    let config = shelfsync_core::config::SyncConfig {
        foreground_batch_size: 2,
        background_batch_size: 1,
    };
    let orch = SyncOrchestrator::new(store.clone(), remote.clone(), auth, registry(), config);

    for i in 1..=5 {
        remote.add_row("books", book_row(&format!("b{i}"), "Title", ts(i)));
    }

    let reports = orch.sync_all(SyncMode::Foreground).await.unwrap();
    assert_eq!(report(&reports, "books").records_synced, 5);
    assert_eq!(orch.last_sync("books").await, ts(5));
    assert_eq!(store.count_rows(&books()).await.unwrap(), 5);
}

// ============================================================================
// Failure isolation and retry policy
// ============================================================================

#[tokio::test]
async fn test_one_failing_table_does_not_block_the_other() {
    let (_store, remote, _auth, orch) = wire().await;
    remote.fail_next_fetch(
        "books",
        RemoteError::Network("connection refused".to_string()),
    );
    remote.add_row("chapters", chapter_row("c1", "b1", ts(3)));

    let reports = orch.sync_all(SyncMode::Foreground).await.unwrap();

    let books_report = report(&reports, "books");
    assert!(!books_report.success);
    assert!(books_report.error.as_deref().unwrap().contains("connection refused"));

    let chapters_report = report(&reports, "chapters");
    assert!(chapters_report.success);
    assert_eq!(chapters_report.records_synced, 1);

    // The failed table's cursor records the error; the good one advanced
    assert_eq!(orch.last_sync("books").await, epoch());
    assert_eq!(orch.last_sync("chapters").await, ts(3));
}

#[tokio::test]
async fn test_failed_table_reports_rows_committed_before_failure() {
    let store = setup_store().await;
    let remote = Arc::new(MockRemote::new());
    let auth = Arc::new(SpyAuth::new());
    // Page size 2 against 3 rows: the first page commits, then the second
    // fetch fails mid-run
    let config = shelfsync_core::config::SyncConfig {
        foreground_batch_size: 2,
        background_batch_size: 1,
    };
    let orch = SyncOrchestrator::new(store.clone(), remote.clone(), auth, registry(), config);

    for i in 1..=3 {
        remote.add_row("books", book_row(&format!("b{i}"), "Title", ts(i)));
    }
    remote.fail_second_fetch("books", RemoteError::Network("reset by peer".to_string()));

    let reports = orch.sync_all(SyncMode::Foreground).await.unwrap();
    let books_report = report(&reports, "books");

    assert!(!books_report.success);
    // The failed report carries the durably committed rows, not zero
    assert_eq!(books_report.records_synced, 2);
    assert_eq!(store.count_rows(&books()).await.unwrap(), 2);
    // The cursor advanced with the committed page, so a retry resumes there
    assert_eq!(orch.last_sync("books").await, ts(2));
}

#[tokio::test]
async fn test_failed_table_cursor_is_marked_error() {
    let (store, remote, _auth, orch) = wire().await;
    remote.fail_next_fetch("books", RemoteError::Server {
        status: 503,
        message: "unavailable".to_string(),
    });

    orch.sync_all(SyncMode::Foreground).await.unwrap();

    let cursor = store.cursor("books").await.unwrap().unwrap();
    assert_eq!(cursor.status, CursorStatus::Error);
}

#[tokio::test]
async fn test_auth_error_refreshes_once_and_retries_successfully() {
    let (_store, remote, auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));
    remote.add_row("books", book_row("b2", "Hyperion", ts(2)));
    remote.fail_next_fetch("books", RemoteError::Auth("JWT expired".to_string()));

    let reports = orch.sync_all(SyncMode::Foreground).await.unwrap();
    let books_report = report(&reports, "books");

    assert!(books_report.success);
    assert_eq!(books_report.records_synced, 2);
    assert_eq!(auth.refresh_count(), 1);
}

#[tokio::test]
async fn test_auth_error_is_retried_exactly_once() {
    let (_store, remote, auth, orch) = wire().await;
    remote.fail_next_fetch("books", RemoteError::Auth("JWT expired".to_string()));
    remote.fail_next_fetch("books", RemoteError::Auth("JWT expired".to_string()));

    let reports = orch.sync_all(SyncMode::Foreground).await.unwrap();

    assert!(!report(&reports, "books").success);
    assert_eq!(auth.refresh_count(), 1);
    // Initial attempt + one retry for books, one fetch for chapters
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_non_auth_error_is_not_retried() {
    let store = setup_store().await;
    let remote = Arc::new(MockRemote::new());
    let auth = Arc::new(SpyAuth::new());
    let registry = shelfsync_core::domain::TableRegistry::new(vec![books()]).unwrap();
    let orch = SyncOrchestrator::new(store, remote.clone(), auth.clone(), registry, sync_config());

    remote.add_row("books", book_row("b1", "Dune", ts(1)));
    remote.fail_next_fetch("books", RemoteError::Network("timeout".to_string()));

    let reports = orch.sync_all(SyncMode::Foreground).await.unwrap();

    assert!(!reports[0].success);
    assert_eq!(auth.refresh_count(), 0);
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Concurrency and process-level rejection
// ============================================================================

#[tokio::test]
async fn test_concurrent_sync_is_rejected_without_affecting_first() {
    let (_store, remote, _auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));
    remote.set_fetch_delay(Duration::from_millis(200));

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.sync_all(SyncMode::Foreground).await })
    };
    // Let the first run take the slot
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = orch.sync_all(SyncMode::Foreground).await;
    assert!(matches!(second, Err(SyncError::SyncInProgress)));

    let first = first.await.unwrap().unwrap();
    assert!(report(&first, "books").success);
    assert_eq!(report(&first, "books").records_synced, 1);
}

#[tokio::test]
async fn test_sync_rejected_when_store_not_ready() {
    let store = Arc::new(StoreManager::in_memory(vec![LIBRARY_SCHEMA]));
    let remote = Arc::new(MockRemote::new());
    let auth = Arc::new(SpyAuth::new());
    let orch = orchestrator(store, remote, auth);

    let result = orch.sync_all(SyncMode::Foreground).await;
    assert!(matches!(result, Err(SyncError::StoreNotReady)));
    // The slot was released: a later call must not see "in progress"
    assert!(!orch.is_syncing());
}

// ============================================================================
// Maintenance operations
// ============================================================================

#[tokio::test]
async fn test_force_full_sync_resets_cursor_and_resyncs() {
    let (_store, remote, _auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));
    remote.add_row("books", book_row("b2", "Hyperion", ts(2)));

    orch.sync_all(SyncMode::Foreground).await.unwrap();
    assert_eq!(orch.last_sync("books").await, ts(2));

    // No new remote data, but the full resync refetches everything
    let report = orch.force_full_sync("books").await.unwrap();
    assert!(report.success);
    assert_eq!(report.records_synced, 2);
    assert_eq!(orch.last_sync("books").await, ts(2));
}

#[tokio::test]
async fn test_force_full_sync_rejects_unknown_table() {
    let (_store, _remote, _auth, orch) = wire().await;
    let result = orch.force_full_sync("playlists").await;
    assert!(matches!(result, Err(SyncError::Domain(_))));
}

#[tokio::test]
async fn test_clear_local_data_removes_rows_for_known_table_only() {
    let (store, remote, _auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));
    orch.sync_all(SyncMode::Foreground).await.unwrap();
    assert_eq!(store.count_rows(&books()).await.unwrap(), 1);

    orch.clear_local_data("books").await.unwrap();
    assert_eq!(store.count_rows(&books()).await.unwrap(), 0);

    let result = orch.clear_local_data("playlists").await;
    assert!(matches!(result, Err(SyncError::Domain(_))));
}

#[tokio::test]
async fn test_reset_sync_metadata_rewinds_cursors() {
    let (_store, remote, _auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));
    remote.add_row("chapters", chapter_row("c1", "b1", ts(2)));
    orch.sync_all(SyncMode::Foreground).await.unwrap();

    orch.reset_sync_metadata(Some("books")).await.unwrap();
    assert_eq!(orch.last_sync("books").await, epoch());
    assert_eq!(orch.last_sync("chapters").await, ts(2));

    orch.reset_sync_metadata(None).await.unwrap();
    assert_eq!(orch.last_sync("chapters").await, epoch());
}

#[tokio::test]
async fn test_has_remote_changes_probe_does_not_write() {
    let (store, remote, _auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));

    assert!(orch.has_remote_changes("books").await.unwrap());
    assert!(!orch.has_remote_changes("chapters").await.unwrap());

    // Probes never touch the local write path
    assert_eq!(store.count_rows(&books()).await.unwrap(), 0);
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Listeners
// ============================================================================

#[tokio::test]
async fn test_listeners_receive_one_report_per_table() {
    let (_store, remote, _auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));

    let seen: Arc<Mutex<Vec<TableSyncReport>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    orch.subscribe(move |r| sink.lock().unwrap().push(r.clone()));

    orch.sync_all(SyncMode::Foreground).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().any(|r| r.table_name == "books" && r.records_synced == 1));
    assert!(seen.iter().any(|r| r.table_name == "chapters" && r.records_synced == 0));
}

#[tokio::test]
async fn test_panicking_listener_does_not_break_delivery() {
    let (_store, remote, _auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));

    orch.subscribe(|_| panic!("bad listener"));
    let delivered = Arc::new(AtomicU32::new(0));
    let counter = delivered.clone();
    orch.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let reports = orch.sync_all(SyncMode::Foreground).await.unwrap();
    assert!(reports.iter().all(|r| r.success));
    // The healthy listener still saw both tables
    assert_eq!(delivered.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_listener_can_change_subscriptions_reentrantly() {
    let (_store, remote, _auth, orch) = wire().await;
    remote.add_row("books", book_row("b1", "Dune", ts(1)));

    // Subscribing from inside a callback must not deadlock delivery
    let delivered = Arc::new(AtomicU32::new(0));
    let orch_inner = orch.clone();
    let counter = delivered.clone();
    orch.subscribe(move |_| {
        let counter = counter.clone();
        orch_inner.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    });

    let run = orch.sync_all(SyncMode::Foreground);
    let reports = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("delivery deadlocked")
        .unwrap();
    assert_eq!(reports.len(), 2);
    // The listener added during the first table's delivery saw the second
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unsubscribe_from_inside_a_callback_does_not_deadlock() {
    let (_store, _remote, _auth, orch) = wire().await;

    let delivered = Arc::new(AtomicU32::new(0));
    let handle_slot: Arc<Mutex<Option<shelfsync_engine::ListenerHandle>>> =
        Arc::new(Mutex::new(None));
    let orch_inner = orch.clone();
    let slot = handle_slot.clone();
    let counter = delivered.clone();
    let handle = orch.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = slot.lock().unwrap().take() {
            orch_inner.unsubscribe(handle);
        }
    });
    *handle_slot.lock().unwrap() = Some(handle);

    let run = orch.sync_all(SyncMode::Foreground);
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("delivery deadlocked")
        .unwrap();
    // Removed itself after the first table's report
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unsubscribed_listener_stops_receiving() {
    let (_store, _remote, _auth, orch) = wire().await;

    let delivered = Arc::new(AtomicU32::new(0));
    let counter = delivered.clone();
    let handle = orch.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    orch.sync_all(SyncMode::Foreground).await.unwrap();
    let after_first = delivered.load(Ordering::SeqCst);
    assert_eq!(after_first, 2);

    orch.unsubscribe(handle);
    orch.sync_all(SyncMode::Foreground).await.unwrap();
    assert_eq!(delivered.load(Ordering::SeqCst), after_first);
}
