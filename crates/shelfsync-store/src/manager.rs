//! Store lifecycle manager
//!
//! [`StoreManager`] is the sole owner of the embedded database: it opens the
//! pool, applies migrations, and exposes the typed operations the sync
//! orchestrator needs. Initialization is idempotent and reports discrete
//! progress stages so a first run can show feedback while the schema is
//! created.
//!
//! ## Atomicity
//!
//! [`StoreManager::apply_batch`] writes a page of mirrored rows and the
//! advanced cursor inside one transaction. Either the rows and the new
//! watermark both commit, or neither does; a crash mid-batch can never
//! leave the cursor pointing past unwritten data.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use tokio::sync::RwLock;
use tracing::{debug, info};

use shelfsync_core::domain::{epoch, CursorStatus, SyncCursor, TableDescriptor};
use shelfsync_core::ports::RemoteRow;

use crate::migrations::{self, Migration, SYNC_METADATA};
use crate::pool::StorePool;
use crate::StoreError;

/// Discrete initialization stages reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    /// Opening or creating the database file.
    Opening,
    /// Applying pending schema migrations.
    Migrating,
    /// The store is ready for use.
    Complete,
}

/// One progress report during initialization.
#[derive(Debug, Clone)]
pub struct InitProgress {
    pub stage: InitStage,
    pub message: String,
    /// 0-100.
    pub percent: u8,
}

/// Callback invoked with progress reports during [`StoreManager::initialize`].
pub type ProgressCallback = dyn Fn(InitProgress) + Send + Sync;

enum StoreLocation {
    File(PathBuf),
    InMemory,
}

/// Owner of the embedded database handle and schema.
pub struct StoreManager {
    location: StoreLocation,
    migrations: Vec<Migration>,
    pool: RwLock<Option<SqlitePool>>,
}

impl StoreManager {
    /// Creates a manager for a file-backed store.
    ///
    /// `app_migrations` are the host application's schema migrations (the
    /// mirrored tables themselves); the engine's own metadata migration is
    /// always applied first.
    pub fn new(db_path: impl Into<PathBuf>, app_migrations: Vec<Migration>) -> Self {
        Self {
            location: StoreLocation::File(db_path.into()),
            migrations: Self::full_migration_set(app_migrations),
            pool: RwLock::new(None),
        }
    }

    /// Creates a manager backed by an in-memory database, for tests.
    pub fn in_memory(app_migrations: Vec<Migration>) -> Self {
        Self {
            location: StoreLocation::InMemory,
            migrations: Self::full_migration_set(app_migrations),
            pool: RwLock::new(None),
        }
    }

    fn full_migration_set(app_migrations: Vec<Migration>) -> Vec<Migration> {
        let mut all = vec![SYNC_METADATA];
        all.extend(app_migrations);
        all
    }

    /// Opens the database and applies pending migrations.
    ///
    /// Idempotent: calling again after success is a no-op (reported as an
    /// immediate `Complete`). Fails only if the file cannot be opened or a
    /// migration cannot apply.
    pub async fn initialize(
        &self,
        progress: Option<&ProgressCallback>,
    ) -> Result<(), StoreError> {
        if self.pool.read().await.is_some() {
            debug!("Store already initialized, skipping");
            report(progress, InitStage::Complete, "Store ready", 100);
            return Ok(());
        }

        let mut guard = self.pool.write().await;
        if guard.is_some() {
            report(progress, InitStage::Complete, "Store ready", 100);
            return Ok(());
        }

        report(progress, InitStage::Opening, "Opening local store", 10);
        let pool = match &self.location {
            StoreLocation::File(path) => StorePool::open(path).await?,
            StoreLocation::InMemory => StorePool::in_memory().await?,
        }
        .into_pool();

        report(
            progress,
            InitStage::Migrating,
            "Applying schema migrations",
            50,
        );
        migrations::validate(&self.migrations)?;
        let applied = migrations::run(&pool, &self.migrations).await?;

        info!(migrations_applied = applied, "Store initialized");
        *guard = Some(pool);
        report(progress, InitStage::Complete, "Store ready", 100);
        Ok(())
    }

    /// Whether `initialize` has succeeded.
    pub async fn is_ready(&self) -> bool {
        self.pool.read().await.is_some()
    }

    /// Raw pool handle for ad hoc queries (status screens, tests).
    ///
    /// The sync path never uses this; it goes through the typed operations
    /// below so writes stay transactional.
    pub async fn pool(&self) -> Result<SqlitePool, StoreError> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or(StoreError::NotInitialized)
    }

    // ------------------------------------------------------------------
    // Cursor repository
    // ------------------------------------------------------------------

    /// Reads the cursor for `table_name`, if one exists yet.
    pub async fn cursor(&self, table_name: &str) -> Result<Option<SyncCursor>, StoreError> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT table_name, last_synced_at, status FROM sync_cursors WHERE table_name = ?1",
        )
        .bind(table_name)
        .fetch_optional(&pool)
        .await?;

        row.map(|r| cursor_from_row(&r)).transpose()
    }

    /// Inserts or replaces a cursor row.
    pub async fn put_cursor(&self, cursor: &SyncCursor) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query(
            "INSERT INTO sync_cursors (table_name, last_synced_at, status)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(table_name) DO UPDATE SET
                 last_synced_at = excluded.last_synced_at,
                 status = excluded.status",
        )
        .bind(&cursor.table_name)
        .bind(cursor.last_synced_at.to_rfc3339())
        .bind(cursor.status.as_str())
        .execute(&pool)
        .await?;
        Ok(())
    }

    /// Updates only the status of a cursor, creating an epoch cursor if the
    /// table has never synced.
    pub async fn set_cursor_status(
        &self,
        table_name: &str,
        status: CursorStatus,
    ) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query(
            "INSERT INTO sync_cursors (table_name, last_synced_at, status)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(table_name) DO UPDATE SET status = excluded.status",
        )
        .bind(table_name)
        .bind(epoch().to_rfc3339())
        .bind(status.as_str())
        .execute(&pool)
        .await?;
        Ok(())
    }

    /// All cursor rows, ordered by table name.
    pub async fn all_cursors(&self) -> Result<Vec<SyncCursor>, StoreError> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT table_name, last_synced_at, status FROM sync_cursors ORDER BY table_name",
        )
        .fetch_all(&pool)
        .await?;

        rows.iter().map(cursor_from_row).collect()
    }

    /// Rewrites cursor rows to the epoch (development/testing reset).
    ///
    /// With `Some(table)` only that table's cursor is rewritten (created if
    /// absent); with `None` every existing cursor is rewritten. The write is
    /// verified by re-reading.
    pub async fn reset_cursors(&self, table_name: Option<&str>) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        match table_name {
            Some(name) => {
                self.put_cursor(&SyncCursor::new(name)).await?;
            }
            None => {
                sqlx::query("UPDATE sync_cursors SET last_synced_at = ?1, status = 'idle'")
                    .bind(epoch().to_rfc3339())
                    .execute(&pool)
                    .await?;
            }
        }

        // Verify by re-reading
        for cursor in self.all_cursors().await? {
            let relevant = table_name.map_or(true, |name| cursor.table_name == name);
            if relevant && cursor.last_synced_at != epoch() {
                return Err(StoreError::QueryFailed(format!(
                    "cursor reset verification failed for '{}'",
                    cursor.table_name
                )));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mirrored rows
    // ------------------------------------------------------------------

    /// Upserts a page of remote rows and advances the cursor in one
    /// transaction.
    ///
    /// Rows are INSERT OR REPLACEd by primary key, never partially patched.
    /// Returns the number of rows written.
    pub async fn apply_batch(
        &self,
        table: &TableDescriptor,
        rows: &[RemoteRow],
        new_cursor_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        let placeholders = (1..=table.columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        // Table and column names come from code-defined descriptors, not
        // user input.
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            table.local_table,
            table.columns.join(", "),
            placeholders
        );

        for row in rows {
            let mut query = sqlx::query(&sql);
            for column in &table.columns {
                query = bind_field(query, row, column);
            }
            query.execute(&mut *tx).await?;
        }

        sqlx::query(
            "INSERT INTO sync_cursors (table_name, last_synced_at, status)
             VALUES (?1, ?2, 'idle')
             ON CONFLICT(table_name) DO UPDATE SET
                 last_synced_at = excluded.last_synced_at,
                 status = excluded.status",
        )
        .bind(&table.name)
        .bind(new_cursor_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            table = %table.name,
            rows = rows.len(),
            cursor = %new_cursor_at.to_rfc3339(),
            "Batch committed"
        );
        Ok(rows.len() as u64)
    }

    /// Deletes all local rows for a table (logout/reset).
    pub async fn clear_table(&self, table: &TableDescriptor) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let sql = format!("DELETE FROM {}", table.local_table);
        sqlx::query(&sql).execute(&pool).await?;
        info!(table = %table.name, "Cleared local rows");
        Ok(())
    }

    /// Number of rows currently mirrored for a table.
    pub async fn count_rows(&self, table: &TableDescriptor) -> Result<i64, StoreError> {
        let pool = self.pool().await?;
        let sql = format!("SELECT COUNT(*) AS n FROM {}", table.local_table);
        let row = sqlx::query(&sql).fetch_one(&pool).await?;
        Ok(row.try_get("n")?)
    }
}

fn report(progress: Option<&ProgressCallback>, stage: InitStage, message: &str, percent: u8) {
    if let Some(cb) = progress {
        cb(InitProgress {
            stage,
            message: message.to_string(),
            percent,
        });
    }
}

/// Binds one descriptor column from a remote row.
///
/// `id` and `updated_at` come from the row's typed fields; everything else
/// is looked up in the JSON payload. Absent fields bind NULL, nested
/// structures are stored as JSON text.
fn bind_field<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    row: &RemoteRow,
    column: &str,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    use serde_json::Value;

    match column {
        "id" => query.bind(row.id.clone()),
        "updated_at" => query.bind(row.updated_at.to_rfc3339()),
        other => match row.field(other) {
            None | Some(Value::Null) => query.bind(None::<String>),
            Some(Value::Bool(b)) => query.bind(*b),
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else {
                    query.bind(n.as_f64())
                }
            }
            Some(Value::String(s)) => query.bind(s.clone()),
            Some(nested) => query.bind(nested.to_string()),
        },
    }
}

fn cursor_from_row(row: &SqliteRow) -> Result<SyncCursor, StoreError> {
    let table_name: String = row.get("table_name");
    let last_synced_at_str: String = row.get("last_synced_at");
    let status_str: String = row.get("status");

    let last_synced_at = parse_datetime(&last_synced_at_str)?;
    let status = CursorStatus::parse(&status_str).ok_or_else(|| {
        StoreError::Serialization(format!("Unknown cursor status: {}", status_str))
    })?;

    Ok(SyncCursor {
        table_name,
        last_synced_at,
        status,
    })
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Try parsing without timezone (SQLite default format)
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            StoreError::Serialization(format!("Failed to parse datetime '{}': {}", s, e))
        })
}
