//! Versioned schema migrations
//!
//! Migrations are plain SQL files embedded with `include_str!` and applied
//! in version order. Applied versions are recorded in `schema_migrations`,
//! so running the migration set again is a no-op.

use sqlx::{Row, SqlitePool};

use crate::StoreError;

/// One schema migration: a version, a human-readable name, and the SQL.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Strictly increasing version number.
    pub version: i64,
    /// Short name recorded alongside the version.
    pub name: &'static str,
    /// The migration SQL. May contain multiple statements.
    pub sql: &'static str,
}

/// The engine's own metadata migration, always applied first.
pub const SYNC_METADATA: Migration = Migration {
    version: 1,
    name: "sync_metadata",
    sql: include_str!("migrations/0001_sync_metadata.sql"),
};

/// Validates that versions are unique and strictly increasing.
pub fn validate(migrations: &[Migration]) -> Result<(), StoreError> {
    for window in migrations.windows(2) {
        if window[1].version <= window[0].version {
            return Err(StoreError::MigrationFailed(format!(
                "migration versions must be strictly increasing: {} '{}' follows {} '{}'",
                window[1].version, window[1].name, window[0].version, window[0].name
            )));
        }
    }
    Ok(())
}

/// Applies all pending migrations in order. Returns the number applied.
///
/// Each migration runs inside its own transaction together with the
/// `schema_migrations` bookkeeping row, so a failed migration leaves the
/// schema at the last fully applied version.
pub async fn run(pool: &SqlitePool, migrations: &[Migration]) -> Result<u32, StoreError> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY NOT NULL,
            name       TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )
    .execute(pool)
    .await
    .map_err(|e| {
        StoreError::MigrationFailed(format!("Failed to create schema_migrations: {}", e))
    })?;

    let mut applied = 0u32;
    for migration in migrations {
        let exists = sqlx::query("SELECT version FROM schema_migrations WHERE version = ?1")
            .bind(migration.version)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?
            .is_some();
        if exists {
            continue;
        }

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                StoreError::MigrationFailed(format!(
                    "Migration {} '{}' failed: {}",
                    migration.version, migration.name, e
                ))
            })?;

        sqlx::query(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        )
        .bind(migration.version)
        .bind(migration.name)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        tracing::debug!(
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
        applied += 1;
    }

    Ok(applied)
}

/// Returns the highest applied migration version, if any.
pub async fn current_version(pool: &SqlitePool) -> Result<Option<i64>, StoreError> {
    let row = sqlx::query("SELECT MAX(version) AS version FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
    Ok(row.try_get::<Option<i64>, _>("version")?)
}
