//! Engine wiring for the CLI
//!
//! Builds the full stack once per invocation: store manager with the
//! library schema, HTTP remote source, orchestrator over the registered
//! tables, and the background scheduler backed by the in-process runtime.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use shelfsync_core::config::Config;
use shelfsync_core::domain::{TableDescriptor, TableRegistry};
use shelfsync_core::ports::{BackgroundCapability, NoopRefresher};
use shelfsync_engine::{BackgroundScheduler, InProcessRuntime, SyncOrchestrator};
use shelfsync_remote::HttpRemoteSource;
use shelfsync_store::{InitProgress, Migration, StoreManager};

/// Environment variable overriding the configured bearer token.
const TOKEN_ENV: &str = "SHELFSYNC_ACCESS_TOKEN";

/// Library content schema, applied on top of the store's own metadata
/// migration.
const LIBRARY_SCHEMA: Migration = Migration {
    version: 2,
    name: "library",
    sql: include_str!("migrations/0002_library.sql"),
};

/// The tables this binary mirrors, in sync order (books before chapters).
pub fn tables() -> Vec<TableDescriptor> {
    vec![
        TableDescriptor::new(
            "books",
            &["id", "title", "author", "cover_url", "duration_seconds", "updated_at"],
        ),
        TableDescriptor::new(
            "chapters",
            &["id", "book_id", "title", "sort_order", "audio_url", "updated_at"],
        ),
    ]
}

/// Fully wired engine for one CLI invocation.
pub struct App {
    pub store: Arc<StoreManager>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub scheduler: BackgroundScheduler,
}

impl App {
    pub fn build(config: &Config) -> Result<Self> {
        let registry = TableRegistry::new(tables())?;

        let store = Arc::new(StoreManager::new(
            config.store.path.clone(),
            vec![LIBRARY_SCHEMA],
        ));

        let remote = HttpRemoteSource::new(&config.remote)?;
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            remote.set_access_token(token);
        }

        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            Arc::new(remote),
            Arc::new(NoopRefresher),
            registry,
            config.sync.clone(),
        ));

        let runtime = Arc::new(InProcessRuntime::new(BackgroundCapability::Available));
        let scheduler = BackgroundScheduler::new(orchestrator.clone(), runtime, &config.background);

        Ok(Self {
            store,
            orchestrator,
            scheduler,
        })
    }

    /// Opens the database and applies pending migrations.
    pub async fn init_store(&self) -> Result<()> {
        let progress = |p: InitProgress| {
            debug!(stage = ?p.stage, percent = p.percent, "{}", p.message);
        };
        self.store.initialize(Some(&progress)).await?;
        Ok(())
    }
}
