//! Sync command - Run a foreground synchronization
//!
//! `shelfsync sync` runs an incremental sync of every registered table.
//! `--table` limits the run to one table; `--full` rewinds cursors first
//! so everything is refetched.

use anyhow::Result;
use clap::Args;
use tracing::info;

use shelfsync_core::config::Config;
use shelfsync_core::domain::TableSyncReport;
use shelfsync_engine::SyncMode;

use crate::app::App;
use crate::output::{get_formatter, reports_json, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Rewind cursors and refetch everything
    #[arg(long)]
    pub full: bool,

    /// Limit the run to one table
    #[arg(long)]
    pub table: Option<String>,
}

impl SyncCommand {
    pub async fn execute(&self, format: OutputFormat, config: Config) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let app = App::build(&config)?;
        app.init_store().await?;

        info!(full = self.full, table = ?self.table, "Starting foreground sync");

        let reports: Vec<TableSyncReport> = match (&self.table, self.full) {
            (Some(table), true) => vec![app.orchestrator.force_full_sync(table).await?],
            (Some(table), false) => vec![app.orchestrator.sync_one(table).await?],
            (None, true) => {
                app.orchestrator.reset_sync_metadata(None).await?;
                app.orchestrator.sync_all(SyncMode::Foreground).await?
            }
            (None, false) => app.orchestrator.sync_all(SyncMode::Foreground).await?,
        };

        for report in &reports {
            formatter.report(report);
        }
        formatter.print_json(&reports_json(&reports));

        if reports.iter().any(|r| !r.success) {
            anyhow::bail!("one or more tables failed to sync");
        }
        Ok(())
    }
}
