//! Reset command - Rewind sync cursors
//!
//! Rewinds cursors to the beginning of time so the next sync refetches
//! everything. Local rows are kept; re-synced rows overwrite them by
//! primary key.

use anyhow::Result;
use clap::Args;

use shelfsync_core::config::Config;

use crate::app::App;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ResetCommand {
    /// Limit the reset to one table (default: all tables)
    #[arg(long)]
    pub table: Option<String>,
}

impl ResetCommand {
    pub async fn execute(&self, format: OutputFormat, config: Config) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let app = App::build(&config)?;
        app.init_store().await?;

        app.orchestrator
            .reset_sync_metadata(self.table.as_deref())
            .await?;

        match &self.table {
            Some(table) => formatter.success(&format!("Sync cursor for '{table}' reset")),
            None => formatter.success("All sync cursors reset"),
        }

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "action": "reset",
                "table": self.table,
                "success": true,
            }));
        }

        Ok(())
    }
}
