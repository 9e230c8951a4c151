//! Clear command - Delete locally mirrored rows
//!
//! Deletes every local row of one table. Cursors are untouched; pair with
//! `shelfsync reset` to refetch from scratch.

use anyhow::Result;
use clap::Args;

use shelfsync_core::config::Config;

use crate::app::App;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Table whose local rows are deleted
    pub table: String,
}

impl ClearCommand {
    pub async fn execute(&self, format: OutputFormat, config: Config) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let app = App::build(&config)?;
        app.init_store().await?;

        app.orchestrator.clear_local_data(&self.table).await?;
        formatter.success(&format!("Local rows for '{}' deleted", self.table));

        if matches!(format, OutputFormat::Json) {
            formatter.print_json(&serde_json::json!({
                "action": "clear",
                "table": self.table,
                "success": true,
            }));
        }

        Ok(())
    }
}
