//! Status command - Display local mirror status
//!
//! Shows, per registered table: the local row count, the sync cursor
//! watermark, and the cursor status (idle / syncing / error).

use anyhow::Result;
use clap::Args;

use shelfsync_core::config::Config;
use shelfsync_core::domain::epoch;

use crate::app::App;
use crate::output::{get_formatter, statuses_json, OutputFormat, TableStatus};

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, format: OutputFormat, config: Config) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        if !config.store.path.exists() {
            formatter.error("No local database found. Run 'shelfsync sync' first.");
            return Ok(());
        }

        let app = App::build(&config)?;
        app.init_store().await?;

        let mut statuses = Vec::new();
        for table in app.orchestrator.registry().iter() {
            let rows = app.store.count_rows(table).await?;
            let cursor = app.store.cursor(&table.name).await?;
            let (last_synced_at, status) = match cursor {
                // A cursor still at the epoch means the table never synced
                Some(c) if c.last_synced_at != epoch() => {
                    (Some(c.last_synced_at.to_rfc3339()), c.status.as_str().to_string())
                }
                Some(c) => (None, c.status.as_str().to_string()),
                None => (None, "idle".to_string()),
            };
            statuses.push(TableStatus {
                table: table.name.clone(),
                rows,
                last_synced_at,
                status,
            });
        }

        for status in &statuses {
            formatter.status(status);
        }
        formatter.print_json(&statuses_json(&statuses));

        Ok(())
    }
}
