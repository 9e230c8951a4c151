//! Probe command - Check the remote for pending changes
//!
//! Runs the same cheap limit-1 probes the background scheduler uses,
//! without writing anything locally.

use anyhow::Result;
use clap::Args;

use shelfsync_core::config::Config;

use crate::app::App;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ProbeCommand {}

impl ProbeCommand {
    pub async fn execute(&self, format: OutputFormat, config: Config) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let app = App::build(&config)?;
        app.init_store().await?;

        let summary = app.orchestrator.remote_changes_summary().await;

        // Report in registry order, not hash order
        let mut any_changes = false;
        for table in app.orchestrator.registry().iter() {
            let changed = summary.get(&table.name).copied().unwrap_or(false);
            any_changes |= changed;
            if changed {
                formatter.info(&format!("{}: changes available", table.name));
            } else {
                formatter.info(&format!("{}: up to date", table.name));
            }
        }

        if any_changes {
            formatter.success("Remote changes pending. Run 'shelfsync sync'.");
        } else {
            formatter.success("Local mirror is up to date.");
        }

        if matches!(format, OutputFormat::Json) {
            let value = serde_json::json!({
                "tables": app
                    .orchestrator
                    .registry()
                    .names()
                    .iter()
                    .map(|name| {
                        serde_json::json!({
                            "table": name,
                            "changes": summary.get(*name).copied().unwrap_or(false),
                        })
                    })
                    .collect::<Vec<_>>(),
            });
            formatter.print_json(&value);
        }

        Ok(())
    }
}
