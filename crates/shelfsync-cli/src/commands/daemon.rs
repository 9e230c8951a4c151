//! Daemon command - In-process background sync loop
//!
//! Registers the periodic task with the in-process runtime and runs the
//! scheduler loop until Ctrl-C. Each tick probes the remote and only syncs
//! when changes are pending, with the reduced background batch size.

use anyhow::Result;
use clap::Args;
use tokio::sync::watch;
use tracing::info;

use shelfsync_core::config::Config;
use shelfsync_core::ports::TaskOutcome;

use crate::app::App;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct DaemonCommand {
    /// Run one background task invocation and exit
    #[arg(long)]
    pub once: bool,
}

impl DaemonCommand {
    pub async fn execute(&self, format: OutputFormat, config: Config) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let app = App::build(&config)?;
        app.init_store().await?;

        app.scheduler.initialize();
        app.scheduler.register_background_task().await?;

        if self.once {
            let outcome = app.scheduler.run_task().await;
            match outcome {
                TaskOutcome::NewData => formatter.success("Background sync pulled new data"),
                TaskOutcome::NoData => formatter.success("No remote changes"),
                TaskOutcome::Failed => formatter.error("Background sync failed"),
            }
            if matches!(format, OutputFormat::Json) {
                formatter.print_json(&serde_json::json!({
                    "action": "run_once",
                    "outcome": format!("{outcome:?}"),
                }));
            }
            if outcome == TaskOutcome::Failed {
                anyhow::bail!("background task failed");
            }
            return Ok(());
        }

        let interval = app.scheduler.registration().minimum_interval;
        formatter.success(&format!(
            "Daemon running, sync interval {}s. Press Ctrl-C to stop.",
            interval.as_secs()
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                let _ = shutdown_tx.send(true);
            }
        });

        app.scheduler.run(shutdown_rx).await;
        app.scheduler.unregister_background_task().await?;
        formatter.success("Daemon stopped");
        Ok(())
    }
}
