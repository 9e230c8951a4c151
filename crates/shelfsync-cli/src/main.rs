//! shelfsync CLI - Command-line interface for the shelfsync engine
//!
//! Provides commands for:
//! - Running foreground syncs (incremental or forced full)
//! - Viewing local mirror status and sync cursors
//! - Probing the remote for pending changes
//! - Resetting sync metadata and clearing mirrored data
//! - Running the in-process background daemon

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod output;

use commands::{
    clear::ClearCommand, daemon::DaemonCommand, probe::ProbeCommand, reset::ResetCommand,
    status::StatusCommand, sync::SyncCommand,
};
use output::OutputFormat;
use shelfsync_core::config::Config;

#[derive(Debug, Parser)]
#[command(name = "shelfsync", version, about = "Offline-first library mirror")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize library content from the remote
    Sync(SyncCommand),
    /// Show local mirror status and sync cursors
    Status(StatusCommand),
    /// Check the remote for pending changes without syncing
    Probe(ProbeCommand),
    /// Rewind sync cursors to the beginning of time
    Reset(ResetCommand),
    /// Delete locally mirrored rows for a table
    Clear(ClearCommand),
    /// Run the periodic background sync loop in this process
    Daemon(DaemonCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()),
    };

    // Setup tracing: -v flags win over the configured level
    let filter = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(format, config).await,
        Commands::Status(cmd) => cmd.execute(format, config).await,
        Commands::Probe(cmd) => cmd.execute(format, config).await,
        Commands::Reset(cmd) => cmd.execute(format, config).await,
        Commands::Clear(cmd) => cmd.execute(format, config).await,
        Commands::Daemon(cmd) => cmd.execute(format, config).await,
    }
}
