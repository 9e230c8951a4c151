//! Background scheduler
//!
//! Runs the orchestrator opportunistically on a periodic schedule without
//! wasting battery or bandwidth: before triggering a full sync, the task
//! probes every table with a cheap limit-1 query and skips the run when
//! nothing changed.
//!
//! ## Flow
//!
//! ```text
//! OS runtime / run loop ──→ run_task() ──→ remote_changes_summary()
//!                                │
//!                     any changes? ──no──→ TaskOutcome::NoData
//!                                │
//!                               yes ──→ sync_all(Background) ──→ NewData / Failed
//! ```
//!
//! Each invocation is independent and stateless beyond what the cursors
//! persist, so an invocation killed by the OS time budget leaves nothing
//! half-applied (the store commits page by page).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use shelfsync_core::config::BackgroundConfig;
use shelfsync_core::ports::{BackgroundCapability, BackgroundRuntime, TaskOutcome, TaskRegistration};

use crate::orchestrator::{SyncMode, SyncOrchestrator};

/// OS-enforced floor for the background interval (15 minutes). Requests
/// below this are silently raised to it.
pub const MIN_BACKGROUND_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Decides when a background sync is worth running.
pub struct BackgroundScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    runtime: Arc<dyn BackgroundRuntime>,
    registration: TaskRegistration,
    initialized: AtomicBool,
}

impl BackgroundScheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        runtime: Arc<dyn BackgroundRuntime>,
        config: &BackgroundConfig,
    ) -> Self {
        let registration = TaskRegistration {
            task_name: config.task_name.clone(),
            minimum_interval: config.minimum_interval().max(MIN_BACKGROUND_INTERVAL),
            // The registration must survive process restarts
            stop_on_terminate: false,
            start_on_boot: true,
        };
        Self {
            orchestrator,
            runtime,
            registration,
            initialized: AtomicBool::new(false),
        }
    }

    /// Defines the background task handler. Idempotent: a second call is a
    /// logged no-op.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            debug!("Background scheduler already initialized, skipping");
        } else {
            info!(
                task = %self.registration.task_name,
                interval_secs = self.registration.minimum_interval.as_secs(),
                "Background task handler defined"
            );
        }
    }

    /// Whether [`initialize`](Self::initialize) has been called.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// One background task invocation.
    ///
    /// Probes for remote changes across all registered tables; only when at
    /// least one table reports changes does the heavier sync path run, with
    /// the reduced background batch size.
    pub async fn run_task(&self) -> TaskOutcome {
        if !self.is_initialized() {
            warn!("Background task invoked before initialize, failing");
            return TaskOutcome::Failed;
        }

        let summary = self.orchestrator.remote_changes_summary().await;
        let changed: Vec<&str> = summary
            .iter()
            .filter(|(_, changed)| **changed)
            .map(|(name, _)| name.as_str())
            .collect();

        if changed.is_empty() {
            info!("Background probe found no remote changes, skipping sync");
            return TaskOutcome::NoData;
        }

        info!(tables = ?changed, "Background probe found changes, syncing");
        match self.orchestrator.sync_all(SyncMode::Background).await {
            Ok(reports) => {
                if reports.iter().any(|r| r.success) {
                    TaskOutcome::NewData
                } else {
                    warn!("Every table failed during background sync");
                    TaskOutcome::Failed
                }
            }
            Err(err) => {
                warn!(error = %err, "Background sync rejected");
                TaskOutcome::Failed
            }
        }
    }

    /// Registers the periodic task with the OS runtime.
    ///
    /// When background execution is denied or restricted this is a logged
    /// no-op, not an error.
    pub async fn register_background_task(&self) -> anyhow::Result<()> {
        match self.runtime.capability().await {
            BackgroundCapability::Available => {
                self.runtime.register(self.registration.clone()).await?;
                info!(
                    task = %self.registration.task_name,
                    interval_secs = self.registration.minimum_interval.as_secs(),
                    "Background task registered"
                );
                Ok(())
            }
            status @ (BackgroundCapability::Denied | BackgroundCapability::Restricted) => {
                warn!(
                    status = ?status,
                    "Background execution unavailable, skipping registration"
                );
                Ok(())
            }
        }
    }

    /// Removes the registration. Tolerant of "not registered".
    pub async fn unregister_background_task(&self) -> anyhow::Result<()> {
        self.runtime
            .unregister(&self.registration.task_name)
            .await?;
        info!(task = %self.registration.task_name, "Background task unregistered");
        Ok(())
    }

    /// Whether the periodic task is currently registered. Pure query.
    pub async fn is_task_registered(&self) -> bool {
        self.runtime
            .is_registered(&self.registration.task_name)
            .await
    }

    /// OS-reported capability. Pure query.
    pub async fn capability(&self) -> BackgroundCapability {
        self.runtime.capability().await
    }

    /// The registration this scheduler uses (interval already floored).
    pub fn registration(&self) -> &TaskRegistration {
        &self.registration
    }

    /// Periodic run loop for in-process hosts (the CLI daemon).
    ///
    /// Invokes [`run_task`](Self::run_task) on the registration interval
    /// while the task is registered, until `shutdown` flips to `true` or
    /// its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.registration.minimum_interval.as_secs(),
            "Background scheduler loop starting"
        );
        let mut timer = tokio::time::interval(self.registration.minimum_interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if !self.is_task_registered().await {
                        debug!("Background task not registered, skipping tick");
                        continue;
                    }
                    let outcome = self.run_task().await;
                    info!(outcome = ?outcome, "Background task finished");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Background scheduler loop stopping");
                        break;
                    }
                }
            }
        }
    }
}
