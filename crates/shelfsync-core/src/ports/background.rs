//! Background task registration port
//!
//! Models the OS-level background scheduling facility: capability status,
//! periodic task registration with persistence flags, and idempotent
//! unregistration. The scheduler in `shelfsync-engine` drives this port;
//! each task invocation is independent and stateless beyond what is
//! persisted in sync cursors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// OS-reported capability for background execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundCapability {
    /// Background tasks may be registered and will run.
    Available,
    /// The user denied background execution.
    Denied,
    /// The OS restricts background execution (low power, parental controls).
    Restricted,
}

/// Outcome of one background task invocation, reported back to the OS
/// runtime so it can tune future scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// New rows were mirrored.
    NewData,
    /// The probe found nothing to sync.
    NoData,
    /// The invocation failed.
    Failed,
}

/// A periodic background task registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRegistration {
    /// Stable task identifier.
    pub task_name: String,
    /// Requested minimum interval between invocations. The OS may enforce
    /// a larger floor.
    pub minimum_interval: Duration,
    /// Drop the registration when the process terminates.
    pub stop_on_terminate: bool,
    /// Re-arm the registration after device boot.
    pub start_on_boot: bool,
}

/// Port trait for the OS background-task facility.
#[async_trait::async_trait]
pub trait BackgroundRuntime: Send + Sync {
    /// Current capability status. Pure query, never mutates state.
    async fn capability(&self) -> BackgroundCapability;

    /// Registers a periodic task. Re-registering the same task name
    /// replaces the previous registration.
    async fn register(&self, registration: TaskRegistration) -> anyhow::Result<()>;

    /// Removes a registration. Unregistering a task that was never
    /// registered is a success, not an error.
    async fn unregister(&self, task_name: &str) -> anyhow::Result<()>;

    /// Whether a registration exists for `task_name`. Pure query.
    async fn is_registered(&self, task_name: &str) -> bool;
}
