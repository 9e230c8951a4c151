//! In-process background runtime
//!
//! [`InProcessRuntime`] implements the [`BackgroundRuntime`] port with plain
//! in-memory registration bookkeeping. It backs the CLI daemon (where the
//! process itself is the scheduler) and the engine's tests; platform
//! integrations substitute their own implementation of the port.

use std::collections::HashMap;
use std::sync::Mutex;

use shelfsync_core::ports::{BackgroundCapability, BackgroundRuntime, TaskRegistration};

/// Background runtime backed by in-memory registration state.
pub struct InProcessRuntime {
    capability: BackgroundCapability,
    registrations: Mutex<HashMap<String, TaskRegistration>>,
}

impl InProcessRuntime {
    pub fn new(capability: BackgroundCapability) -> Self {
        Self {
            capability,
            registrations: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TaskRegistration>> {
        match self.registrations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The stored registration for a task, if any.
    pub fn registration(&self, task_name: &str) -> Option<TaskRegistration> {
        self.lock().get(task_name).cloned()
    }
}

#[async_trait::async_trait]
impl BackgroundRuntime for InProcessRuntime {
    async fn capability(&self) -> BackgroundCapability {
        self.capability
    }

    async fn register(&self, registration: TaskRegistration) -> anyhow::Result<()> {
        self.lock()
            .insert(registration.task_name.clone(), registration);
        Ok(())
    }

    async fn unregister(&self, task_name: &str) -> anyhow::Result<()> {
        // Absent registrations are a success, not an error
        self.lock().remove(task_name);
        Ok(())
    }

    async fn is_registered(&self, task_name: &str) -> bool {
        self.lock().contains_key(task_name)
    }
}
