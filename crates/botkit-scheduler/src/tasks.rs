//! Task definitions: the registry of scheduled work.

use std::sync::Arc;

use botkit_core::traits::TaskHandler;

use crate::trigger::Trigger;

/// A scheduled task. Its id is its registration index.
pub struct ScheduledTask {
    pub id: usize,
    /// Human-readable name, for logs.
    pub name: String,
    pub trigger: Trigger,
    pub handler: Arc<dyn TaskHandler>,
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Tasks in registration order. Filled at startup, read-only afterwards.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<Arc<ScheduledTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task; returns its id.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        trigger: Trigger,
        handler: Arc<dyn TaskHandler>,
    ) -> usize {
        let id = self.tasks.len();
        let task = ScheduledTask {
            id,
            name: name.into(),
            trigger,
            handler,
        };
        tracing::info!("📅 Task registered: '{}' ({})", task.name, task.trigger);
        self.tasks.push(Arc::new(task));
        id
    }

    pub fn tasks(&self) -> &[Arc<ScheduledTask>] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
