//! Isolated handler invocation.
//!
//! Every hear or task handler runs as its own tracked tokio task. An error
//! or panic ends only that task and is posted, in a code block, to the
//! error-report channel. A failed report is logged and dropped.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use botkit_core::traits::{BotContext, Transport};
use botkit_core::types::{Message, PostOptions};
use botkit_scheduler::ScheduledTask;
use futures::FutureExt;
use tokio_util::task::TaskTracker;

use crate::rules::HearRule;

/// Spawns handlers with failure reporting. Cheap to clone.
#[derive(Clone)]
pub struct Invoker {
    transport: Arc<dyn Transport>,
    errors_to: Arc<str>,
    tracker: TaskTracker,
}

impl Invoker {
    pub fn new(transport: Arc<dyn Transport>, errors_to: impl Into<Arc<str>>) -> Self {
        Self {
            transport,
            errors_to: errors_to.into(),
            tracker: TaskTracker::new(),
        }
    }

    /// Tracker for every invocation spawned by this invoker.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn errors_to(&self) -> &str {
        &self.errors_to
    }

    fn context(&self) -> BotContext {
        BotContext::new(Arc::clone(&self.transport))
    }

    /// Run a hear rule's handler for a matched message.
    pub fn spawn_hear(&self, rule: &HearRule, message: Message, captures: Vec<Option<String>>) {
        let handler = Arc::clone(&rule.handler);
        let ctx = self.context();
        let label = format!("hear /{}/", rule.pattern.as_str());
        self.spawn_isolated(label, async move { handler.hear(ctx, message, captures).await });
    }

    /// Run a scheduled task's handler.
    pub fn spawn_task(&self, task: Arc<ScheduledTask>) {
        let ctx = self.context();
        let label = format!("task '{}'", task.name);
        self.spawn_isolated(label, async move { task.handler.run(ctx).await });
    }

    /// Spawn `work`, reporting its error or panic.
    pub fn spawn_isolated<F>(&self, label: String, work: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let transport = Arc::clone(&self.transport);
        let errors_to = Arc::clone(&self.errors_to);
        self.tracker.spawn(async move {
            let report = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => format!("{label} failed: {e:?}"),
                Err(panic) => format!("{label} panicked: {}", panic_message(panic.as_ref())),
            };
            tracing::warn!("⚠️ {report}");
            let text = format!("```{report}```");
            if let Err(e) = transport
                .post(&errors_to, &text, PostOptions::default())
                .await
            {
                tracing::error!("❌ Could not report failure to {errors_to}: {e}");
            }
        });
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("errors_to", &self.errors_to)
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
