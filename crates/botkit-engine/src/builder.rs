//! The engine value and its builder.
//!
//! Rules and tasks are registered on an [`EngineBuilder`] at startup; `build`
//! freezes them into a [`BotEngine`] that the supervisor runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use botkit_core::config::TimingsConfig;
use botkit_core::error::Result;
use botkit_core::traits::{BotContext, HearHandler, TaskHandler, Transport};
use botkit_core::types::Message;
use botkit_scheduler::{TaskRegistry, Trigger};

use crate::invoke::Invoker;
use crate::rules::RuleRegistry;

/// Loop periods and windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub receive_timeout: Duration,
    pub tick: Duration,
    pub catch_up: Duration,
    pub reconnect_cooldown: Duration,
    /// Zero means a cycle end does not wait for in-flight handlers.
    pub drain_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self::from(&TimingsConfig::default())
    }
}

impl From<&TimingsConfig> for Timings {
    fn from(cfg: &TimingsConfig) -> Self {
        Self {
            // Zero periods would spin.
            receive_timeout: Duration::from_secs(cfg.receive_timeout_secs.max(1)),
            tick: Duration::from_secs(cfg.tick_secs.max(1)),
            catch_up: Duration::from_secs(cfg.catch_up_secs),
            reconnect_cooldown: Duration::from_secs(cfg.reconnect_cooldown_secs),
            drain_timeout: Duration::from_secs(cfg.drain_timeout_secs),
        }
    }
}

/// A fully wired bot: registries, transport, error channel, timings.
pub struct BotEngine {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) rules: Arc<RuleRegistry>,
    pub(crate) tasks: Arc<TaskRegistry>,
    pub(crate) timings: Timings,
    pub(crate) invoker: Invoker,
}

impl BotEngine {
    pub fn builder(transport: Arc<dyn Transport>) -> EngineBuilder {
        EngineBuilder::new(transport)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn errors_to(&self) -> &str {
        self.invoker.errors_to()
    }

    /// Handler invocations currently running.
    pub fn in_flight(&self) -> usize {
        self.invoker.tracker().len()
    }
}

impl std::fmt::Debug for BotEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotEngine")
            .field("transport", &self.transport.name())
            .field("rules", &self.rules.len())
            .field("tasks", &self.tasks.len())
            .field("timings", &self.timings)
            .field("errors_to", &self.errors_to())
            .finish()
    }
}

/// Collects rules and tasks before the engine starts.
pub struct EngineBuilder {
    transport: Arc<dyn Transport>,
    rules: RuleRegistry,
    tasks: TaskRegistry,
    errors_to: String,
    timings: Timings,
}

impl EngineBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            rules: RuleRegistry::new(),
            tasks: TaskRegistry::new(),
            errors_to: "#errors".into(),
            timings: Timings::default(),
        }
    }

    /// Channel reference that receives handler failure reports.
    pub fn errors_to(mut self, channel: impl Into<String>) -> Self {
        self.errors_to = channel.into();
        self
    }

    pub fn timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Register a hear rule with a closure or async fn handler.
    pub fn hear<F, Fut>(
        &mut self,
        pattern: &str,
        channels: Vec<String>,
        ambient: bool,
        handler: F,
    ) -> Result<&mut Self>
    where
        F: Fn(BotContext, Message, Vec<Option<String>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hear_with(pattern, channels, ambient, Arc::new(handler))
    }

    /// Register a hear rule with a shared handler object.
    pub fn hear_with(
        &mut self,
        pattern: &str,
        channels: Vec<String>,
        ambient: bool,
        handler: Arc<dyn HearHandler>,
    ) -> Result<&mut Self> {
        self.rules.register(pattern, channels, ambient, handler)?;
        Ok(self)
    }

    /// Register a scheduled task with a closure or async fn handler.
    pub fn task<F, Fut>(&mut self, name: impl Into<String>, trigger: Trigger, handler: F) -> &mut Self
    where
        F: Fn(BotContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.task_with(name, trigger, Arc::new(handler))
    }

    pub fn task_with(
        &mut self,
        name: impl Into<String>,
        trigger: Trigger,
        handler: Arc<dyn TaskHandler>,
    ) -> &mut Self {
        self.tasks.register(name, trigger, handler);
        self
    }

    pub fn build(self) -> BotEngine {
        tracing::info!(
            "🤖 Engine ready: {} hear rules, {} tasks, transport {}, errors to {}",
            self.rules.len(),
            self.tasks.len(),
            self.transport.name(),
            self.errors_to
        );
        let invoker = Invoker::new(Arc::clone(&self.transport), self.errors_to);
        BotEngine {
            transport: self.transport,
            rules: Arc::new(self.rules),
            tasks: Arc::new(self.tasks),
            timings: self.timings,
            invoker,
        }
    }
}
