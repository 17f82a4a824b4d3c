//! Connection supervisor: the outer reconnect loop.
//!
//! One cycle: connect, prepare, start a fresh scheduler, dispatch until
//! something fails. Whatever happened, the scheduler is cancelled, in-flight
//! handlers get an optional grace period, the connection is closed, and the
//! loop cools down before trying again.

use std::sync::Arc;

use botkit_core::error::Result;
use botkit_core::traits::Connection;
use botkit_scheduler::{SchedulerEngine, SchedulerHandle, spawn_scheduler};

use crate::builder::BotEngine;
use crate::dispatcher::Dispatcher;

impl BotEngine {
    /// Run connection cycles forever. Errors are logged, never returned.
    pub async fn run(&self) {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            tracing::info!("🔌 Connecting via {} (cycle {cycle})", self.transport.name());
            match self.run_cycle().await {
                Ok(()) => tracing::warn!("⚠️ Connection cycle ended"),
                Err(e) => tracing::error!("❌ Connection cycle failed: {e}"),
            }
            let cooldown = self.timings.reconnect_cooldown;
            tracing::info!("⏳ Reconnecting in {}s", cooldown.as_secs());
            tokio::time::sleep(cooldown).await;
        }
    }

    /// One connection cycle. The connection is closed on every path.
    pub async fn run_cycle(&self) -> Result<()> {
        let mut connection = self.transport.connect().await?;
        let result = self.serve(connection.as_mut()).await;
        if let Err(e) = connection.close().await {
            tracing::warn!("⚠️ Closing connection failed: {e}");
        }
        result
    }

    async fn serve(&self, connection: &mut dyn Connection) -> Result<()> {
        self.transport.prepare(connection).await?;
        tracing::info!("✅ {} ready", self.transport.name());

        let scheduler = self.start_scheduler();
        let result = Dispatcher::new(self).run(connection, Some(&scheduler)).await;

        scheduler.shutdown().await;
        self.drain().await;
        result
    }

    fn start_scheduler(&self) -> SchedulerHandle {
        let engine = SchedulerEngine::new(Arc::clone(&self.tasks), self.timings.catch_up);
        let invoker = self.invoker.clone();
        spawn_scheduler(engine, self.timings.tick, move |task| {
            invoker.spawn_task(task)
        })
    }

    /// Wait up to the drain timeout for running handlers. They are never
    /// aborted; stragglers keep running into the next cycle.
    async fn drain(&self) {
        let tracker = self.invoker.tracker();
        let in_flight = tracker.len();
        if in_flight == 0 {
            return;
        }
        let limit = self.timings.drain_timeout;
        if limit.is_zero() {
            tracing::info!("{in_flight} handlers still running at cycle end");
            return;
        }
        tracker.close();
        let drained = tokio::time::timeout(limit, tracker.wait()).await.is_ok();
        tracker.reopen();
        if drained {
            tracing::info!("Drained {in_flight} in-flight handlers");
        } else {
            tracing::warn!(
                "⚠️ {} handlers still running after {}s drain",
                tracker.len(),
                limit.as_secs()
            );
        }
    }
}
