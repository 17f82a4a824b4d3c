//! Scheduler engine: the tick loop that checks and fires tasks.
//! Uses tokio::interval for ticking; a cancellation token stops it between
//! ticks, so cancellation is observed within one tick body.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::tasks::{ScheduledTask, TaskRegistry};

/// One connection cycle's scheduler: the shared task registry plus a
/// private LastFired table. Build a new one per cycle.
pub struct SchedulerEngine {
    registry: Arc<TaskRegistry>,
    last_fired: HashMap<usize, DateTime<Utc>>,
    catch_up: TimeDelta,
}

impl SchedulerEngine {
    /// Create an engine with an empty LastFired table.
    pub fn new(registry: Arc<TaskRegistry>, catch_up: Duration) -> Self {
        Self {
            registry,
            last_fired: HashMap::new(),
            catch_up: TimeDelta::from_std(catch_up).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Evaluate every task at `now`. Returns the tasks that fire,
    /// in registration order, with their LastFired entries already set.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Arc<ScheduledTask>> {
        let mut fired = Vec::new();
        for task in self.registry.tasks() {
            let last = self.last_fired.get(&task.id).copied();
            if task.trigger.should_fire(now, last, self.catch_up) {
                tracing::info!("🔔 Task triggered: '{}'", task.name);
                self.last_fired.insert(task.id, now);
                fired.push(Arc::clone(task));
            }
        }
        fired
    }

    pub fn last_fired(&self, task_id: usize) -> Option<DateTime<Utc>> {
        self.last_fired.get(&task_id).copied()
    }

    /// Run the tick loop until `cancel` fires. `fire` is called once per
    /// due task and must not block; it is expected to spawn.
    pub async fn run<F>(mut self, period: Duration, cancel: CancellationToken, fire: F)
    where
        F: Fn(Arc<ScheduledTask>),
    {
        tracing::info!(
            "⏰ Scheduler started ({} tasks, tick every {}s)",
            self.registry.len(),
            period.as_secs_f64()
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let clock = LoopClock::start();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            for task in self.tick(clock.now()) {
                fire(task);
            }
        }

        tracing::info!("⏰ Scheduler stopped");
    }
}

/// Wall time read through the tokio clock: the wall time at loop start
/// plus tokio's elapsed time, so a paused runtime also pauses triggers.
struct LoopClock {
    wall: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl LoopClock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            started: tokio::time::Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.started.elapsed())
            .ok()
            .and_then(|elapsed| self.wall.checked_add_signed(elapsed))
            .unwrap_or_else(Utc::now)
    }
}

/// Observable state of a scheduler task, for liveness diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Cancelled,
    /// Ended without being cancelled.
    Finished,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Cancelled => write!(f, "cancelled"),
            SchedulerState::Finished => write!(f, "finished (not cancelled)"),
        }
    }
}

/// A spawned scheduler loop. Dropping the handle cancels the loop.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    _guard: DropGuard,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        if self.cancel.is_cancelled() {
            SchedulerState::Cancelled
        } else if self.join.is_finished() {
            SchedulerState::Finished
        } else {
            SchedulerState::Running
        }
    }

    /// Signal the loop to stop; it exits at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            tracing::warn!("⚠️ Scheduler task ended abnormally: {e}");
        }
    }
}

/// Spawn the scheduler loop as a background tokio task.
pub fn spawn_scheduler<F>(engine: SchedulerEngine, period: Duration, fire: F) -> SchedulerHandle
where
    F: Fn(Arc<ScheduledTask>) + Send + 'static,
{
    let cancel = CancellationToken::new();
    let join = tokio::spawn(engine.run(period, cancel.clone(), fire));
    SchedulerHandle {
        _guard: cancel.clone().drop_guard(),
        cancel,
        join,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::Trigger;
    use botkit_core::traits::BotContext;
    use chrono::{NaiveTime, TimeZone};
    use std::sync::Mutex;

    async fn noop(_ctx: BotContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn registry(triggers: Vec<Trigger>) -> Arc<TaskRegistry> {
        let mut reg = TaskRegistry::new();
        for (i, t) in triggers.into_iter().enumerate() {
            reg.register(format!("task-{i}"), t, Arc::new(noop));
        }
        Arc::new(reg)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 22, 10, 0, 0).unwrap()
    }

    fn ticks(engine: &mut SchedulerEngine, from: DateTime<Utc>, seconds: i64) -> Vec<i64> {
        (0..seconds)
            .filter(|s| !engine.tick(from + TimeDelta::seconds(*s)).is_empty())
            .collect()
    }

    #[test]
    fn test_recurring_fires_first_tick_then_every_period() {
        let reg = registry(vec![Trigger::every(Duration::from_secs(5))]);
        let mut engine = SchedulerEngine::new(reg, Duration::from_secs(60));
        assert_eq!(ticks(&mut engine, t0(), 16), vec![0, 5, 10, 15]);
        assert_eq!(engine.last_fired(0), Some(t0() + TimeDelta::seconds(15)));
    }

    #[test]
    fn test_absolute_fires_at_most_once() {
        let reg = registry(vec![Trigger::Absolute(t0() + TimeDelta::seconds(3))]);
        let mut engine = SchedulerEngine::new(reg, Duration::from_secs(60));
        assert_eq!(ticks(&mut engine, t0(), 120), vec![3]);
    }

    #[test]
    fn test_absolute_missed_window_never_fires() {
        let reg = registry(vec![Trigger::Absolute(t0() - TimeDelta::seconds(61))]);
        let mut engine = SchedulerEngine::new(reg, Duration::from_secs(60));
        assert!(ticks(&mut engine, t0(), 10).is_empty());
    }

    #[test]
    fn test_daily_fires_once_per_day() {
        let time = NaiveTime::from_hms_opt(10, 0, 30).unwrap();
        let reg = registry(vec![Trigger::daily(time, chrono_tz::Tz::UTC)]);
        let mut engine = SchedulerEngine::new(reg, Duration::from_secs(60));
        // Ticks every second through the whole fire window.
        assert_eq!(ticks(&mut engine, t0(), 180), vec![30]);
        let next_day = t0() + TimeDelta::days(1);
        assert_eq!(ticks(&mut engine, next_day, 180), vec![30]);
    }

    #[test]
    fn test_daily_late_start_within_window() {
        let time = NaiveTime::from_hms_opt(9, 59, 20).unwrap();
        let reg = registry(vec![Trigger::daily(time, chrono_tz::Tz::UTC)]);
        let mut engine = SchedulerEngine::new(reg, Duration::from_secs(60));
        // First observed 40s late: still inside the catch-up window.
        assert_eq!(ticks(&mut engine, t0(), 5), vec![0]);
    }

    #[test]
    fn test_fresh_engine_has_empty_table() {
        let reg = registry(vec![Trigger::every(Duration::from_secs(3600))]);
        let mut first = SchedulerEngine::new(Arc::clone(&reg), Duration::from_secs(60));
        assert_eq!(first.tick(t0()).len(), 1);
        assert!(first.tick(t0() + TimeDelta::seconds(1)).is_empty());

        // A new cycle forgets the previous fire.
        let mut second = SchedulerEngine::new(reg, Duration::from_secs(60));
        assert_eq!(second.last_fired(0), None);
        assert_eq!(second.tick(t0() + TimeDelta::seconds(2)).len(), 1);
    }

    #[test]
    fn test_all_due_tasks_fire_in_registration_order() {
        let reg = registry(vec![
            Trigger::every(Duration::from_secs(10)),
            Trigger::Absolute(t0() + TimeDelta::hours(1)),
            Trigger::every(Duration::from_secs(10)),
        ]);
        let mut engine = SchedulerEngine::new(reg, Duration::from_secs(60));
        let ids: Vec<usize> = engine.tick(t0()).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_unrepresentable_next_fire_does_not_stall_others() {
        let reg = registry(vec![
            Trigger::Recurring(TimeDelta::MAX),
            Trigger::every(Duration::from_secs(5)),
        ]);
        let mut engine = SchedulerEngine::new(reg, Duration::from_secs(60));
        let fired: Vec<Vec<usize>> = (0..11)
            .map(|s| {
                engine
                    .tick(t0() + TimeDelta::seconds(s))
                    .iter()
                    .map(|t| t.id)
                    .collect()
            })
            .filter(|ids: &Vec<usize>| !ids.is_empty())
            .collect();
        assert_eq!(fired, vec![vec![0, 1], vec![1], vec![1]]);
        assert_eq!(engine.last_fired(0), Some(t0()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_clock_follows_paused_time() {
        let reg = registry(vec![Trigger::every(Duration::from_secs(2))]);
        let engine = SchedulerEngine::new(reg, Duration::from_secs(60));
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let start = tokio::time::Instant::now();

        let handle = spawn_scheduler(engine, Duration::from_secs(1), move |_task| {
            sink.lock().unwrap().push(start.elapsed().as_secs());
        });
        tokio::time::sleep(Duration::from_millis(6500)).await;
        handle.shutdown().await;

        assert_eq!(*fired.lock().unwrap(), vec![0, 2, 4, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_fires_and_cancels() {
        let reg = registry(vec![Trigger::Absolute(Utc::now() - TimeDelta::seconds(1))]);
        let engine = SchedulerEngine::new(reg, Duration::from_secs(60));
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);

        let handle = spawn_scheduler(engine, Duration::from_secs(1), move |task| {
            sink.lock().unwrap().push(task.id);
        });
        assert_eq!(handle.state(), SchedulerState::Running);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*fired.lock().unwrap(), vec![0]);

        handle.cancel();
        assert_eq!(handle.state(), SchedulerState::Cancelled);
        handle.shutdown().await;
    }
}
