//! # botkit Scheduler
//!
//! Wall-clock task scheduler. A fixed-period tick loop evaluates every
//! registered trigger against a LastFired table that lives only as long as
//! one connection cycle.
//!
//! ## Architecture
//! ```text
//! SchedulerEngine (tokio interval, 1s)
//!   ├── Absolute:  "2026-02-22T15:00:00Z" → fire once
//!   ├── Recurring: every 30min           → fire, then wait a period
//!   ├── DailyAt:   08:00 Asia/Tokyo      → fire once a day
//!   └── on fire → record LastFired → fire callback (spawns the handler)
//! ```
//!
//! A task fires when its due instant has passed, it has not already fired
//! for that instant, and it is no more than the catch-up window late.

pub mod engine;
pub mod tasks;
pub mod trigger;

pub use engine::{SchedulerEngine, SchedulerHandle, SchedulerState, spawn_scheduler};
pub use tasks::{ScheduledTask, TaskRegistry};
pub use trigger::{Trigger, parse_period};
