//! # botkit Engine
//! The bot core: hear rules, the event dispatcher, isolated handler
//! invocation, and the connection supervisor that ties them to a transport
//! and the scheduler.
//!
//! ```text
//! BotEngine::run ── loop ──┐
//!   connect → prepare      │
//!   spawn scheduler ───────┼── tick → Invoker::spawn_task
//!   Dispatcher::run        │
//!     receive → parse → RuleRegistry::matching → Invoker::spawn_hear
//!   cancel scheduler, drain, close, cool down
//! ```

pub mod builder;
pub mod declarative;
pub mod dispatcher;
pub mod invoke;
pub mod rules;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{BotEngine, EngineBuilder, Timings};
pub use declarative::{Announce, TemplateReply, expand_template, install_declarative};
pub use dispatcher::Dispatcher;
pub use invoke::Invoker;
pub use rules::{HearRule, RuleRegistry};
