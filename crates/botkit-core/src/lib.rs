//! # botkit core
//! Shared error type, configuration, message types, and the traits that
//! connect the engine to a chat platform (`Transport`) and to bot code
//! (`HearHandler`, `TaskHandler`).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::BotConfig;
pub use error::{BotError, Result};
pub use traits::{BotContext, Connection, HearHandler, TaskHandler, Transport};
pub use types::{ChannelInfo, Event, Frame, Message, PostOptions};
