//! Trait seams: the platform side (`Transport`, `Connection`) and the bot
//! code side (`HearHandler`, `TaskHandler`).

pub mod handler;
pub mod transport;

pub use handler::{BotContext, HearHandler, TaskHandler};
pub use transport::{Connection, FrameSender, Transport};
