//! Core types used throughout botkit.

pub mod channel;
pub mod message;

pub use channel::{ChannelDirectory, ChannelInfo};
pub use message::{Event, Frame, Message, PostOptions, angle_mention};
