//! Transport trait: one chat platform's connection lifecycle, frame
//! decoding, and outbound posting.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChannelInfo, Event, Frame, PostOptions};

/// Queue for frames written by background work (e.g. a heartbeat) while
/// the dispatcher owns the connection. Sends fail once the connection closes.
pub type FrameSender = tokio::sync::mpsc::UnboundedSender<Frame>;

/// A live connection to the platform. Owned by exactly one connection
/// cycle; the supervisor closes it on every exit path.
#[async_trait]
pub trait Connection: Send {
    /// Wait for the next raw frame. A closed connection is an error.
    async fn receive(&mut self) -> Result<Frame>;

    /// Send a raw frame on the connection.
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// A sender for background writers, if the connection supports one.
    fn sender(&self) -> Option<FrameSender> {
        None
    }

    /// Release the connection. Must be safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// A chat platform.
///
/// `parse` and the identity accessors are synchronous; implementations keep
/// platform state (channel lists, bot id) behind interior mutability so a
/// single `Arc<dyn Transport>` can be shared by the dispatcher, the
/// scheduler, and every running handler.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short transport name for logs.
    fn name(&self) -> &str;

    /// Open a connection. Fails if the platform rejects the handshake.
    async fn connect(&self) -> Result<Box<dyn Connection>>;

    /// Complete the platform readiness handshake. May consume frames.
    async fn prepare(&self, connection: &mut dyn Connection) -> Result<()>;

    /// Decode a frame.
    ///
    /// `Ok(None)` is a control frame with nothing to dispatch.
    /// `Err(BotError::ChannelNotFound)` is a frame naming a channel the
    /// transport does not know; any other error is fatal to the session.
    fn parse(&self, frame: &Frame) -> Result<Option<Event>>;

    /// Send a message to a channel reference (`id` or `#name`).
    async fn post(&self, channel: &str, text: &str, options: PostOptions) -> Result<()>;

    /// The bot's own user id, once known.
    fn me(&self) -> Option<String>;

    /// Is this a direct-message channel with the bot?
    fn is_direct(&self, channel: &ChannelInfo) -> bool;
}
