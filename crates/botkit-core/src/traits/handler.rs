//! Handler traits for bot code, and the context handlers talk back through.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::transport::Transport;
use crate::error::Result;
use crate::types::{Message, PostOptions};

/// What a running handler can reach: the transport, for posting.
#[derive(Clone)]
pub struct BotContext {
    transport: Arc<dyn Transport>,
}

impl BotContext {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// The bot's own user id, once the transport knows it.
    pub fn me(&self) -> Option<String> {
        self.transport.me()
    }

    pub async fn post(&self, channel: &str, text: &str) -> Result<()> {
        self.transport
            .post(channel, text, PostOptions::default())
            .await
    }

    pub async fn post_with(&self, channel: &str, text: &str, options: PostOptions) -> Result<()> {
        self.transport.post(channel, text, options).await
    }

    /// Post `<mention of sender> text` into the message's channel.
    pub async fn reply(&self, message: &Message, text: &str) -> Result<()> {
        self.transport
            .post(
                &message.channel.id,
                &message.reply_text(text),
                PostOptions::default(),
            )
            .await
    }
}

impl std::fmt::Debug for BotContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotContext")
            .field("transport", &self.transport.name())
            .finish()
    }
}

/// Handler for a matched hear rule. Receives the message and the
/// rule pattern's capture groups (`None` for a group that did not take part).
#[async_trait]
pub trait HearHandler: Send + Sync {
    async fn hear(
        &self,
        ctx: BotContext,
        message: Message,
        captures: Vec<Option<String>>,
    ) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> HearHandler for F
where
    F: Fn(BotContext, Message, Vec<Option<String>>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn hear(
        &self,
        ctx: BotContext,
        message: Message,
        captures: Vec<Option<String>>,
    ) -> anyhow::Result<()> {
        (self)(ctx, message, captures).await
    }
}

/// Handler for a scheduled task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, ctx: BotContext) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(BotContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: BotContext) -> anyhow::Result<()> {
        (self)(ctx).await
    }
}
