//! Event Dispatcher — reads frames in order and fans matched messages out
//! to hear handlers.

use botkit_core::error::Result;
use botkit_core::traits::Connection;
use botkit_core::types::Frame;
use botkit_scheduler::SchedulerHandle;

use crate::builder::BotEngine;

pub struct Dispatcher<'a> {
    engine: &'a BotEngine,
}

impl<'a> Dispatcher<'a> {
    pub fn new(engine: &'a BotEngine) -> Self {
        Self { engine }
    }

    /// Read and dispatch frames until the connection fails.
    ///
    /// A quiet connection is not an error: each receive timeout logs the
    /// scheduler's state and keeps waiting.
    pub async fn run(
        &self,
        connection: &mut dyn Connection,
        scheduler: Option<&SchedulerHandle>,
    ) -> Result<()> {
        let timeout = self.engine.timings.receive_timeout;
        loop {
            let frame = match tokio::time::timeout(timeout, connection.receive()).await {
                Ok(frame) => frame?,
                Err(_) => {
                    let state = scheduler.map_or_else(|| "not started".to_string(), |s| s.state().to_string());
                    tracing::info!(
                        "💓 No frames for {}s; scheduler {state}; {} handlers in flight",
                        timeout.as_secs(),
                        self.engine.in_flight()
                    );
                    continue;
                }
            };
            self.handle_frame(&frame)?;
        }
    }

    /// Parse one frame and spawn every matching rule. Returns how many
    /// handlers were spawned.
    pub fn handle_frame(&self, frame: &Frame) -> Result<usize> {
        let transport = &self.engine.transport;
        let event = match transport.parse(frame) {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(0),
            Err(e) if e.is_channel_not_found() => {
                tracing::debug!("Dropping frame: {e}");
                return Ok(0);
            }
            Err(e) => return Err(e),
        };
        let Some(message) = event.message else {
            return Ok(0);
        };

        let me = transport.me();
        if me.as_deref() == Some(message.user.as_str()) {
            return Ok(0);
        }
        tracing::debug!(
            "📨 [{}] {}: {}",
            message.channel.name,
            message.user,
            message.text
        );

        let direct = transport.is_direct(&message.channel);
        let matched = self.engine.rules.matching(&message, me.as_deref(), direct);
        let spawned = matched.len();
        for (rule, captures) in matched {
            self.engine
                .invoker
                .spawn_hear(&rule, message.clone(), captures);
        }
        Ok(spawned)
    }
}
