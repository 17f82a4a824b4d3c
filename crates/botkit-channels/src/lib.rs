//! # botkit Channels
//! Chat platform transports.

pub mod console;
pub mod discord;
pub mod ws;

use std::sync::{Arc, LazyLock};

use botkit_core::error::{BotError, Result};
use botkit_core::traits::Transport;
use regex::Regex;

pub use console::ConsoleTransport;
pub use discord::{DiscordConfig, DiscordTransport};
pub use ws::WsConnection;

static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<@!?([^>]+)>").unwrap_or_else(|e| unreachable!("mention regex: {e}"))
});

/// User ids mentioned as `<@id>` or `<@!id>`, in order of appearance.
pub fn parse_mentions(text: &str) -> Vec<String> {
    MENTION
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Build a transport by name. An unknown name is a startup error.
pub fn create_transport(kind: &str, token: Option<String>) -> Result<Arc<dyn Transport>> {
    match kind {
        "discord" => {
            let token = token.ok_or_else(|| {
                BotError::config("Discord needs a token (--token, config, or BOTKIT_TOKEN)")
            })?;
            Ok(Arc::new(DiscordTransport::new(DiscordConfig::new(token))?))
        }
        "console" => Ok(Arc::new(ConsoleTransport::new())),
        other => Err(BotError::config(format!("Unknown transport '{other}'"))),
    }
}
