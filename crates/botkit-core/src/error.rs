//! Unified error types for botkit.

use thiserror::Error;

/// Result type alias using BotError.
pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    // Channel errors
    #[error("Channel error: {0}")]
    Channel(String),

    /// A frame or post referenced a channel the transport does not know.
    /// The dispatcher treats this one as transient.
    #[error("Channel {0} could not be found")]
    ChannelNotFound(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    // Inbound frame decoding
    #[error("Parse error: {0}")]
    Parse(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl BotError {
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for the one parse failure the dispatcher drops silently.
    pub fn is_channel_not_found(&self) -> bool {
        matches!(self, Self::ChannelNotFound(_))
    }
}
