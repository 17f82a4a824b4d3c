//! Inbound frames, normalized events, and chat messages.

use serde::{Deserialize, Serialize};

use super::channel::ChannelInfo;

/// A raw inbound unit read off a connection, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: String,
}

impl Frame {
    pub fn text(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

/// A chat message addressed to the bot's hearing.
#[derive(Debug, Clone)]
pub struct Message {
    pub channel: ChannelInfo,
    /// Sender id.
    pub user: String,
    /// Mentioned user ids, in order of appearance.
    pub mentions: Vec<String>,
    pub text: String,
    /// Renders a user id as a mention on the originating platform.
    pub create_mention: fn(&str) -> String,
}

impl Message {
    pub fn new(channel: ChannelInfo, user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel,
            user: user.into(),
            mentions: Vec::new(),
            text: text.into(),
            create_mention: angle_mention,
        }
    }

    pub fn with_mentions(mut self, mentions: Vec<String>) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn mentions_user(&self, user: &str) -> bool {
        self.mentions.iter().any(|m| m == user)
    }

    /// The text of a reply to the sender: their mention, a space, the body.
    pub fn reply_text(&self, body: &str) -> String {
        format!("{} {}", (self.create_mention)(&self.user), body)
    }
}

/// `<@user>`, the mention syntax shared by Slack and Discord.
pub fn angle_mention(user: &str) -> String {
    format!("<@{user}>")
}

/// A parsed inbound notification. Events without a message (channel
/// metadata changes and the like) are never dispatched to rules.
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub channel: Option<ChannelInfo>,
    pub message: Option<Message>,
}

impl Event {
    pub fn message(message: Message) -> Self {
        Self {
            channel: Some(message.channel.clone()),
            message: Some(message),
        }
    }
}

/// Optional extras for an outbound post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<serde_json::Value>,
    /// Thread to reply into, when the platform has threads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
}
