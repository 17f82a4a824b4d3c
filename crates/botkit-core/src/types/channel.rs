//! Channel identity and the per-connection channel directory.

use serde::{Deserialize, Serialize};

use crate::error::{BotError, Result};

/// A chat channel as the platform reports it.
#[derive(Debug, Clone, Serialize, Deserialize, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

impl ChannelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Does a channel reference point at this channel?
    /// `#general` matches by name, anything else matches by id.
    pub fn matches(&self, reference: &str) -> bool {
        match reference.strip_prefix('#') {
            Some(name) => name == self.name,
            None => reference == self.id,
        }
    }
}

impl PartialEq for ChannelInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::fmt::Display for ChannelInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Known channels for one transport: direct-message channels and
/// regular channels, in the order the platform announced them.
#[derive(Debug, Clone, Default)]
pub struct ChannelDirectory {
    ims: Vec<ChannelInfo>,
    channels: Vec<ChannelInfo>,
}

impl ChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the regular channel list (e.g. after a fresh handshake).
    pub fn set_channels(&mut self, channels: Vec<ChannelInfo>) {
        self.channels = channels;
    }

    /// Add a regular channel unless one with the same id is known.
    pub fn add_channel(&mut self, channel: ChannelInfo) {
        if !self.channels.contains(&channel) {
            self.channels.push(channel);
        }
    }

    /// Add a direct-message channel unless one with the same id is known.
    pub fn add_im(&mut self, channel: ChannelInfo) {
        if !self.ims.contains(&channel) {
            self.ims.push(channel);
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.channels.len() + self.ims.len();
        self.channels.retain(|c| c.id != id);
        self.ims.retain(|c| c.id != id);
        before != self.channels.len() + self.ims.len()
    }

    /// Resolve an id or `#name` reference. DMs are searched first.
    pub fn find(&self, reference: &str) -> Result<ChannelInfo> {
        self.ims
            .iter()
            .chain(self.channels.iter())
            .find(|c| c.matches(reference))
            .cloned()
            .ok_or_else(|| BotError::ChannelNotFound(reference.to_string()))
    }

    pub fn is_im(&self, channel: &ChannelInfo) -> bool {
        self.ims.contains(channel)
    }

    pub fn len(&self) -> usize {
        self.ims.len() + self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
