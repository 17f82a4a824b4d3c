//! Hear rules: pattern, channel filter, ambient flag, handler.

use std::sync::Arc;

use botkit_core::error::{BotError, Result};
use botkit_core::traits::HearHandler;
use botkit_core::types::Message;
use regex::Regex;

/// A registered hear rule. Immutable once registered.
pub struct HearRule {
    pub pattern: Regex,
    /// Channel references (`id` or `#name`); empty means every channel.
    pub channels: Vec<String>,
    /// Fire without a mention or direct message.
    pub ambient: bool,
    pub handler: Arc<dyn HearHandler>,
}

impl HearRule {
    /// Captured groups if this rule fires for `message`.
    ///
    /// `me` is the bot's identity and `direct` whether the message arrived
    /// in a direct-message channel.
    pub fn matches(
        &self,
        message: &Message,
        me: Option<&str>,
        direct: bool,
    ) -> Option<Vec<Option<String>>> {
        if !self.channels.is_empty() && !self.channels.iter().any(|c| message.channel.matches(c)) {
            return None;
        }
        let addressed = self.ambient || direct || me.is_some_and(|me| message.mentions_user(me));
        if !addressed {
            return None;
        }
        let caps = self.pattern.captures(&message.text)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|group| group.map(|g| g.as_str().to_string()))
                .collect(),
        )
    }
}

impl std::fmt::Debug for HearRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HearRule")
            .field("pattern", &self.pattern.as_str())
            .field("channels", &self.channels)
            .field("ambient", &self.ambient)
            .finish_non_exhaustive()
    }
}

/// Rules in registration order.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<HearRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and append the rule. An invalid pattern is a
    /// config error.
    pub fn register(
        &mut self,
        pattern: &str,
        channels: Vec<String>,
        ambient: bool,
        handler: Arc<dyn HearHandler>,
    ) -> Result<usize> {
        let pattern = Regex::new(pattern)
            .map_err(|e| BotError::config(format!("Invalid hear pattern '{pattern}': {e}")))?;
        tracing::info!(
            "👂 Hear rule registered: /{}/{}",
            pattern.as_str(),
            if ambient { " (ambient)" } else { "" }
        );
        self.rules.push(Arc::new(HearRule {
            pattern,
            channels,
            ambient,
            handler,
        }));
        Ok(self.rules.len() - 1)
    }

    /// Every rule that fires for `message`, in registration order.
    pub fn matching(
        &self,
        message: &Message,
        me: Option<&str>,
        direct: bool,
    ) -> Vec<(Arc<HearRule>, Vec<Option<String>>)> {
        self.rules
            .iter()
            .filter_map(|rule| {
                rule.matches(message, me, direct)
                    .map(|caps| (Arc::clone(rule), caps))
            })
            .collect()
    }

    pub fn rules(&self) -> &[Arc<HearRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
