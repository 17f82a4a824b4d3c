//! botkit configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BotError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    /// Channel reference (`id` or `#name`) that receives handler failure reports.
    #[serde(default = "default_errors_to")]
    pub errors_to: String,
    /// Built-in bot modules to install.
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,
    #[serde(default)]
    pub timings: TimingsConfig,
    /// Declarative hear rules.
    #[serde(default)]
    pub hears: Vec<HearConfig>,
    /// Declarative scheduled tasks.
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

fn default_errors_to() -> String { "#errors".into() }
fn default_modules() -> Vec<String> { vec!["hello".into()] }

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            errors_to: default_errors_to(),
            modules: default_modules(),
            timings: TimingsConfig::default(),
            hears: Vec::new(),
            tasks: Vec::new(),
        }
    }
}

impl BotConfig {
    /// Load config from the default path (~/.botkit/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BotError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| BotError::Config(format!("Failed to read config: {e}")))?;
        Self::parse(&content)
    }

    /// Parse config from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BotError::Config(format!("Failed to parse config: {e}")))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the botkit home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".botkit")
    }
}

/// Which platform to talk to, and how to authenticate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_transport_kind")]
    pub kind: String,
    /// Auth token. Falls back to `BOTKIT_TOKEN` when empty.
    #[serde(default)]
    pub token: String,
}

fn default_transport_kind() -> String { "discord".into() }

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
            token: String::new(),
        }
    }
}

impl TransportConfig {
    /// Token from config, else from the environment.
    pub fn resolved_token(&self) -> Option<String> {
        if !self.token.is_empty() {
            return Some(self.token.clone());
        }
        std::env::var("BOTKIT_TOKEN").ok().filter(|t| !t.is_empty())
    }
}

/// Loop periods and windows, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingsConfig {
    /// How long the dispatcher waits for a frame before logging liveness.
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_secs: u64,
    /// Scheduler tick period.
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    /// Maximum lateness at which a due task still fires.
    #[serde(default = "default_catch_up")]
    pub catch_up_secs: u64,
    /// Pause between connection cycles.
    #[serde(default = "default_cooldown")]
    pub reconnect_cooldown_secs: u64,
    /// How long a cycle end waits for in-flight handlers (0 = don't wait).
    #[serde(default)]
    pub drain_timeout_secs: u64,
}

fn default_receive_timeout() -> u64 { 60 }
fn default_tick() -> u64 { 1 }
fn default_catch_up() -> u64 { 60 }
fn default_cooldown() -> u64 { 30 }

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            receive_timeout_secs: default_receive_timeout(),
            tick_secs: default_tick(),
            catch_up_secs: default_catch_up(),
            reconnect_cooldown_secs: default_cooldown(),
            drain_timeout_secs: 0,
        }
    }
}

/// A hear rule declared in config: reply with fixed text on match.
/// `$1`..`$n` in `reply` are replaced by the pattern's capture groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HearConfig {
    pub pattern: String,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub ambient: bool,
    pub reply: String,
}

/// A scheduled task declared in config: post `text` to `channel`.
/// Exactly one of `at`, `every`, `daily` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub channel: String,
    pub text: String,
    /// RFC 3339 instant.
    #[serde(default)]
    pub at: Option<String>,
    /// Period such as `30s`, `5m`, `2h`, `1d`.
    #[serde(default)]
    pub every: Option<String>,
    /// Time of day, `HH:MM` or `HH:MM:SS`.
    #[serde(default)]
    pub daily: Option<String>,
    /// IANA timezone for `daily`. Defaults to UTC.
    #[serde(default)]
    pub tz: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = BotConfig::default();
        assert_eq!(cfg.transport.kind, "discord");
        assert_eq!(cfg.errors_to, "#errors");
        assert_eq!(cfg.modules, vec!["hello".to_string()]);
        assert_eq!(cfg.timings.receive_timeout_secs, 60);
        assert_eq!(cfg.timings.tick_secs, 1);
        assert_eq!(cfg.timings.catch_up_secs, 60);
        assert_eq!(cfg.timings.reconnect_cooldown_secs, 30);
        assert_eq!(cfg.timings.drain_timeout_secs, 0);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let cfg = BotConfig::parse("").unwrap();
        assert_eq!(cfg.errors_to, "#errors");
        assert!(cfg.hears.is_empty());
        assert!(cfg.tasks.is_empty());
    }

    #[test]
    fn test_full_toml() {
        let cfg = BotConfig::parse(
            r##"
            errors_to = "#bot-errors"
            modules = ["hello", "echo"]

            [transport]
            kind = "console"
            token = "xoxb-1"

            [timings]
            reconnect_cooldown_secs = 5
            drain_timeout_secs = 10

            [[hears]]
            pattern = "^deploy (\\w+)"
            channels = ["#ops"]
            reply = "deploying $1"

            [[tasks]]
            channel = "#general"
            text = "morning"
            daily = "08:00"
            tz = "Asia/Tokyo"
            "##,
        )
        .unwrap();

        assert_eq!(cfg.errors_to, "#bot-errors");
        assert_eq!(cfg.modules.len(), 2);
        assert_eq!(cfg.transport.kind, "console");
        assert_eq!(cfg.transport.resolved_token().as_deref(), Some("xoxb-1"));
        assert_eq!(cfg.timings.reconnect_cooldown_secs, 5);
        assert_eq!(cfg.timings.receive_timeout_secs, 60);
        assert_eq!(cfg.hears[0].channels, vec!["#ops".to_string()]);
        assert!(!cfg.hears[0].ambient);
        assert_eq!(cfg.tasks[0].daily.as_deref(), Some("08:00"));
        assert_eq!(cfg.tasks[0].tz.as_deref(), Some("Asia/Tokyo"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = BotConfig::parse("modules = 3").unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "errors_to = \"C1\"\n").unwrap();
        let cfg = BotConfig::load_from(&path).unwrap();
        assert_eq!(cfg.errors_to, "C1");
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BotConfig::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, BotError::ConfigNotFound(_)));
    }
}
