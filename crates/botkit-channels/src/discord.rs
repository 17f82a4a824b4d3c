//! Discord Bot transport — Gateway WebSocket for events, REST API for posting.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use botkit_core::error::{BotError, Result};
use botkit_core::traits::{Connection, FrameSender, Transport};
use botkit_core::types::{ChannelDirectory, ChannelInfo, Event, Frame, Message, PostOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parse_mentions;
use crate::ws::WsConnection;

const DEFAULT_API: &str = "https://discord.com/api/v10";
const DM_CHANNEL: u64 = 1;

/// Discord transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Gateway intents bitmask.
    #[serde(default = "default_intents")]
    pub intents: u64,
    #[serde(default = "default_api")]
    pub api_base: String,
}

fn default_intents() -> u64 {
    // GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
    (1 << 0) | (1 << 9) | (1 << 12) | (1 << 15)
}
fn default_api() -> String {
    DEFAULT_API.into()
}

impl DiscordConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            intents: default_intents(),
            api_base: default_api(),
        }
    }
}

/// Session state learned from the gateway.
#[derive(Debug, Default)]
struct GatewayState {
    me: Option<String>,
    channels: ChannelDirectory,
}

/// Discord Bot transport.
pub struct DiscordTransport {
    config: DiscordConfig,
    client: reqwest::Client,
    state: RwLock<GatewayState>,
    /// Last sequence number seen, echoed in heartbeats.
    seq: Arc<AtomicU64>,
    /// Set when the gateway acknowledges a heartbeat.
    acked: Arc<AtomicBool>,
}

impl DiscordTransport {
    pub fn new(config: DiscordConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = reqwest::header::HeaderValue::from_str(&format!("Bot {}", config.bot_token))
            .map_err(|e| BotError::config(format!("Invalid Discord token: {e}")))?;
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("botkit (https://github.com/botkit/botkit, 0.2)"),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BotError::channel(format!("HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            state: RwLock::new(GatewayState::default()),
            seq: Arc::new(AtomicU64::new(0)),
            acked: Arc::new(AtomicBool::new(true)),
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, GatewayState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, GatewayState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Resolve a channel reference (`id` or `#name`).
    pub fn resolve(&self, reference: &str) -> Result<ChannelInfo> {
        self.read_state().channels.find(reference)
    }

    /// Get the Gateway WebSocket URL.
    pub async fn gateway_url(&self) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/gateway/bot", self.config.api_base))
            .send()
            .await
            .map_err(|e| BotError::Http(format!("Gateway request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(BotError::AuthFailed(format!("Discord /gateway/bot: {status}")));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| BotError::Http(format!("Invalid gateway response: {e}")))?;
        body["url"]
            .as_str()
            .map(|s| format!("{s}/?v=10&encoding=json"))
            .ok_or_else(|| BotError::channel("No gateway URL"))
    }

    fn identify(&self) -> Frame {
        let identify = serde_json::json!({
            "op": 2,
            "d": {
                "token": self.config.bot_token,
                "intents": self.config.intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "botkit",
                    "device": "botkit"
                }
            }
        });
        Frame::text(identify.to_string())
    }

    fn record_seq(&self, payload: &Value) {
        if let Some(s) = payload["s"].as_u64() {
            self.seq.store(s, Ordering::Relaxed);
        }
    }

    fn guild_channels(d: &Value) -> Vec<ChannelInfo> {
        d["channels"]
            .as_array()
            .map(|channels| channels.iter().filter_map(channel_info).collect())
            .unwrap_or_default()
    }

    fn parse_dispatch(&self, name: &str, d: &Value) -> Result<Option<Event>> {
        match name {
            "MESSAGE_CREATE" => {
                let channel_id = d["channel_id"]
                    .as_str()
                    .ok_or_else(|| BotError::parse("MESSAGE_CREATE without channel_id"))?;
                // Messages outside a guild are DMs; learn the channel on first sight.
                if d["guild_id"].is_null() {
                    self.write_state()
                        .channels
                        .add_im(ChannelInfo::new(channel_id, channel_id));
                }
                let channel = self.resolve(channel_id)?;
                let user = d["author"]["id"]
                    .as_str()
                    .ok_or_else(|| BotError::parse("MESSAGE_CREATE without author"))?;
                let text = d["content"].as_str().unwrap_or_default();
                let message = Message::new(channel.clone(), user, text)
                    .with_mentions(parse_mentions(text));
                Ok(Some(Event {
                    channel: Some(channel),
                    message: Some(message),
                }))
            }
            "CHANNEL_CREATE" => {
                let Some(channel) = channel_info(d) else {
                    return Ok(None);
                };
                let mut state = self.write_state();
                if d["type"].as_u64() == Some(DM_CHANNEL) {
                    state.channels.add_im(channel.clone());
                } else {
                    state.channels.add_channel(channel.clone());
                }
                Ok(Some(Event {
                    channel: Some(channel),
                    message: None,
                }))
            }
            "CHANNEL_DELETE" => {
                if let Some(id) = d["id"].as_str() {
                    self.write_state().channels.remove(id);
                }
                Ok(None)
            }
            "GUILD_CREATE" => {
                let mut state = self.write_state();
                for channel in Self::guild_channels(d) {
                    state.channels.add_channel(channel);
                }
                Ok(None)
            }
            _ => {
                tracing::trace!("Ignoring event: {name}");
                Ok(None)
            }
        }
    }
}

fn channel_info(v: &Value) -> Option<ChannelInfo> {
    let id = v["id"].as_str()?;
    let name = v["name"].as_str().unwrap_or(id);
    Some(ChannelInfo::new(id, name))
}

/// Send op 1 every `interval` until the connection's writer goes away.
async fn heartbeat(sender: FrameSender, interval: Duration, seq: Arc<AtomicU64>, acked: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if !acked.swap(false, Ordering::Relaxed) {
            tracing::warn!("Discord heartbeat not acknowledged since last beat");
        }
        let s = seq.load(Ordering::Relaxed);
        let d = if s == 0 { Value::Null } else { Value::from(s) };
        let beat = serde_json::json!({ "op": 1, "d": d });
        if sender.send(Frame::text(beat.to_string())).is_err() {
            tracing::debug!("Discord heartbeat stopped (connection closed)");
            return;
        }
        tracing::trace!("Heartbeat sent (seq={s})");
    }
}

#[async_trait]
impl Transport for DiscordTransport {
    fn name(&self) -> &str {
        "discord"
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let url = self.gateway_url().await?;
        let connection = WsConnection::connect(&url).await?;
        Ok(Box::new(connection))
    }

    /// Hello → start heartbeat + Identify; READY → bot id; first
    /// GUILD_CREATE → channel list, and the session is ready.
    async fn prepare(&self, connection: &mut dyn Connection) -> Result<()> {
        self.seq.store(0, Ordering::Relaxed);
        self.acked.store(true, Ordering::Relaxed);

        loop {
            let frame = connection.receive().await?;
            let payload: Value = serde_json::from_str(&frame.data)
                .map_err(|e| BotError::parse(format!("Invalid gateway frame: {e}")))?;
            self.record_seq(&payload);

            match payload["op"].as_u64() {
                Some(10) => {
                    let ms = payload["d"]["heartbeat_interval"].as_u64().unwrap_or(41_250);
                    tracing::debug!("Gateway Hello: heartbeat={ms}ms");
                    match connection.sender() {
                        Some(sender) => {
                            tokio::spawn(heartbeat(
                                sender,
                                Duration::from_millis(ms),
                                Arc::clone(&self.seq),
                                Arc::clone(&self.acked),
                            ));
                        }
                        None => tracing::warn!("Connection has no background sender; no heartbeat"),
                    }
                    connection.send(self.identify()).await?;
                }
                Some(11) => self.acked.store(true, Ordering::Relaxed),
                Some(0) => match payload["t"].as_str().unwrap_or_default() {
                    "READY" => {
                        let me = payload["d"]["user"]["id"].as_str().map(String::from);
                        tracing::info!("Discord Gateway READY as {}", me.as_deref().unwrap_or("?"));
                        self.write_state().me = me;
                    }
                    "GUILD_CREATE" => {
                        let channels = Self::guild_channels(&payload["d"]);
                        tracing::info!("Discord guild ready ({} channels)", channels.len());
                        self.write_state().channels.set_channels(channels);
                        return Ok(());
                    }
                    _ => {}
                },
                Some(9) => return Err(BotError::AuthFailed("Discord invalid session".into())),
                _ => {}
            }
        }
    }

    fn parse(&self, frame: &Frame) -> Result<Option<Event>> {
        let payload: Value = serde_json::from_str(&frame.data)
            .map_err(|e| BotError::parse(format!("{} is not a gateway frame: {e}", frame.data)))?;
        self.record_seq(&payload);

        match payload["op"].as_u64() {
            Some(0) => {
                let name = payload["t"].as_str().unwrap_or_default();
                self.parse_dispatch(name, &payload["d"])
            }
            Some(11) => {
                self.acked.store(true, Ordering::Relaxed);
                Ok(None)
            }
            Some(7) => Err(BotError::ConnectionClosed("Gateway requested reconnect".into())),
            Some(9) => Err(BotError::ConnectionClosed("Gateway invalidated the session".into())),
            Some(_) => Ok(None),
            None => Err(BotError::parse(format!("Gateway frame without op: {}", frame.data))),
        }
    }

    async fn post(&self, channel: &str, text: &str, options: PostOptions) -> Result<()> {
        let target = match &options.thread {
            Some(thread) => thread.clone(),
            None => self.resolve(channel)?.id,
        };
        let mut body = serde_json::json!({ "content": text });
        if let Some(embeds) = options.attachments {
            body["embeds"] = embeds;
        }

        let response = self
            .client
            .post(format!("{}/channels/{target}/messages", self.config.api_base))
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Http(format!("Discord send failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BotError::Http(format!("Discord {status}: {text}")));
        }
        Ok(())
    }

    fn me(&self) -> Option<String> {
        self.read_state().me.clone()
    }

    fn is_direct(&self, channel: &ChannelInfo) -> bool {
        self.read_state().channels.is_im(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// A connection that replays canned frames and records what is sent.
    struct Scripted {
        inbound: VecDeque<String>,
        sent: Vec<String>,
    }

    #[async_trait]
    impl Connection for Scripted {
        async fn receive(&mut self) -> Result<Frame> {
            self.inbound
                .pop_front()
                .map(Frame::text)
                .ok_or_else(|| BotError::ConnectionClosed("script ended".into()))
        }
        async fn send(&mut self, frame: Frame) -> Result<()> {
            self.sent.push(frame.data);
            Ok(())
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn transport() -> DiscordTransport {
        DiscordTransport::new(DiscordConfig::new("test-token")).unwrap()
    }

    fn frame(v: Value) -> Frame {
        Frame::text(v.to_string())
    }

    async fn prepared() -> DiscordTransport {
        let t = transport();
        let mut conn = Scripted {
            inbound: VecDeque::from(vec![
                serde_json::json!({"op": 10, "d": {"heartbeat_interval": 45000}}).to_string(),
                serde_json::json!({"op": 0, "s": 1, "t": "READY", "d": {"user": {"id": "B1"}}}).to_string(),
                serde_json::json!({"op": 0, "s": 2, "t": "GUILD_CREATE", "d": {"channels": [
                    {"id": "C1", "name": "general"},
                    {"id": "C2", "name": "errors"}
                ]}})
                .to_string(),
            ]),
            sent: Vec::new(),
        };
        t.prepare(&mut conn).await.unwrap();
        let identify: Value = serde_json::from_str(&conn.sent[0]).unwrap();
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "test-token");
        t
    }

    #[tokio::test]
    async fn test_prepare_learns_identity_and_channels() {
        let t = prepared().await;
        assert_eq!(t.me().as_deref(), Some("B1"));
        assert_eq!(t.resolve("#errors").unwrap().id, "C2");
        assert_eq!(t.seq.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_prepare_fails_when_connection_drops() {
        let t = transport();
        let mut conn = Scripted {
            inbound: VecDeque::new(),
            sent: Vec::new(),
        };
        let err = t.prepare(&mut conn).await.unwrap_err();
        assert!(matches!(err, BotError::ConnectionClosed(_)));
    }

    #[tokio::test]
    async fn test_parse_guild_message() {
        let t = prepared().await;
        let ev = t
            .parse(&frame(serde_json::json!({"op": 0, "s": 3, "t": "MESSAGE_CREATE", "d": {
                "channel_id": "C1", "guild_id": "G1",
                "author": {"id": "U1"}, "content": "<@B1> hello <@!U2>"
            }})))
            .unwrap()
            .unwrap();
        let msg = ev.message.unwrap();
        assert_eq!(msg.channel.name, "general");
        assert_eq!(msg.user, "U1");
        assert_eq!(msg.mentions, vec!["B1".to_string(), "U2".to_string()]);
        assert!(!t.is_direct(&msg.channel));
    }

    #[tokio::test]
    async fn test_parse_unknown_guild_channel_is_channel_not_found() {
        let t = prepared().await;
        let err = t
            .parse(&frame(serde_json::json!({"op": 0, "t": "MESSAGE_CREATE", "d": {
                "channel_id": "C404", "guild_id": "G1", "author": {"id": "U1"}, "content": "hi"
            }})))
            .unwrap_err();
        assert!(err.is_channel_not_found());
    }

    #[tokio::test]
    async fn test_parse_dm_registers_direct_channel() {
        let t = prepared().await;
        let ev = t
            .parse(&frame(serde_json::json!({"op": 0, "t": "MESSAGE_CREATE", "d": {
                "channel_id": "D9", "author": {"id": "U1"}, "content": "hello"
            }})))
            .unwrap()
            .unwrap();
        assert!(t.is_direct(&ev.channel.unwrap()));
    }

    #[tokio::test]
    async fn test_parse_channel_lifecycle() {
        let t = prepared().await;
        let ev = t
            .parse(&frame(serde_json::json!({"op": 0, "t": "CHANNEL_CREATE", "d": {"id": "D5", "type": 1}})))
            .unwrap()
            .unwrap();
        assert!(ev.message.is_none());
        assert!(t.is_direct(&ChannelInfo::new("D5", "D5")));

        t.parse(&frame(serde_json::json!({"op": 0, "t": "CHANNEL_DELETE", "d": {"id": "C1"}})))
            .unwrap();
        assert!(t.resolve("C1").unwrap_err().is_channel_not_found());
    }

    #[test]
    fn test_parse_control_frames() {
        let t = transport();
        t.acked.store(false, Ordering::Relaxed);
        assert!(t.parse(&frame(serde_json::json!({"op": 11}))).unwrap().is_none());
        assert!(t.acked.load(Ordering::Relaxed));

        let err = t.parse(&frame(serde_json::json!({"op": 7, "d": null}))).unwrap_err();
        assert!(matches!(err, BotError::ConnectionClosed(_)));
    }

    #[test]
    fn test_parse_garbage_is_fatal_parse_error() {
        let t = transport();
        let err = t.parse(&Frame::text("not json")).unwrap_err();
        assert!(matches!(err, BotError::Parse(_)));
        assert!(!err.is_channel_not_found());
    }

    #[tokio::test]
    async fn test_post_to_unknown_channel_fails_before_http() {
        let t = prepared().await;
        let err = t.post("#nowhere", "hi", PostOptions::default()).await.unwrap_err();
        assert!(err.is_channel_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_stops_when_receiver_dropped() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let seq = Arc::new(AtomicU64::new(42));
        let acked = Arc::new(AtomicBool::new(true));
        let beat = tokio::spawn(heartbeat(tx, Duration::from_secs(10), seq, acked));

        let first = rx.recv().await.unwrap();
        let v: Value = serde_json::from_str(&first.data).unwrap();
        assert_eq!(v["op"], 1);
        assert_eq!(v["d"], 42);

        drop(rx);
        beat.await.unwrap();
    }
}
