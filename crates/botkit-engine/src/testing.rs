//! In-memory transport for engine tests.
//!
//! Each `connect` takes the next script (a list of frames); an exhausted
//! script leaves `receive` pending forever. Frames are plain text:
//!
//! - `msg <channel-id> <user> <text...>`: a message
//! - `ack`: a control frame
//! - `ghost`: a message in a channel the transport does not know
//! - `sleep <secs>`: nothing arrives for that long
//! - `EOF`: the connection closes
//! - anything else: a parse error

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use botkit_core::error::{BotError, Result};
use botkit_core::traits::{Connection, Transport};
use botkit_core::types::{ChannelDirectory, ChannelInfo, Event, Frame, Message, PostOptions};

pub const BOT: &str = "BOT";

#[derive(Default)]
pub struct Counters {
    pub connects: AtomicUsize,
    pub prepares: AtomicUsize,
    pub closes: AtomicUsize,
}

pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<&'static str>>>,
    channels: ChannelDirectory,
    posts: Mutex<Vec<(String, String)>>,
    pub counters: Arc<Counters>,
    pub fail_connect: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        let mut channels = ChannelDirectory::new();
        channels.add_im(ChannelInfo::new("D1", "dm"));
        channels.add_channel(ChannelInfo::new("C1", "general"));
        channels.add_channel(ChannelInfo::new("C9", "errors"));
        Self {
            scripts: Mutex::new(VecDeque::new()),
            channels,
            posts: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
            fail_connect: false,
        }
    }

    /// Queue the frames for the next connection.
    pub fn script(self, frames: &[&'static str]) -> Self {
        self.scripts.lock().unwrap().push_back(frames.to_vec());
        self
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

pub struct ScriptedConnection {
    frames: VecDeque<&'static str>,
    counters: Arc<Counters>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn receive(&mut self) -> Result<Frame> {
        loop {
            match self.frames.pop_front() {
                Some("EOF") => return Err(BotError::ConnectionClosed("script ended".into())),
                Some(frame) => match frame.strip_prefix("sleep ") {
                    Some(secs) => {
                        let secs = secs.parse().unwrap_or_default();
                        tokio::time::sleep(Duration::from_secs(secs)).await;
                    }
                    None => return Ok(Frame::text(frame)),
                },
                None => return std::future::pending().await,
            }
        }
    }

    async fn send(&mut self, _frame: Frame) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(BotError::channel("connection refused"));
        }
        let frames = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedConnection {
            frames: frames.into(),
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn prepare(&self, _connection: &mut dyn Connection) -> Result<()> {
        self.counters.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn parse(&self, frame: &Frame) -> Result<Option<Event>> {
        let mut parts = frame.data.splitn(4, ' ');
        match parts.next() {
            Some("ack") => Ok(None),
            Some("ghost") => Err(BotError::ChannelNotFound("C404".into())),
            Some("msg") => {
                let channel = self.channels.find(parts.next().unwrap_or_default())?;
                let user = parts.next().unwrap_or_default();
                let text = parts.next().unwrap_or_default();
                let mentions = if text.contains("<@BOT>") {
                    vec![BOT.to_string()]
                } else {
                    Vec::new()
                };
                Ok(Some(Event::message(
                    Message::new(channel, user, text).with_mentions(mentions),
                )))
            }
            _ => Err(BotError::parse(format!("unreadable frame: {}", frame.data))),
        }
    }

    async fn post(&self, channel: &str, text: &str, _options: PostOptions) -> Result<()> {
        self.channels.find(channel)?;
        self.posts
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }

    fn me(&self) -> Option<String> {
        Some(BOT.to_string())
    }

    fn is_direct(&self, channel: &ChannelInfo) -> bool {
        self.channels.is_im(channel)
    }
}
