//! Console transport for talking to the bot from a terminal.
//!
//! Each stdin line is a message from user `console`. A plain line arrives in
//! the `console` direct-message channel; `#name: text` arrives in channel
//! `#name`, which must be one of the configured channels. Posts are printed
//! to stdout as `[#name] text`.
//!
//! Every connection reads from the same buffered stdin, so lines typed
//! across a reconnect are not lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use async_trait::async_trait;
use botkit_core::error::{BotError, Result};
use botkit_core::traits::{Connection, Transport};
use botkit_core::types::{ChannelDirectory, ChannelInfo, Event, Frame, Message, PostOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::parse_mentions;

pub const CONSOLE_USER: &str = "console";
pub const CONSOLE_BOT: &str = "botkit";

type InputLines = Lines<Box<dyn AsyncBufRead + Unpin + Send>>;

/// Console transport.
pub struct ConsoleTransport {
    channels: RwLock<ChannelDirectory>,
    input: Arc<Mutex<InputLines>>,
    closed: Arc<AtomicBool>,
}

impl ConsoleTransport {
    /// A console with the DM channel plus `#general` and `#errors`.
    pub fn new() -> Self {
        Self::with_channels(&["general", "errors"])
    }

    pub fn with_channels(names: &[&str]) -> Self {
        Self::with_reader(names, BufReader::new(tokio::io::stdin()))
    }

    /// A console reading lines from `reader` instead of stdin.
    pub fn with_reader<R>(names: &[&str], reader: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let mut channels = ChannelDirectory::new();
        channels.add_im(ChannelInfo::new(CONSOLE_USER, CONSOLE_USER));
        for name in names {
            channels.add_channel(ChannelInfo::new(format!("C-{name}"), *name));
        }
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(reader);
        Self {
            channels: RwLock::new(channels),
            input: Arc::new(Mutex::new(reader.lines())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True once the input has reached end of file.
    pub fn input_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn channels(&self) -> RwLockReadGuard<'_, ChannelDirectory> {
        self.channels.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Line-oriented connection over the transport's shared input.
pub struct LineConnection {
    input: Arc<Mutex<InputLines>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for LineConnection {
    async fn receive(&mut self) -> Result<Frame> {
        // `next_line` is cancel safe, so a receive timeout loses nothing.
        let line = self.input.lock().await.next_line().await?;
        match line {
            Some(line) => Ok(Frame::text(line)),
            None => {
                if !self.closed.swap(true, Ordering::SeqCst) {
                    tracing::warn!("⚠️ Console input closed; only scheduled tasks will run");
                }
                Err(BotError::ConnectionClosed("stdin closed".into()))
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        tracing::debug!("console frame out: {}", frame.data);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(LineConnection {
            input: Arc::clone(&self.input),
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn prepare(&self, _connection: &mut dyn Connection) -> Result<()> {
        let mut out = tokio::io::stdout();
        out.write_all(b"botkit console ready. Type a message, or `#channel: message`.\n")
            .await?;
        out.flush().await?;
        Ok(())
    }

    fn parse(&self, frame: &Frame) -> Result<Option<Event>> {
        let line = frame.data.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (reference, text) = match line.strip_prefix('#').and_then(|rest| rest.split_once(':')) {
            Some((name, text)) => (format!("#{}", name.trim()), text.trim()),
            None => (CONSOLE_USER.to_string(), line),
        };
        let channel = self.channels().find(&reference)?;
        let message = Message::new(channel, CONSOLE_USER, text).with_mentions(parse_mentions(text));
        Ok(Some(Event::message(message)))
    }

    async fn post(&self, channel: &str, text: &str, _options: PostOptions) -> Result<()> {
        let channel = self.channels().find(channel)?;
        let mut out = tokio::io::stdout();
        out.write_all(format!("[#{}] {text}\n", channel.name).as_bytes())
            .await?;
        out.flush().await?;
        Ok(())
    }

    fn me(&self) -> Option<String> {
        Some(CONSOLE_BOT.to_string())
    }

    fn is_direct(&self, channel: &ChannelInfo) -> bool {
        self.channels().is_im(channel)
    }
}
