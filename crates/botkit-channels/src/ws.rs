//! WebSocket connection: a tungstenite stream behind the `Connection` trait.
//!
//! The stream is split: reads happen on the caller's task, writes go
//! through an mpsc queue drained by a writer task, so a heartbeat can send
//! while the dispatcher is parked in `receive`.

use async_trait::async_trait;
use botkit_core::error::{BotError, Result};
use botkit_core::traits::{Connection, FrameSender};
use botkit_core::types::Frame;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A WebSocket connection owned by one connection cycle.
pub struct WsConnection {
    read: SplitStream<WsStream>,
    outbound: FrameSender,
    shutdown: CancellationToken,
    writer: Option<JoinHandle<()>>,
}

impl WsConnection {
    /// Connect to a WebSocket URL.
    pub async fn connect(url: &str) -> Result<Self> {
        tracing::info!("Connecting WebSocket: {url}");
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| BotError::channel(format!("WebSocket connect failed: {e}")))?;
        Ok(Self::new(stream))
    }

    pub fn new(stream: WsStream) -> Self {
        let (mut write, read) = stream.split();
        let (outbound, mut rx) = mpsc::unbounded_channel::<Frame>();
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    frame = rx.recv() => {
                        let Some(frame) = frame else { break };
                        if let Err(e) = write.send(WsMessage::Text(frame.data)).await {
                            tracing::warn!("WebSocket write failed: {e}");
                            break;
                        }
                    }
                }
            }
            let _ = write.close().await;
        });

        Self {
            read,
            outbound,
            shutdown,
            writer: Some(writer),
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn receive(&mut self) -> Result<Frame> {
        loop {
            match self.read.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Frame::text(text)),
                Some(Ok(WsMessage::Binary(data))) => {
                    return Ok(Frame::text(String::from_utf8_lossy(&data)));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    return Err(BotError::ConnectionClosed(format!("{frame:?}")));
                }
                Some(Ok(_)) => {
                    tracing::trace!("WebSocket control frame");
                }
                Some(Err(e)) => return Err(BotError::channel(format!("WebSocket error: {e}"))),
                None => return Err(BotError::ConnectionClosed("stream ended".into())),
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.outbound
            .send(frame)
            .map_err(|_| BotError::ConnectionClosed("writer stopped".into()))
    }

    fn sender(&self) -> Option<FrameSender> {
        Some(self.outbound.clone())
    }

    async fn close(&mut self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
        Ok(())
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
