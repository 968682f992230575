use crate::client::stats::Stats;
use crate::types::{Blob, ClientMessage, RealtimeInput, ServerEvent, ServerMessage, Setup};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;

pub mod config;
pub mod consts;
mod stats;
mod utils;

pub use stats::Stats as UsageStats;

pub type ClientTx = tokio::sync::mpsc::Sender<ClientMessage>;
type ServerTx = tokio::sync::mpsc::Sender<ServerEvent>;
pub type ServerRx = tokio::sync::mpsc::Receiver<ServerEvent>;

/// A client for the Gemini Live WebSocket API.
///
/// Outgoing messages go through a bounded queue drained by a writer task, so
/// every `send_*` call returns immediately. A full queue is reported as an
/// error instead of blocking the caller.
pub struct Client {
    capacity: usize,
    config: config::Config,
    c_tx: Option<ClientTx>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize, config: config::Config) -> Self {
        Self {
            capacity: capacity.max(1),
            config,
            c_tx: None,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    async fn connect(&mut self, mut setup: Setup) -> Result<ServerRx> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }
        if setup.model.is_empty() {
            setup.model = Setup::new(self.config.model()).model;
        }

        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .context("Failed to connect to Gemini Live WebSocket")?;
        tracing::info!("Connected to Gemini Live, model={}", setup.model);

        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<ClientMessage>(self.capacity);
        let (s_tx, s_rx): (ServerTx, ServerRx) = tokio::sync::mpsc::channel(self.capacity);

        // The setup frame must precede any realtime input.
        c_tx.send(ClientMessage::Setup(setup))
            .await
            .context("Failed to queue setup message")?;
        self.c_tx = Some(c_tx);

        tokio::spawn(async move {
            while let Some(message) = c_rx.recv().await {
                match serde_json::to_string(&message) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize message: {}", e);
                    }
                }
            }
            // All senders dropped: the session was closed locally.
            if let Err(e) = write.close().await {
                tracing::debug!("error closing websocket: {}", e);
            }
            tracing::debug!("writer task exiting");
        });

        let stats = self.stats.clone();
        tokio::spawn(async move {
            let mut close_reason = None;
            while let Some(message) = read.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        let _ = s_tx.send(ServerEvent::Error(e.to_string())).await;
                        return;
                    }
                };
                // The service sends its JSON in binary frames as often as in text frames.
                let parsed = match message {
                    Message::Text(text) => serde_json::from_str::<ServerMessage>(&text),
                    Message::Binary(bin) => serde_json::from_slice::<ServerMessage>(&bin),
                    Message::Close(frame) => {
                        tracing::info!("connection closed: {:?}", frame);
                        close_reason = frame.map(|f| f.reason.to_string());
                        break;
                    }
                    _ => continue,
                };
                match parsed {
                    Ok(server_message) => {
                        if let Some(usage) = &server_message.usage_metadata {
                            match stats.lock() {
                                Ok(mut guard) => guard.update_usage(usage),
                                Err(_) => tracing::error!("failed to update stats"),
                            }
                        }
                        if let Some(go_away) = &server_message.go_away {
                            tracing::warn!("server going away, time left: {:?}", go_away.time_left);
                        }
                        if s_tx.send(ServerEvent::Message(server_message)).await.is_err() {
                            tracing::debug!("server event receiver dropped");
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to deserialize server message: {}", e);
                    }
                }
            }
            let _ = s_tx.send(ServerEvent::Close { reason: close_reason }).await;
        });

        Ok(s_rx)
    }

    /// Returns the accumulated token usage.
    pub fn stats(&self) -> Result<Stats> {
        if let Ok(stats_guard) = self.stats.lock() {
            Ok(stats_guard.clone())
        } else {
            Err(anyhow::anyhow!("failed to get stats"))
        }
    }

    pub fn is_connected(&self) -> bool {
        self.c_tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn send_client_message(&self, message: ClientMessage) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => tx.try_send(message).map_err(|e| match e {
                TrySendError::Full(_) => anyhow::anyhow!("outbound queue is full"),
                TrySendError::Closed(_) => anyhow::anyhow!("connection closed"),
            }),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    /// Sends a text turn as realtime input.
    pub fn send_text(&self, text: &str) -> Result<()> {
        self.send_client_message(ClientMessage::RealtimeInput(RealtimeInput::text(text)))
    }

    /// Sends one encoded audio chunk as realtime input.
    pub fn send_audio(&self, blob: Blob) -> Result<()> {
        self.send_client_message(ClientMessage::RealtimeInput(RealtimeInput::media(blob)))
    }

    /// Drops the outbound queue; the writer task flushes what is queued and closes the socket.
    pub fn close(&mut self) {
        if self.c_tx.take().is_some() {
            tracing::debug!("closing Gemini Live connection");
        }
    }
}

/// Connects with an explicit configuration and outbound queue capacity.
pub async fn connect_with_config(
    capacity: usize,
    config: config::Config,
    setup: Setup,
) -> Result<(Client, ServerRx)> {
    let mut client = Client::new(capacity, config);
    let events = client.connect(setup).await?;
    Ok((client, events))
}
