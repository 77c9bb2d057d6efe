//! Reconnecting WebSocket client for the relay

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

use crate::config::ClientConfig;
use crate::websocket::{ControlMessage, SensorReading};

use super::backoff::{BackoffConfig, ReconnectBackoff};
use super::history::ReadingHistory;
use super::ClientError;

const OUTBOUND_BUFFER_SIZE: usize = 32;
const READINGS_BUFFER_SIZE: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection status as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    Connecting,
    Connected,
    Disconnected,
    Stopped,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Connecting => "Connecting...",
            ClientStatus::Connected => "Connected",
            ClientStatus::Disconnected => "Disconnected",
            ClientStatus::Stopped => "Stopped",
        }
    }
}

/// Why a live session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Closed,
    Shutdown,
}

/// Cloneable handle for sending through and observing a running client
#[derive(Clone)]
pub struct ClientHandle {
    outbound: mpsc::Sender<String>,
    status: watch::Receiver<ClientStatus>,
    readings: broadcast::Sender<SensorReading>,
    history: Arc<RwLock<ReadingHistory>>,
}

impl ClientHandle {
    pub fn status(&self) -> ClientStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status change
    pub fn status_changes(&self) -> watch::Receiver<ClientStatus> {
        self.status.clone()
    }

    pub fn subscribe_readings(&self) -> broadcast::Receiver<SensorReading> {
        self.readings.subscribe()
    }

    pub fn history(&self) -> Arc<RwLock<ReadingHistory>> {
        self.history.clone()
    }

    /// Send raw text to every other client
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ClientError> {
        if self.status() != ClientStatus::Connected {
            return Err(ClientError::NotConnected);
        }

        self.outbound.try_send(text.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ClientError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ClientError::Stopped,
        })
    }

    /// Validate and send a control message. Out-of-range intervals never leave the client.
    pub fn send_control(&self, message: impl Into<String>, interval: u32) -> Result<(), ClientError> {
        let control = ControlMessage::new(message, interval)?;
        let json = serde_json::to_string(&control)?;
        self.send_text(json)
    }
}

/// Client that keeps a connection to the relay open, reconnecting after every close
pub struct RelayClient {
    config: ClientConfig,
    outbound_rx: mpsc::Receiver<String>,
    status_tx: watch::Sender<ClientStatus>,
    readings_tx: broadcast::Sender<SensorReading>,
    history: Arc<RwLock<ReadingHistory>>,
}

impl RelayClient {
    pub fn new(config: ClientConfig) -> (Self, ClientHandle) {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        let (status_tx, status_rx) = watch::channel(ClientStatus::Disconnected);
        let (readings_tx, _) = broadcast::channel(READINGS_BUFFER_SIZE);
        let history = Arc::new(RwLock::new(ReadingHistory::new(config.history_size)));

        let handle = ClientHandle {
            outbound: outbound_tx,
            status: status_rx,
            readings: readings_tx.clone(),
            history: history.clone(),
        };

        let client = Self {
            config,
            outbound_rx,
            status_tx,
            readings_tx,
            history,
        };

        (client, handle)
    }

    /// Connect and keep reconnecting until `shutdown` fires
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut backoff = ReconnectBackoff::new(BackoffConfig::from(&self.config));

        tracing::info!(url = %self.config.url, "Relay client started");

        loop {
            self.set_status(ClientStatus::Connecting);

            let connected = tokio::select! {
                _ = shutdown.recv() => break,
                result = self.connect() => result,
            };

            match connected {
                Ok(ws) => {
                    backoff.reset();
                    self.set_status(ClientStatus::Connected);
                    tracing::info!(url = %self.config.url, "Connected to relay");

                    let end = self.run_session(ws, &mut shutdown).await;
                    self.set_status(ClientStatus::Disconnected);
                    if end == SessionEnd::Shutdown {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %self.config.url, error = %e, "Failed to connect to relay");
                    self.set_status(ClientStatus::Disconnected);
                }
            }

            let delay = backoff.next_delay();
            tracing::info!(
                attempt = backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to relay"
            );

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_status(ClientStatus::Stopped);
        tracing::info!("Relay client stopped");
    }

    async fn connect(&self) -> Result<WsStream, ClientError> {
        let (ws, _response) = connect_async(self.config.url.as_str()).await?;
        Ok(ws)
    }

    async fn run_session(
        &mut self,
        ws: WsStream,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let mut outbound_open = true;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
                outbound = self.outbound_rx.recv(), if outbound_open => {
                    match outbound {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::Text(text)).await {
                                tracing::warn!(error = %e, "Failed to send to relay");
                                return SessionEnd::Closed;
                            }
                        }
                        // Every handle dropped; keep receiving
                        None => outbound_open = false,
                    }
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text).await,
                        Some(Ok(Message::Binary(bytes))) => {
                            self.handle_text(&String::from_utf8_lossy(&bytes)).await
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(frame = ?frame, "Relay closed the connection");
                            return SessionEnd::Closed;
                        }
                        // Pings are answered by tungstenite
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Relay connection error");
                            return SessionEnd::Closed;
                        }
                        None => return SessionEnd::Closed,
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<SensorReading>(text) {
            Ok(reading) => {
                self.history.write().await.push(reading.clone());
                // No subscribers is fine
                let _ = self.readings_tx.send(reading);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring frame that is not a sensor reading");
            }
        }
    }

    fn set_status(&self, status: ClientStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
