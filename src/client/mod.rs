//! Relay client: keeps a WebSocket open to the relay, reconnecting after
//! every close, and records incoming sensor readings.

mod backoff;
mod history;
mod relay_client;

pub use backoff::{BackoffConfig, ReconnectBackoff};
pub use history::{HistoryEntry, ReadingHistory, Sensor};
pub use relay_client::{ClientHandle, ClientStatus, RelayClient};

use thiserror::Error;

use crate::websocket::InvalidInterval;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    InvalidInterval(#[from] InvalidInterval),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Not connected to relay")]
    NotConnected,

    #[error("Outbound queue is full")]
    QueueFull,

    #[error("Client has stopped")]
    Stopped,
}
