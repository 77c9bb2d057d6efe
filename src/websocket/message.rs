use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest interval a client may request, in seconds
pub const MIN_INTERVAL: u32 = 1;
/// Largest interval a client may request, in seconds
pub const MAX_INTERVAL: u32 = 3600;

const CONNECTED_MESSAGE: &str = "Connected to server";

/// Zeroed reading sent to every connection right after the upgrade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectSnapshot {
    pub message: String,
    pub sensor1: i64,
    pub sensor2: i64,
    pub sensor3: i64,
}

impl Default for ConnectSnapshot {
    fn default() -> Self {
        Self {
            message: CONNECTED_MESSAGE.to_string(),
            sensor1: 0,
            sensor2: 0,
            sensor3: 0,
        }
    }
}

/// Sensor values as published by a producer. The relay never parses these;
/// only clients do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub sensor1: f64,
    pub sensor2: f64,
    pub sensor3: f64,
}

/// Control message a client sends to its peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub message: String,
    pub interval: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interval {0} is outside 1..=3600 seconds")]
pub struct InvalidInterval(pub u32);

impl ControlMessage {
    pub fn new(message: impl Into<String>, interval: u32) -> Result<Self, InvalidInterval> {
        let msg = Self {
            message: message.into(),
            interval,
        };
        msg.validate()?;
        Ok(msg)
    }

    pub fn validate(&self) -> Result<(), InvalidInterval> {
        if (MIN_INTERVAL..=MAX_INTERVAL).contains(&self.interval) {
            Ok(())
        } else {
            Err(InvalidInterval(self.interval))
        }
    }
}

/// Messages queued for delivery to a single connection
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Payload relayed verbatim from another connection
    Relay(Utf8Bytes),
    Snapshot(ConnectSnapshot),
    /// Liveness probe
    Ping,
}

impl OutboundMessage {
    /// Convert into the WebSocket frame written to the socket
    pub fn into_frame(self) -> Result<Message, serde_json::Error> {
        match self {
            OutboundMessage::Relay(text) => Ok(Message::Text(text)),
            OutboundMessage::Snapshot(snapshot) => {
                let json = serde_json::to_string(&snapshot)?;
                Ok(Message::Text(json.into()))
            }
            OutboundMessage::Ping => Ok(Message::Ping(Bytes::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::assert_ok;

    #[test]
    fn test_snapshot_wire_format() {
        let value = serde_json::to_value(ConnectSnapshot::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "message": "Connected to server",
                "sensor1": 0,
                "sensor2": 0,
                "sensor3": 0
            })
        );
    }

    #[test]
    fn test_interval_bounds() {
        assert_ok!(ControlMessage::new("hi", 5));
        assert_ok!(ControlMessage::new("hi", MIN_INTERVAL));
        assert_ok!(ControlMessage::new("hi", MAX_INTERVAL));
        assert_eq!(ControlMessage::new("hi", 0), Err(InvalidInterval(0)));
        assert_eq!(ControlMessage::new("hi", 9999), Err(InvalidInterval(9999)));
    }

    #[test]
    fn test_control_message_wire_format() {
        let msg = ControlMessage::new("hi", 5).unwrap();
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"message":"hi","interval":5}"#
        );
    }

    #[test]
    fn test_reading_accepts_snapshot() {
        let text = serde_json::to_string(&ConnectSnapshot::default()).unwrap();
        let reading: SensorReading = serde_json::from_str(&text).unwrap();
        assert_eq!(reading.sensor1, 0.0);
        assert_eq!(reading.message.as_deref(), Some("Connected to server"));
    }

    #[test]
    fn test_relay_frame_is_verbatim_text() {
        let frame = OutboundMessage::Relay(Utf8Bytes::from("ping")).into_frame().unwrap();
        match frame {
            Message::Text(text) => assert_eq!(text.as_str(), "ping"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}
