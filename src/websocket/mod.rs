mod handler;
mod message;

pub use handler::ws_handler;
pub use message::{
    ConnectSnapshot, ControlMessage, InvalidInterval, OutboundMessage, SensorReading,
    MAX_INTERVAL, MIN_INTERVAL,
};
