//! Registry of open WebSocket connections.

mod registry;
mod stats;
mod types;

pub use registry::ConnectionManager;
pub use stats::{BroadcastReport, ConnectionStats, SweepReport};
pub use types::{ConnectionHandle, ConnectionState};
