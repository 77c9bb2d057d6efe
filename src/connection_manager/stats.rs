//! Registry statistics and per-operation reports

use serde::Serialize;

/// Connection statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub open_connections: usize,
    /// Connections probed by the last sweep that have not answered yet
    pub awaiting_pong: usize,
    pub messages_relayed: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub evictions: u64,
}

/// Outcome of relaying one payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Peers not in the open state
    pub skipped: usize,
    /// Peers whose queue was full or closed
    pub failed: usize,
}

/// Outcome of one heartbeat sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub evicted: usize,
}
