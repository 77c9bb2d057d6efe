//! Prometheus metrics for the relay.
//!
//! - Connection metrics (active, opened, closed, lifetime)
//! - Relay metrics (messages relayed, peer deliveries and failures)
//! - Heartbeat metrics (sweep duration, evictions)

mod helpers;

pub use helpers::{encode_metrics, ConnectionMetrics, HeartbeatMetrics, RelayMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "telemetry_relay";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Number of connections currently in the registry
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Number of connections currently in the registry"
    ).unwrap();

    pub static ref CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    pub static ref CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    /// Connection lifetime
    pub static ref CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection duration in seconds",
        vec![1.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]
    ).unwrap();

    // ============================================================================
    // Relay Metrics
    // ============================================================================

    /// Inbound messages relayed to peers
    pub static ref MESSAGES_RELAYED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_relayed_total", METRIC_PREFIX),
        "Total inbound messages relayed to peers"
    ).unwrap();

    pub static ref DELIVERIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total relayed messages queued to peer connections"
    ).unwrap();

    pub static ref DELIVERIES_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_deliveries_failed_total", METRIC_PREFIX),
        "Total relayed messages dropped because a peer queue was full or closed"
    ).unwrap();

    // ============================================================================
    // Heartbeat Metrics
    // ============================================================================

    pub static ref HEARTBEAT_DURATION_MS: Histogram = register_histogram!(
        format!("{}_heartbeat_duration_ms", METRIC_PREFIX),
        "Heartbeat sweep duration in milliseconds",
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0]
    ).unwrap();

    pub static ref HEARTBEAT_EVICTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_heartbeat_evictions_total", METRIC_PREFIX),
        "Total connections evicted for missing a heartbeat"
    ).unwrap();
}
