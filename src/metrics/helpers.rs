//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::connection_manager::{BroadcastReport, SweepReport};

use super::{
    CONNECTIONS_ACTIVE, CONNECTIONS_CLOSED, CONNECTIONS_OPENED, CONNECTION_DURATION,
    DELIVERIES_FAILED_TOTAL, DELIVERIES_TOTAL, HEARTBEAT_DURATION_MS, HEARTBEAT_EVICTIONS_TOTAL,
    MESSAGES_RELAYED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording connection metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn set_active(count: usize) {
        CONNECTIONS_ACTIVE.set(count as i64);
    }

    pub fn record_opened() {
        CONNECTIONS_OPENED.inc();
    }

    /// Record a closed connection and how long it lived
    pub fn record_closed(duration_secs: f64) {
        CONNECTIONS_CLOSED.inc();
        CONNECTION_DURATION.observe(duration_secs);
    }
}

/// Helper struct for recording relay metrics
pub struct RelayMetrics;

impl RelayMetrics {
    pub fn record_broadcast(report: &BroadcastReport) {
        MESSAGES_RELAYED_TOTAL.inc();
        DELIVERIES_TOTAL.inc_by(report.delivered as u64);
        if report.failed > 0 {
            DELIVERIES_FAILED_TOTAL.inc_by(report.failed as u64);
        }
    }
}

/// Helper struct for recording heartbeat metrics
pub struct HeartbeatMetrics;

impl HeartbeatMetrics {
    pub fn record_sweep(report: &SweepReport, duration_ms: f64) {
        HEARTBEAT_DURATION_MS.observe(duration_ms);
        if report.evicted > 0 {
            HEARTBEAT_EVICTIONS_TOTAL.inc_by(report.evicted as u64);
        }
    }
}
