use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::metrics::{ConnectionMetrics, RelayMetrics};
use crate::websocket::OutboundMessage;

use super::stats::{BroadcastReport, ConnectionStats, SweepReport};
use super::types::{ConnectionHandle, ConnectionState};

/// Manages all active WebSocket connections
pub struct ConnectionManager {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    messages_relayed: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    evictions: AtomicU64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            messages_relayed: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Register a new connection. Always succeeds.
    pub fn register(&self, sender: mpsc::Sender<OutboundMessage>) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(sender));
        handle.set_state(ConnectionState::Open);
        self.connections.insert(handle.id, handle.clone());

        ConnectionMetrics::set_active(self.connections.len());
        tracing::info!(connection_id = %handle.id, total = self.connections.len(), "Connection registered");

        handle
    }

    /// Unregister a connection. Returns false if it was already gone.
    pub fn unregister(&self, connection_id: Uuid) -> bool {
        match self.connections.remove(&connection_id) {
            Some((_, handle)) => {
                handle.set_state(ConnectionState::Closed);
                ConnectionMetrics::set_active(self.connections.len());
                tracing::info!(connection_id = %connection_id, total = self.connections.len(), "Connection unregistered");
                true
            }
            None => false,
        }
    }

    /// Relay `payload` to every open connection except `sender_id`.
    ///
    /// Never waits on a slow peer: a full or closed queue is counted as a
    /// failed delivery and the loop moves on.
    pub fn broadcast(&self, sender_id: Uuid, payload: Utf8Bytes) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for handle in self.snapshot() {
            if handle.id == sender_id {
                continue;
            }
            if !handle.is_open() {
                report.skipped += 1;
                continue;
            }

            match handle.try_send(OutboundMessage::Relay(payload.clone())) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::debug!(
                        connection_id = %handle.id,
                        error = %e,
                        "Dropped relayed message for peer"
                    );
                }
            }
        }

        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        RelayMetrics::record_broadcast(&report);

        report
    }

    /// One mark-and-sweep pass: evict connections that did not answer the
    /// previous probe, probe the rest.
    pub fn sweep_unresponsive(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for handle in self.snapshot() {
            if !handle.take_alive() {
                tracing::info!(connection_id = %handle.id, "Evicting connection that missed heartbeat");
                handle.request_close();
                if self.unregister(handle.id) {
                    report.evicted += 1;
                }
                continue;
            }

            report.probed += 1;
            if let Err(e) = handle.try_send(OutboundMessage::Ping) {
                // Left to the next sweep: with no pong it is evicted then
                tracing::debug!(connection_id = %handle.id, error = %e, "Failed to queue heartbeat ping");
            }
        }

        self.evictions
            .fetch_add(report.evicted as u64, Ordering::Relaxed);

        report
    }

    /// Consistent copy of the current members
    pub fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    /// Get connection by ID
    pub fn get_connection(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> ConnectionStats {
        let mut open_connections = 0;
        let mut awaiting_pong = 0;
        for entry in self.connections.iter() {
            if entry.value().is_open() {
                open_connections += 1;
            }
            if !entry.value().is_alive() {
                awaiting_pong += 1;
            }
        }

        ConnectionStats {
            total_connections: self.connections.len(),
            open_connections,
            awaiting_pong,
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn connect(
        manager: &ConnectionManager,
        capacity: usize,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (manager.register(tx), rx)
    }

    fn relayed_text(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let OutboundMessage::Relay(text) = msg {
                out.push(text.as_str().to_string());
            }
        }
        out
    }

    #[test]
    fn test_register_and_unregister() {
        let manager = ConnectionManager::new();
        let (handle, _rx) = connect(&manager, 4);

        assert_eq!(manager.len(), 1);
        assert!(handle.is_open());

        assert!(manager.unregister(handle.id));
        assert!(manager.is_empty());
        assert_eq!(handle.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let manager = ConnectionManager::new();
        let (handle, _rx) = connect(&manager, 4);

        assert!(manager.unregister(handle.id));
        assert!(!manager.unregister(handle.id));
        assert!(!manager.unregister(Uuid::new_v4()));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_peers_but_not_sender() {
        let manager = ConnectionManager::new();
        let (c1, mut rx1) = connect(&manager, 4);
        let (_c2, mut rx2) = connect(&manager, 4);
        let (_c3, mut rx3) = connect(&manager, 4);

        let report = manager.broadcast(c1.id, Utf8Bytes::from("ping"));

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(relayed_text(&mut rx2), vec!["ping"]);
        assert_eq!(relayed_text(&mut rx3), vec!["ping"]);
        assert!(relayed_text(&mut rx1).is_empty());
    }

    #[test]
    fn test_broadcast_skips_closing_peers() {
        let manager = ConnectionManager::new();
        let (c1, _rx1) = connect(&manager, 4);
        let (c2, mut rx2) = connect(&manager, 4);
        c2.set_state(ConnectionState::Closing);

        let report = manager.broadcast(c1.id, Utf8Bytes::from("reading"));

        assert_eq!(report.skipped, 1);
        assert_eq!(report.delivered, 0);
        assert!(relayed_text(&mut rx2).is_empty());
    }

    #[test]
    fn test_failed_peer_does_not_stop_broadcast() {
        let manager = ConnectionManager::new();
        let (c1, _rx1) = connect(&manager, 4);
        let (_full, mut full_rx) = connect(&manager, 1);
        let (_gone, gone_rx) = connect(&manager, 4);
        let (_ok, mut ok_rx) = connect(&manager, 4);
        drop(gone_rx);

        // Fill the single slot
        manager.broadcast(c1.id, Utf8Bytes::from("first"));
        let report = manager.broadcast(c1.id, Utf8Bytes::from("second"));

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(relayed_text(&mut ok_rx), vec!["first", "second"]);
        assert_eq!(relayed_text(&mut full_rx), vec!["first"]);

        let stats = manager.stats();
        assert_eq!(stats.messages_relayed, 2);
        assert_eq!(stats.delivery_failures, 3);
    }

    #[test]
    fn test_sweep_evicts_after_missed_probe() {
        let manager = ConnectionManager::new();
        let (silent, mut silent_rx) = connect(&manager, 4);
        let (responsive, _rx) = connect(&manager, 4);

        let first = manager.sweep_unresponsive();
        assert_eq!(first, SweepReport { probed: 2, evicted: 0 });
        assert!(matches!(silent_rx.try_recv(), Ok(OutboundMessage::Ping)));

        responsive.mark_alive();
        let second = manager.sweep_unresponsive();
        assert_eq!(second, SweepReport { probed: 1, evicted: 1 });

        assert!(manager.get_connection(silent.id).is_none());
        assert_eq!(silent.state(), ConnectionState::Closed);
        assert!(manager.get_connection(responsive.id).is_some());
        assert_eq!(manager.stats().evictions, 1);
    }

    #[test]
    fn test_responsive_connection_is_never_evicted() {
        let manager = ConnectionManager::new();
        let (handle, mut rx) = connect(&manager, 64);

        for _ in 0..50 {
            let report = manager.sweep_unresponsive();
            assert_eq!(report.evicted, 0);
            assert!(matches!(rx.try_recv(), Ok(OutboundMessage::Ping)));
            handle.mark_alive();
        }

        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_membership_matches_open_and_alive() {
        let manager = ConnectionManager::new();
        let mut expected = HashSet::new();
        let mut receivers = Vec::new();
        let mut handles = Vec::new();

        for i in 0..10 {
            let (handle, rx) = connect(&manager, 8);
            expected.insert(handle.id);
            receivers.push(rx);
            handles.push(handle.clone());
            if i % 3 == 0 {
                manager.unregister(handle.id);
                expected.remove(&handle.id);
            }
        }

        // First sweep probes everyone, then only even-indexed handles answer
        manager.sweep_unresponsive();
        for (i, handle) in handles.iter().enumerate() {
            if i % 2 == 0 {
                handle.mark_alive();
            } else {
                expected.remove(&handle.id);
            }
        }
        manager.sweep_unresponsive();

        let members: HashSet<Uuid> = manager.snapshot().iter().map(|h| h.id).collect();
        assert_eq!(members, expected);
        assert!(manager.snapshot().iter().all(|h| h.is_open()));
    }
}
