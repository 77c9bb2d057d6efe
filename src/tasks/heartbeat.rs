use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::config::WebSocketConfig;
use crate::connection_manager::ConnectionManager;
use crate::metrics::HeartbeatMetrics;

/// Background task that probes connections and evicts the ones that stop answering
pub struct HeartbeatTask {
    interval: Duration,
    connection_manager: Arc<ConnectionManager>,
    shutdown: broadcast::Receiver<()>,
}

impl HeartbeatTask {
    pub fn new(
        config: &WebSocketConfig,
        connection_manager: Arc<ConnectionManager>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self::with_interval(
            Duration::from_secs(config.heartbeat_interval),
            connection_manager,
            shutdown,
        )
    }

    pub fn with_interval(
        interval: Duration,
        connection_manager: Arc<ConnectionManager>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            interval,
            connection_manager,
            shutdown,
        }
    }

    /// Run until the shutdown signal fires
    pub async fn run(mut self) {
        let mut heartbeat_timer = tokio::time::interval(self.interval);

        // Skip immediate first tick
        heartbeat_timer.tick().await;

        tracing::info!(
            heartbeat_interval_ms = self.interval.as_millis() as u64,
            "Heartbeat task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Heartbeat task received shutdown signal");
                    break;
                }
                _ = heartbeat_timer.tick() => {
                    self.sweep();
                }
            }
        }

        tracing::info!("Heartbeat task stopped");
    }

    fn sweep(&self) {
        if self.connection_manager.is_empty() {
            return;
        }

        let start = Instant::now();
        let report = self.connection_manager.sweep_unresponsive();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        HeartbeatMetrics::record_sweep(&report, elapsed_ms);

        if report.evicted > 0 {
            tracing::info!(
                evicted = report.evicted,
                probed = report.probed,
                "Evicted unresponsive connections"
            );
        } else {
            tracing::debug!(
                probed = report.probed,
                elapsed_ms = elapsed_ms,
                "Heartbeat round completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::OutboundMessage;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_heartbeat_task_shutdown() {
        let config = WebSocketConfig::default();
        let connection_manager = Arc::new(ConnectionManager::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = HeartbeatTask::new(&config, connection_manager, shutdown_rx);

        let handle = tokio::spawn(async move {
            task.run().await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("Task should complete")
            .expect("Task should not panic");
    }

    #[tokio::test]
    async fn test_heartbeat_pings_then_evicts_silent_connection() {
        let connection_manager = Arc::new(ConnectionManager::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let (tx, mut rx) = mpsc::channel::<OutboundMessage>(10);
        let handle = connection_manager.register(tx);

        let task = HeartbeatTask::with_interval(
            Duration::from_millis(50),
            connection_manager.clone(),
            shutdown_rx,
        );
        let task_handle = tokio::spawn(async move {
            task.run().await;
        });

        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("Should receive heartbeat")
            .expect("Channel should not be closed");
        assert!(matches!(msg, OutboundMessage::Ping));

        // Never answered, so the next sweep closes it
        tokio::time::timeout(Duration::from_secs(2), handle.close_requested())
            .await
            .expect("Silent connection should be closed");
        assert!(connection_manager.get_connection(handle.id).is_none());

        shutdown_tx.send(()).unwrap();
        let _ = task_handle.await;
    }
}
