//! Relay client against a live server.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use telemetry_relay::client::{ClientError, ClientHandle, ClientStatus, RelayClient, Sensor};
use telemetry_relay::config::{ClientConfig, Settings};
use telemetry_relay::server::{create_app, AppState};
use telemetry_relay::websocket::SensorReading;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

async fn start_server() -> (SocketAddr, AppState) {
    let state = AppState::new(Settings::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_app(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        url: format!("ws://{}/ws", addr),
        reconnect_delay_ms: 100,
        ..Default::default()
    }
}

async fn next_reading(rx: &mut broadcast::Receiver<SensorReading>) -> SensorReading {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a reading")
        .expect("reading channel closed")
}

/// Start a client and wait until the server's connect snapshot arrives
async fn start_client(
    addr: SocketAddr,
) -> (ClientHandle, broadcast::Receiver<SensorReading>, broadcast::Sender<()>) {
    let (client, handle) = RelayClient::new(client_config(addr));
    let mut readings = handle.subscribe_readings();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(client.run(shutdown_rx));

    let snapshot = next_reading(&mut readings).await;
    assert_eq!(snapshot.message.as_deref(), Some("Connected to server"));
    assert_eq!(handle.status(), ClientStatus::Connected);

    (handle, readings, shutdown_tx)
}

#[tokio::test]
async fn test_client_receives_readings_from_producer() {
    let (addr, _state) = start_server().await;
    let (handle, mut readings, shutdown_tx) = start_client(addr).await;

    let (mut producer, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    // Wait for the producer's own snapshot so it is registered
    let _ = producer.next().await;

    producer
        .send(Message::Text(
            r#"{"sensor1":21.5,"sensor2":48,"sensor3":90}"#.to_string(),
        ))
        .await
        .unwrap();

    let reading = next_reading(&mut readings).await;
    assert_eq!(reading.sensor1, 21.5);
    assert_eq!(reading.sensor3, 90.0);

    let history = handle.history();
    let history = history.read().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history.series(Sensor::Two), vec![0.0, 48.0]);

    shutdown_tx.send(()).unwrap();
}

#[tokio::test]
async fn test_control_message_sent_and_invalid_interval_rejected() {
    let (addr, _state) = start_server().await;
    let (handle, _readings, shutdown_tx) = start_client(addr).await;

    let (mut peer, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    let _ = peer.next().await;

    let err = handle.send_control("too slow", 9999).unwrap_err();
    assert!(matches!(err, ClientError::InvalidInterval(_)));

    handle.send_control("hi", 5).unwrap();

    let frame = tokio::time::timeout(RECV_TIMEOUT, peer.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(
        frame,
        Message::Text(r#"{"message":"hi","interval":5}"#.to_string())
    );

    shutdown_tx.send(()).unwrap();
}

#[tokio::test]
async fn test_client_reconnects_after_server_closes_connection() {
    let (addr, state) = start_server().await;
    let (handle, mut readings, shutdown_tx) = start_client(addr).await;

    for connection in state.connection_manager.snapshot() {
        connection.request_close();
    }

    // A fresh snapshot means a fresh connection
    let snapshot = next_reading(&mut readings).await;
    assert_eq!(snapshot.message.as_deref(), Some("Connected to server"));
    assert_eq!(handle.status(), ClientStatus::Connected);
    assert_eq!(state.connection_manager.len(), 1);

    shutdown_tx.send(()).unwrap();
    let mut status = handle.status_changes();
    tokio::time::timeout(RECV_TIMEOUT, status.wait_for(|s| *s == ClientStatus::Stopped))
        .await
        .expect("client should stop")
        .unwrap();
}
