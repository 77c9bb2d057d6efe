use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, Utf8Bytes, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::connection_manager::{ConnectionHandle, ConnectionState};
use crate::metrics::ConnectionMetrics;
use crate::server::AppState;

use super::message::{ConnectSnapshot, OutboundMessage};

/// Upper bound on the close handshake once eviction has been requested
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip(ws, state))]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    tracing::debug!("WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
#[tracing::instrument(name = "ws.connection", skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    // Create channel for sending messages to this connection
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(state.settings.websocket.channel_buffer);

    // Queued before registration so no relayed message can overtake it
    if let Err(e) = tx.try_send(OutboundMessage::Snapshot(ConnectSnapshot::default())) {
        tracing::warn!(error = %e, "Failed to queue connect snapshot");
    }

    let handle = state.connection_manager.register(tx);
    let connection_id = handle.id;
    ConnectionMetrics::record_opened();

    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    // Split socket into sender and receiver
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for sending messages from channel to WebSocket
    let send_handle = handle.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                _ = send_handle.close_requested() => {
                    let _ = tokio::time::timeout(CLOSE_TIMEOUT, async {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        let _ = ws_sender.close().await;
                    })
                    .await;
                    break;
                }
                msg = rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            let frame = match msg.into_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };

            // A peer that stopped reading can block this write forever
            tokio::select! {
                _ = send_handle.close_requested() => {
                    tracing::debug!(connection_id = %send_handle.id, "Close requested during a stalled write, dropping transport");
                    break;
                }
                result = ws_sender.send(frame) => {
                    if result.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Task for receiving messages from WebSocket
    let state_clone = state.clone();
    let handle_clone = handle.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &state_clone, &handle_clone) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id = %handle_clone.id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Whichever side finishes first takes the other down with it
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
            send_task.abort();
        }
    }

    state.connection_manager.unregister(connection_id);

    let duration = handle.connected_for().as_secs_f64();
    ConnectionMetrics::record_closed(duration);

    tracing::info!(
        connection_id = %connection_id,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}

/// Process a received WebSocket message.
/// Returns false if the connection should be closed.
fn process_message(msg: Message, state: &AppState, handle: &Arc<ConnectionHandle>) -> bool {
    match msg {
        Message::Text(text) => {
            relay(text, state, handle);
            true
        }
        Message::Binary(bytes) => {
            // Peers always receive text
            let text = String::from_utf8_lossy(&bytes).into_owned();
            relay(Utf8Bytes::from(text), state, handle);
            true
        }
        Message::Ping(_) => {
            // Axum answers pings itself
            true
        }
        Message::Pong(_) => {
            handle.mark_alive();
            true
        }
        Message::Close(_) => {
            tracing::debug!(connection_id = %handle.id, "Received close frame");
            handle.set_state(ConnectionState::Closing);
            false
        }
    }
}

fn relay(payload: Utf8Bytes, state: &AppState, handle: &Arc<ConnectionHandle>) {
    let len = payload.as_str().len();
    let report = state.connection_manager.broadcast(handle.id, payload);

    tracing::debug!(
        connection_id = %handle.id,
        bytes = len,
        delivered = report.delivered,
        skipped = report.skipped,
        failed = report.failed,
        "Relayed message"
    );
}
