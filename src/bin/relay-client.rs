//! Command-line relay client.
//!
//! Each stdin line is sent as `{"message": <line>, "interval": <n>}`;
//! `/interval N` changes the interval attached to later lines.
//! Incoming sensor readings are logged.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use telemetry_relay::client::{ClientError, RelayClient};
use telemetry_relay::config::Settings;
use telemetry_relay::telemetry::init_tracing;

#[derive(Debug, PartialEq)]
enum Input {
    SetInterval(u32),
    Send(String),
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    match line.strip_prefix("/interval") {
        Some(rest) => match rest.trim().parse() {
            Ok(n) => Input::SetInterval(n),
            Err(_) => Input::Send(line.to_string()),
        },
        None => Input::Send(line.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    init_tracing(&settings.log);

    let (client, handle) = RelayClient::new(settings.client.clone());
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let client_task = tokio::spawn(client.run(shutdown_tx.subscribe()));

    let mut readings = handle.subscribe_readings();
    let readings_task = tokio::spawn(async move {
        loop {
            match readings.recv().await {
                Ok(reading) => tracing::info!(
                    sensor1 = reading.sensor1,
                    sensor2 = reading.sensor2,
                    sensor3 = reading.sensor3,
                    message = ?reading.message,
                    "Reading"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Reading log fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut status = handle.status_changes();
    let status_task = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            tracing::info!(status = current.as_str(), "Status");
        }
    });

    let mut interval = settings.client.interval;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                };

                match parse_input(&line) {
                    Input::Empty => {}
                    Input::SetInterval(n) => {
                        interval = n;
                        tracing::info!(interval = interval, "Interval updated");
                    }
                    Input::Send(message) => match handle.send_control(message, interval) {
                        Ok(()) => {}
                        Err(ClientError::InvalidInterval(e)) => {
                            tracing::warn!(error = %e, "Not sent");
                        }
                        Err(e) => tracing::warn!(error = %e, "Failed to send"),
                    },
                }
            }
        }
    }

    let _ = shutdown_tx.send(());
    let _ = client_task.await;
    readings_task.abort();
    status_task.abort();

    Ok(())
}
