pub mod api;
pub mod client;
pub mod config;
pub mod connection_manager;
pub mod error;
pub mod metrics;
pub mod server;
pub mod tasks;
pub mod telemetry;
pub mod websocket;
