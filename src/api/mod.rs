//! HTTP endpoints other than the WebSocket upgrade.

mod health;
mod metrics;
mod routes;
mod shell;

pub use health::{health, stats, HealthResponse, StatsResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use shell::app_shell;
