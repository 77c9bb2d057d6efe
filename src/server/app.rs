use axum::{
    routing::{any, get},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::api::{api_routes, app_shell};
use crate::websocket::ws_handler;

use super::AppState;

pub fn create_app(state: AppState) -> Router {
    let ws_path = state.settings.websocket.path.clone();

    // Static assets; anything not on disk gets the app shell with a 404
    let shell = any(app_shell).with_state(state.clone());
    let assets = ServeDir::new(&state.settings.server.static_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(shell);

    Router::new()
        // WebSocket endpoint
        .route(&ws_path, get(ws_handler))
        // Merge API routes
        .merge(api_routes())
        .fallback_service(assets)
        // Add middleware
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        // Add state
        .with_state(state)
}
