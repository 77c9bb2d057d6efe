//! Single-page app shell served for unmatched routes.

use axum::{extract::State, http::StatusCode, response::Html};

use crate::error::{AppError, Result};
use crate::server::AppState;

/// Fallback for any path that is neither a route nor a static asset
pub async fn app_shell(State(state): State<AppState>) -> Result<(StatusCode, Html<String>)> {
    let path = state.settings.server.index_path();

    match tokio::fs::read_to_string(&path).await {
        Ok(body) => Ok((StatusCode::NOT_FOUND, Html(body))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound(format!(
            "App shell {} is missing",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}
