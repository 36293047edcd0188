//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Repository backing the file store, as `owner/repo`.
    pub repository: String,
}

/// Health check handler. Does not call the origin.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = state.storage.config();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        repository: format!("{}/{}", config.owner, config.repo),
    })
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
