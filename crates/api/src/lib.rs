//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - Admin file routes (upload, lookup, read, remove, entity cleanup)
//! - Static bearer token middleware
//! - JSON error responses

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::AUTHORIZATION;
use ifmsa_core::attachment::AttachmentService;
use ifmsa_core::storage::ContentStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Content store for lookups, reads and removals.
    pub storage: Arc<ContentStore>,
    /// Entity-level upload and cleanup conventions.
    pub attachments: Arc<AttachmentService>,
    /// Token admin clients must present as `Authorization: Bearer <token>`.
    pub admin_token: Arc<str>,
}

impl AppState {
    /// Wire the services around one store.
    #[must_use]
    pub fn new(storage: ContentStore, admin_token: impl Into<Arc<str>>) -> Self {
        let storage = Arc::new(storage);
        Self {
            attachments: Arc::new(AttachmentService::new(Arc::clone(&storage))),
            storage,
            admin_token: admin_token.into(),
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    let max_file_size = usize::try_from(state.storage.config().max_file_size).unwrap_or(usize::MAX);

    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(DefaultBodyLimit::max(
            max_file_size.saturating_add(MULTIPART_OVERHEAD),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(SetSensitiveRequestHeadersLayer::new([AUTHORIZATION]))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
