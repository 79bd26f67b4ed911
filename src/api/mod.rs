//! HTTP API: `GET /health`, `POST /embed`, `POST /batch-embed`.

pub mod error;
pub mod handlers;
pub mod server;
pub mod types;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::embedder::Embedder;

pub use error::ApiError;
pub use server::serve;

/// Request bodies above this size are refused before parsing, as a 500
/// `{"error": ...}` like any other unreadable body.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub embedder: Arc<dyn Embedder>,
    pub max_batch_size: Option<usize>,
    pub reject_unknown_type: bool,
}

impl AppState {
    pub fn new(embedder: Arc<dyn Embedder>, api: &ApiConfig) -> Self {
        Self {
            embedder,
            max_batch_size: api.max_batch_size,
            reject_unknown_type: api.reject_unknown_type,
        }
    }
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/embed", post(handlers::embed))
        .route("/batch-embed", post(handlers::batch_embed))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
