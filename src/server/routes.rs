//! Router configuration for the web server.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Uploads are capped at 50 MB, matching the largest production print runs.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/runs", post(handlers::create_run))
        .route("/api/runs/:token/status", get(handlers::run_status))
        .route("/api/runs/:token/question", get(handlers::current_question))
        .route("/api/runs/:token/answer", post(handlers::answer_question))
        .route("/api/runs/:token/results", get(handlers::run_results))
        .route(
            "/api/runs/:token/documents/:destination",
            get(handlers::output_document),
        )
        .route("/api/runs/:token/download", get(handlers::download_archive))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
