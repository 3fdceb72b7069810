//! Web server exposing the run pipeline.
//!
//! Handlers are thin: they parse transport concerns and delegate every
//! decision to the [`RunCoordinator`]. Business errors map to stable error
//! kinds and status codes.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::coordinator::RunCoordinator;
use crate::store::SessionStore;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RunCoordinator>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let store = Arc::new(SessionStore::new(settings.session_ttl()));
        let coordinator = Arc::new(RunCoordinator::new(
            store,
            settings.results_dir.clone(),
            settings.extractor_config(),
        ));
        Self {
            coordinator,
            settings: Arc::new(settings),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: Settings, bind: &str) -> anyhow::Result<()> {
    let state = AppState::new(settings);

    // Periodic expiry of abandoned runs.
    let store = state.coordinator.store().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            store.expire_stale();
        }
    });

    let app = create_router(state);
    let addr: SocketAddr = bind.parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_app() -> (axum::Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            upload_dir: dir.path().join("uploads"),
            results_dir: dir.path().join("results"),
            ..Settings::default()
        };
        (create_router(AppState::new(settings)), dir)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_run_is_404() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/runs/no-such-token/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_answer_requires_valid_response_char() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/runs/no-such-token/answer")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"response\": \"y\"}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        // Unknown token, not a protocol error.
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_destination_is_404() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/runs/no-such-token/documents/sideways")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
