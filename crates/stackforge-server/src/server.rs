//! Axum application state and router.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use stackforge_runtime::OrchestratorRegistry;

use crate::ws;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide orchestrator registry.
    pub registry: Arc<OrchestratorRegistry>,
    /// Stack guidance rendered into every agent context.
    pub stack_prompt: String,
    /// When the server started.
    pub start_time: Instant,
}

impl AppState {
    /// State over a registry.
    pub fn new(registry: Arc<OrchestratorRegistry>, stack_prompt: String) -> Self {
        Self {
            registry,
            stack_prompt,
            start_time: Instant::now(),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/ws/chat/{chat_id}", get(ws::chat_socket))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
    orchestrators: usize,
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.start_time.elapsed().as_secs(),
        orchestrators: state.registry.len(),
    })
}
