//! Operational HTTP endpoints.

use crate::error::WorkerResult;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Health check handler.
pub async fn health_check(State(state): State<AppState>) -> WorkerResult<Json<HealthResponse>> {
    // Check metadata store connectivity
    state.metadata.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// Create the operational router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(health_check));

    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
