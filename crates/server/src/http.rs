//! HTTP endpoints
//!
//! The device-facing surface is the WebSocket route; the rest is health and
//! metrics plumbing.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::ws::ws_handler;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Device connections
        .route("/ws/:agent_id", get(ws_handler))
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "tts_module": state.settings.selected_module.tts,
        "audio_format": state.settings.audio_format.as_str(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_dialog_config::Settings;

    #[test]
    fn test_router_creation() {
        let state = AppState::new(Settings::default());
        let _ = create_router(state);
    }
}
