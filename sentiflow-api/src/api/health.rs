//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the HTTP frontend answers
    pub status: String,
    pub module: String,
    pub version: String,
    /// Resolver lifecycle state ("polling" in steady state)
    pub resolver: String,
    pub uptime_seconds: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let resolver = state.resolver_state.borrow().as_str().to_string();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "sentiflow-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        resolver,
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
