//! Correlation layer diagnostics

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::correlation::resolver::ResolverStatsSnapshot;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub resolver_state: String,
    pub pending: u64,
    pub results: usize,
    pub counters: ResolverStatsSnapshot,
}

/// GET /stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let pending = state.correlation.pending().len().await?;
    let results = state.correlation.results().len().await;
    let resolver_state = state.resolver_state.borrow().as_str().to_string();

    Ok(Json(StatsResponse {
        resolver_state,
        pending,
        results,
        counters: state.stats.snapshot(),
    }))
}

/// Build stats routes
pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}
