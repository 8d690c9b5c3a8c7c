//! Result lookup endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use sentiflow_common::{CorrelationId, Error, ResultEnvelope};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

const NOT_FOUND_YET: &str = "Result not found yet";

/// GET /result/:cid
///
/// Returns the stored envelope unchanged, or 404 while still in flight.
/// Callers are expected to poll with their own backoff and timeout.
pub async fn get_result(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> ApiResult<Json<ResultEnvelope>> {
    match state.correlation.get_result(&CorrelationId::from(cid)).await {
        Ok(envelope) => Ok(Json(envelope)),
        Err(Error::NotFound(_)) => Err(ApiError::NotFound(NOT_FOUND_YET.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// DELETE /result/:cid
///
/// Acknowledge a result so it is evicted right away.
pub async fn acknowledge_result(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> ApiResult<Json<Value>> {
    match state.correlation.acknowledge(&CorrelationId::from(cid)).await {
        Some(_) => Ok(Json(json!({ "ok": true }))),
        None => Err(ApiError::NotFound(NOT_FOUND_YET.to_string())),
    }
}

/// Build result routes
pub fn result_routes() -> Router<AppState> {
    Router::new().route("/result/:cid", get(get_result).delete(acknowledge_result))
}
