//! Single-text submission endpoints
//!
//! Both return immediately with a correlation id; the answer is polled from
//! `/result/{cid}`.

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use super::{ApiJson, EnqueuedResponse, Item};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /predict
///
/// Enqueue the text to the sentiment topic.
pub async fn predict(
    State(state): State<AppState>,
    ApiJson(item): ApiJson<Item>,
) -> ApiResult<Json<EnqueuedResponse>> {
    let cid = state
        .correlation
        .submit_text(&state.topics.sentiment_in, &item.text)
        .await?;
    info!(correlation_id = %cid, "queued for sentiment");

    Ok(Json(EnqueuedResponse {
        ok: true,
        correlation_id: cid.to_string(),
    }))
}

/// POST /predict/aspects
///
/// Enqueue the text to the aspect topic; 503 when the aspect family is not
/// configured.
pub async fn predict_aspects(
    State(state): State<AppState>,
    ApiJson(item): ApiJson<Item>,
) -> ApiResult<Json<EnqueuedResponse>> {
    let topic = match (&state.topics.aspect_in, &state.topics.aspect_out) {
        (Some(aspect_in), Some(_)) => aspect_in,
        _ => {
            return Err(ApiError::Unavailable(
                "Aspect analysis is not configured".to_string(),
            ))
        }
    };

    let cid = state.correlation.submit_text(topic, &item.text).await?;
    info!(correlation_id = %cid, "queued for aspects");

    Ok(Json(EnqueuedResponse {
        ok: true,
        correlation_id: cid.to_string(),
    }))
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new()
        .route("/predict", post(predict))
        .route("/predict/aspects", post(predict_aspects))
}
