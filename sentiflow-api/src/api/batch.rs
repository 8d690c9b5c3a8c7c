//! Batch submission endpoints
//!
//! Every text gets its own correlation id and pending entry; results and
//! log rows fill in as workers answer. Items are enqueued in order and the
//! first publish failure aborts the request (items already queued stay
//! queued).

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{ApiJson, Item, QueuedResponse};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const DEFAULT_MAX_ROWS: usize = 1000;

fn default_max_rows() -> Option<usize> {
    Some(DEFAULT_MAX_ROWS)
}

/// POST /batch body
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub csv_path: String,
    pub text_col: String,
    /// Row limit; omitted means 1000, `null` or 0 means every row
    #[serde(default = "default_max_rows")]
    pub max_rows: Option<usize>,
}

/// POST /batch-items body
#[derive(Debug, Deserialize)]
pub struct BatchItems {
    pub items: Vec<Item>,
}

/// POST /batch
///
/// Read `text_col` from a CSV file on the server and enqueue each row.
pub async fn batch_csv(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BatchRequest>,
) -> ApiResult<Json<QueuedResponse>> {
    let path = PathBuf::from(&req.csv_path);
    let limit = req.max_rows.filter(|n| *n > 0);
    let column = req.text_col.clone();

    let texts = tokio::task::spawn_blocking(move || read_text_column(&path, &column, limit))
        .await
        .map_err(|e| ApiError::Internal(format!("CSV reader task failed: {}", e)))??;

    let ids = enqueue_all(&state, texts).await?;
    info!(queued = ids.len(), csv = %req.csv_path, "batch queued");
    Ok(Json(QueuedResponse::new(ids)))
}

/// POST /batch-items
pub async fn batch_items(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<BatchItems>,
) -> ApiResult<Json<QueuedResponse>> {
    let texts = payload.items.into_iter().map(|item| item.text).collect();
    let ids = enqueue_all(&state, texts).await?;
    info!(queued = ids.len(), "batch items queued");
    Ok(Json(QueuedResponse::new(ids)))
}

async fn enqueue_all(state: &AppState, texts: Vec<String>) -> ApiResult<Vec<String>> {
    let mut ids = Vec::with_capacity(texts.len());
    for text in texts {
        let cid = state
            .correlation
            .submit_text(&state.topics.sentiment_in, &text)
            .await?;
        ids.push(cid.to_string());
    }
    Ok(ids)
}

/// Collect up to `limit` values of `column` (header names are trimmed)
pub fn read_text_column(path: &Path, column: &str, limit: Option<usize>) -> ApiResult<Vec<String>> {
    if !path.exists() {
        return Err(ApiError::BadRequest(format!(
            "CSV does not exist: {}",
            path.display()
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ApiError::BadRequest(format!("Cannot open CSV {}: {}", path.display(), e)))?;

    let cols: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let index = cols
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| ApiError::MissingColumn {
            column: column.to_string(),
            cols: cols.clone(),
        })?;

    let mut texts = Vec::new();
    for record in reader.records() {
        if limit.is_some_and(|n| texts.len() >= n) {
            break;
        }
        let record = record.map_err(csv_error)?;
        texts.push(record.get(index).unwrap_or_default().to_string());
    }
    Ok(texts)
}

fn csv_error(err: csv::Error) -> ApiError {
    match err.kind() {
        csv::ErrorKind::Utf8 { .. } => {
            ApiError::BadRequest("CSV is not valid UTF-8; re-encode the file and retry".to_string())
        }
        _ => ApiError::BadRequest(format!("Malformed CSV: {}", err)),
    }
}

/// Build batch routes
pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/batch", post(batch_csv))
        .route("/batch-items", post(batch_items))
}
