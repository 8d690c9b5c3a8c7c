//! HTTP API handlers for sentiflow-api

pub mod batch;
pub mod health;
pub mod predict;
pub mod results;
pub mod stats;

pub use batch::batch_routes;
pub use health::health_routes;
pub use predict::predict_routes;
pub use results::result_routes;
pub use stats::stats_routes;

use axum::extract::{rejection::JsonRejection, FromRequest, Request};
use axum::{async_trait, Json};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `Json` extractor whose rejection is an [`ApiError`], so malformed bodies
/// get the same `{"detail", "code"}` shape as every other failure
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// One text to analyse
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub text: String,
}

/// Response for a single enqueued text
#[derive(Debug, Serialize)]
pub struct EnqueuedResponse {
    pub ok: bool,
    pub correlation_id: String,
}

/// Response for a batch of enqueued texts
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub ok: bool,
    pub queued: usize,
    pub correlation_ids: Vec<String>,
}

impl QueuedResponse {
    pub fn new(correlation_ids: Vec<String>) -> Self {
        Self {
            ok: true,
            queued: correlation_ids.len(),
            correlation_ids,
        }
    }
}
