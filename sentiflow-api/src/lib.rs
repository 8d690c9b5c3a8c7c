//! sentiflow-api library - review submission and result correlation
//!
//! Hosts the HTTP frontend (dispatch and lookup) and the background result
//! resolver. The two only share the correlation tables.

use axum::Router;
use chrono::{DateTime, Utc};
use sentiflow_common::config::TopicConfig;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod correlation;
pub mod error;
pub mod report_log;

pub use crate::error::{ApiError, ApiResult};

use correlation::{CorrelationService, ResolverState, ResolverStats};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Dispatch, pending and results tables
    pub correlation: Arc<CorrelationService>,
    /// Topic names for enqueueing
    pub topics: Arc<TopicConfig>,
    /// Resolver lifecycle, for health reporting
    pub resolver_state: watch::Receiver<ResolverState>,
    /// Resolver counters
    pub stats: Arc<ResolverStats>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        correlation: Arc<CorrelationService>,
        topics: TopicConfig,
        resolver_state: watch::Receiver<ResolverState>,
        stats: Arc<ResolverStats>,
    ) -> Self {
        Self {
            correlation,
            topics: Arc::new(topics),
            resolver_state,
            stats,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::predict_routes())
        .merge(api::batch_routes())
        .merge(api::result_routes())
        .merge(api::stats_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
