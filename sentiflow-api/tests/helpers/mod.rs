//! Shared fixtures for sentiflow-api integration tests
#![allow(dead_code)]

use axum::Router;
use sentiflow_api::correlation::{
    CorrelationService, Dispatcher, PendingTable, Resolver, ResolverConfig, ResolverState,
    ResolverStats, ResultsTable,
};
use sentiflow_api::report_log::ReportLog;
use sentiflow_api::{build_router, AppState};
use sentiflow_common::channel::{ChannelMessage, InMemoryChannel, SharedChannel};
use sentiflow_common::config::TopicConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

/// Everything the correlation layer needs, wired to an in-process channel
pub struct Harness {
    pub memory: InMemoryChannel,
    pub channel: SharedChannel,
    pub pending: PendingTable,
    pub results: Arc<ResultsTable>,
    pub report: Arc<ReportLog>,
    pub stats: Arc<ResolverStats>,
    pub service: Arc<CorrelationService>,
    pub topics: TopicConfig,
    pub reports_dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_topics(TopicConfig::default()).await
    }

    pub async fn with_topics(topics: TopicConfig) -> Self {
        let pending = PendingTable::in_memory(Duration::from_secs(3600), 1000)
            .await
            .unwrap();
        Self::with_pending(topics, pending)
    }

    pub fn with_pending(topics: TopicConfig, pending: PendingTable) -> Self {
        let memory = InMemoryChannel::recording();
        let channel: SharedChannel = Arc::new(memory.clone());
        let reports_dir = tempfile::tempdir().unwrap();
        let report = Arc::new(ReportLog::new(reports_dir.path()).unwrap());
        let results = Arc::new(ResultsTable::new(Duration::from_secs(3600), 1000));
        let service = Arc::new(CorrelationService::new(
            Dispatcher::new(Arc::clone(&channel)),
            pending.clone(),
            Arc::clone(&results),
        ));

        Self {
            memory,
            channel,
            pending,
            results,
            report,
            stats: Arc::new(ResolverStats::default()),
            service,
            topics,
            reports_dir,
        }
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(
            Arc::clone(&self.results),
            self.pending.clone(),
            Arc::clone(&self.report),
            self.topics.clone(),
            Arc::clone(&self.stats),
        )
    }

    /// Router with a resolver state that never changes
    pub fn router(&self) -> Router {
        let (_tx, rx) = watch::channel(ResolverState::Polling);
        self.router_with_state(rx)
    }

    pub fn router_with_state(&self, resolver_state: watch::Receiver<ResolverState>) -> Router {
        let state = AppState::new(
            Arc::clone(&self.service),
            self.topics.clone(),
            resolver_state,
            Arc::clone(&self.stats),
        );
        build_router(state)
    }

    pub fn result_rows(&self) -> Vec<csv::StringRecord> {
        read_rows(self.report.results_path())
    }

    pub fn alert_rows(&self) -> Vec<csv::StringRecord> {
        read_rows(self.report.alerts_path())
    }
}

pub fn fast_resolver_config() -> ResolverConfig {
    ResolverConfig {
        group_id: "test-resolver".to_string(),
        poll_timeout: Duration::from_millis(20),
        sweep_interval: Duration::from_secs(60),
    }
}

pub fn result_message(topic: &str, body: serde_json::Value) -> ChannelMessage {
    let key = body["correlation_id"].as_str().map(str::to_string);
    ChannelMessage::new(topic, key.as_deref(), serde_json::to_vec(&body).unwrap())
}

/// Rows of a CSV log, empty when the file was never created
pub fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
    if !path.exists() {
        return Vec::new();
    }
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.records().map(|r| r.unwrap()).collect()
}

/// Poll `check` every 10ms for up to 2s
pub async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
