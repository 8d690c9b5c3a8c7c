//! Result resolver
//!
//! ## Purpose
//! Long-lived background task that drains the result topics, matches each
//! result to its correlation id, stores it in the results table and writes
//! the log rows for correlations this process issued.
//!
//! ## State machine
//! `Starting → Subscribed → Polling ⇄ Processing → … → Stopped`
//!
//! ## Invariants
//! - Nothing that goes wrong with one message leaves `process_message`
//! - A duplicate result overwrites the stored one and never logs twice,
//!   because the pending text is consumed by the first resolution
//! - Cancellation is observed between messages only; a message being
//!   processed always finishes

use serde::Serialize;
use sentiflow_common::analysis::{self, Urgency};
use sentiflow_common::channel::{ChannelError, ChannelMessage, SharedChannel, Subscription};
use sentiflow_common::config::TopicConfig;
use sentiflow_common::{CorrelationId, Error, ResultEnvelope, ScoringResult, WorkerKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::pending::PendingTable;
use super::results::ResultsTable;
use crate::report_log::{LogEntry, ReportLog, AUTO_THRESHOLD_REASON};

/// Delay before retrying a failed subscribe
const SUBSCRIBE_RETRY: Duration = Duration::from_secs(3);

/// Lifecycle of the resolver task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverState {
    Starting,
    Subscribed,
    Polling,
    Processing,
    Stopped,
}

impl ResolverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolverState::Starting => "starting",
            ResolverState::Subscribed => "subscribed",
            ResolverState::Polling => "polling",
            ResolverState::Processing => "processing",
            ResolverState::Stopped => "stopped",
        }
    }
}

/// Runtime knobs for the polling loop
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub group_id: String,
    pub poll_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            group_id: "integration-api-v1".to_string(),
            poll_timeout: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Counters exposed on `/stats`
#[derive(Debug, Default)]
pub struct ResolverStats {
    pub messages_received: AtomicU64,
    pub results_stored: AtomicU64,
    pub duplicates: AtomicU64,
    pub malformed: AtomicU64,
    pub missing_correlation_id: AtomicU64,
    pub unmatched_results: AtomicU64,
    pub rows_logged: AtomicU64,
    pub alerts_logged: AtomicU64,
    pub processing_errors: AtomicU64,
}

/// Point-in-time copy of [`ResolverStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverStatsSnapshot {
    pub messages_received: u64,
    pub results_stored: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub missing_correlation_id: u64,
    pub unmatched_results: u64,
    pub rows_logged: u64,
    pub alerts_logged: u64,
    pub processing_errors: u64,
}

impl ResolverStats {
    pub fn snapshot(&self) -> ResolverStatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ResolverStatsSnapshot {
            messages_received: get(&self.messages_received),
            results_stored: get(&self.results_stored),
            duplicates: get(&self.duplicates),
            malformed: get(&self.malformed),
            missing_correlation_id: get(&self.missing_correlation_id),
            unmatched_results: get(&self.unmatched_results),
            rows_logged: get(&self.rows_logged),
            alerts_logged: get(&self.alerts_logged),
            processing_errors: get(&self.processing_errors),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Why a message was dropped without touching the results table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Malformed,
    MissingCorrelationId,
}

/// What processing one message did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stored {
        correlation_id: CorrelationId,
        /// Pending text was found and a result row written
        logged: bool,
        /// An alert row was written as well
        alerted: bool,
    },
    Discarded(DiscardReason),
}

/// Shared pieces the resolver writes to
#[derive(Clone)]
pub struct Resolver {
    results: Arc<ResultsTable>,
    pending: PendingTable,
    report: Arc<ReportLog>,
    topics: TopicConfig,
    stats: Arc<ResolverStats>,
}

impl Resolver {
    pub fn new(
        results: Arc<ResultsTable>,
        pending: PendingTable,
        report: Arc<ReportLog>,
        topics: TopicConfig,
        stats: Arc<ResolverStats>,
    ) -> Self {
        Self {
            results,
            pending,
            report,
            topics,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<ResolverStats> {
        Arc::clone(&self.stats)
    }

    /// Start the polling task
    pub fn spawn(self, channel: SharedChannel, config: ResolverConfig) -> ResolverHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ResolverState::Starting);
        let join = tokio::spawn(self.run(channel, config, cancel.clone(), state_tx));
        ResolverHandle {
            cancel,
            join,
            state: state_rx,
        }
    }

    async fn run(
        self,
        channel: SharedChannel,
        config: ResolverConfig,
        cancel: CancellationToken,
        state: watch::Sender<ResolverState>,
    ) {
        let topics = self.topics.result_topics();

        let Some(mut subscription) = Self::subscribe(&channel, &config, &topics, &cancel).await else {
            state.send_replace(ResolverState::Stopped);
            info!("Resolver cancelled before subscribing");
            return;
        };
        state.send_replace(ResolverState::Subscribed);
        info!("Listening for results on: {}", topics.join(", "));

        let mut last_sweep = Instant::now();
        loop {
            state.send_replace(ResolverState::Polling);
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = subscription.poll(config.poll_timeout) => polled,
            };

            match polled {
                Ok(Some(message)) => {
                    state.send_replace(ResolverState::Processing);
                    self.process_message(&message).await;
                }
                Ok(None) => {}
                Err(ChannelError::Closed) => {
                    error!("Result subscription closed, resolver stopping");
                    break;
                }
                Err(e) => warn!("Channel error while polling results: {}", e),
            }

            if last_sweep.elapsed() >= config.sweep_interval {
                self.sweep().await;
                last_sweep = Instant::now();
            }
        }

        drop(subscription);
        state.send_replace(ResolverState::Stopped);
        info!("Resolver stopped, subscription released");
    }

    async fn subscribe(
        channel: &SharedChannel,
        config: &ResolverConfig,
        topics: &[String],
        cancel: &CancellationToken,
    ) -> Option<Box<dyn Subscription>> {
        loop {
            match channel.subscribe(&config.group_id, topics).await {
                Ok(subscription) => return Some(subscription),
                Err(e) => {
                    error!(
                        "Failed to subscribe to result topics (retrying in {:?}): {}",
                        SUBSCRIBE_RETRY, e
                    );
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(SUBSCRIBE_RETRY) => {}
            }
        }
    }

    /// Evict expired entries from both tables
    pub async fn sweep(&self) {
        let results = self.results.evict_expired().await;
        match self.pending.evict_expired().await {
            Ok(pending) if pending > 0 || results > 0 => {
                info!(results, pending, "evicted expired correlation entries");
            }
            Ok(_) => {}
            Err(e) => warn!("Pending eviction failed: {}", e),
        }
    }

    /// Handle one message from a result topic
    pub async fn process_message(&self, message: &ChannelMessage) -> Outcome {
        bump(&self.stats.messages_received);

        let envelope = match decode(&message.payload) {
            Ok(envelope) => envelope,
            Err(reason) => {
                match reason {
                    DiscardReason::Malformed => bump(&self.stats.malformed),
                    DiscardReason::MissingCorrelationId => {
                        bump(&self.stats.missing_correlation_id)
                    }
                }
                return Outcome::Discarded(reason);
            }
        };

        let correlation_id = envelope.correlation_id.clone();
        let default_kind = self.kind_for_topic(&message.topic);

        if self.results.insert(envelope.clone()).await {
            bump(&self.stats.duplicates);
            debug!(correlation_id = %correlation_id, "duplicate result overwrote stored value");
        }
        bump(&self.stats.results_stored);

        let text = match self.pending.take(&correlation_id).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                bump(&self.stats.unmatched_results);
                debug!(correlation_id = %correlation_id, "no pending text, skipping log rows");
                return Outcome::Stored {
                    correlation_id,
                    logged: false,
                    alerted: false,
                };
            }
            Err(e) => {
                bump(&self.stats.processing_errors);
                error!(correlation_id = %correlation_id, "pending lookup failed: {}", e);
                return Outcome::Stored {
                    correlation_id,
                    logged: false,
                    alerted: false,
                };
            }
        };

        if text.is_empty() {
            debug!(correlation_id = %correlation_id, "empty text, skipping log rows");
            return Outcome::Stored {
                correlation_id,
                logged: false,
                alerted: false,
            };
        }

        let entry = analyse(&envelope, default_kind, text);
        info!(correlation_id = %correlation_id, sentiment = %entry.sentiment, urgency = %entry.urgency, "stored");
        let (logged, alerted) = self.write_rows(&correlation_id, entry).await;

        Outcome::Stored {
            correlation_id,
            logged,
            alerted,
        }
    }

    fn kind_for_topic(&self, topic: &str) -> WorkerKind {
        match &self.topics.aspect_out {
            Some(aspect_out) if aspect_out == topic => WorkerKind::Aspect,
            _ => WorkerKind::Sentiment,
        }
    }

    /// Append the result row, plus an alert row for negative/high, off the
    /// async runtime
    async fn write_rows(&self, correlation_id: &CorrelationId, entry: LogEntry) -> (bool, bool) {
        let wants_alert =
            entry.sentiment == "negative" && entry.urgency == Urgency::High.as_str();
        let report = Arc::clone(&self.report);

        let written = tokio::task::spawn_blocking(move || {
            let result = report.append_result(&entry);
            let alert = wants_alert.then(|| report.append_alert(&entry, AUTO_THRESHOLD_REASON));
            (result, alert)
        })
        .await;

        let (result, alert) = match written {
            Ok(pair) => pair,
            Err(e) => {
                bump(&self.stats.processing_errors);
                error!(correlation_id = %correlation_id, "log writer task failed: {}", e);
                return (false, false);
            }
        };

        let logged = match result {
            Ok(()) => {
                bump(&self.stats.rows_logged);
                true
            }
            Err(e) => {
                bump(&self.stats.processing_errors);
                error!(correlation_id = %correlation_id, "result log append failed: {}", e);
                false
            }
        };

        let alerted = match alert {
            None => false,
            Some(Ok(())) => {
                bump(&self.stats.alerts_logged);
                warn!(correlation_id = %correlation_id, "negative/high alert raised");
                true
            }
            Some(Err(e)) => {
                bump(&self.stats.processing_errors);
                error!(correlation_id = %correlation_id, "alert log append failed: {}", e);
                false
            }
        };
        (logged, alerted)
    }
}

/// Parse a result envelope, classifying failures
fn decode(payload: &[u8]) -> Result<ResultEnvelope, DiscardReason> {
    let value: serde_json::Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!("Discarding undecodable result message: {}", Error::Decode(e.to_string()));
            return Err(DiscardReason::Malformed);
        }
    };

    let has_id = value
        .get("correlation_id")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.trim().is_empty());
    if !has_id {
        debug!("Discarding result without correlation_id");
        return Err(DiscardReason::MissingCorrelationId);
    }

    serde_json::from_value(value).map_err(|e| {
        warn!("Discarding malformed result envelope: {}", Error::Decode(e.to_string()));
        DiscardReason::Malformed
    })
}

/// Derive sentiment, urgency and aspects for the log row
fn analyse(envelope: &ResultEnvelope, default_kind: WorkerKind, text: String) -> LogEntry {
    let scoring = envelope.scoring(default_kind).unwrap_or_else(|e| {
        warn!(correlation_id = %envelope.correlation_id, "uninterpretable result, using keywords: {}", e);
        ScoringResult::Sentiment {
            prediction: None,
            proba: None,
        }
    });

    let (sentiment, aspects) = match scoring {
        ScoringResult::Sentiment { prediction, .. } => (
            prediction.unwrap_or_else(|| "neutral".to_string()),
            analysis::format_aspect_names(&analysis::keyword_aspects(&text)),
        ),
        ScoringResult::Aspects(map) => ("neutral".to_string(), analysis::format_aspect_labels(&map)),
    };
    let sentiment = analysis::normalize_label(&sentiment);
    let urgency = analysis::urgency(&text, &sentiment);

    LogEntry {
        ts: sentiflow_common::time::now(),
        text,
        sentiment,
        urgency: urgency.as_str().to_string(),
        aspects,
    }
}

/// Owner's handle on the running resolver
pub struct ResolverHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    state: watch::Receiver<ResolverState>,
}

impl ResolverHandle {
    /// Watch the resolver's lifecycle state
    pub fn state(&self) -> watch::Receiver<ResolverState> {
        self.state.clone()
    }

    /// Request shutdown without waiting
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Request shutdown and wait for the task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!("Resolver task ended abnormally: {}", e);
        }
    }
}
