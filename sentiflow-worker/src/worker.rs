//! Scoring worker loop
//!
//! Consume work items, score, publish results. A bad message is logged and
//! skipped; nothing short of cancellation or a closed subscription stops
//! the loop.

use sentiflow_common::channel::{ChannelError, ChannelMessage, SharedChannel};
use sentiflow_common::time::epoch_seconds;
use sentiflow_common::{CorrelationId, Error, Result, ResultEnvelope, WorkItem};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::scorer::Scorer;

/// Correlation id published for work items that arrived without one
pub const NO_CORRELATION_ID: &str = "no-cid";

const SUBSCRIBE_RETRY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub group_id: String,
    pub input_topic: String,
    pub output_topic: String,
    pub poll_timeout: Duration,
}

/// One scorer bound to an input and output topic
#[derive(Clone)]
pub struct ScoringWorker {
    channel: SharedChannel,
    scorer: Arc<dyn Scorer>,
    config: WorkerConfig,
}

impl ScoringWorker {
    pub fn new(channel: SharedChannel, scorer: Arc<dyn Scorer>, config: WorkerConfig) -> Self {
        Self {
            channel,
            scorer,
            config,
        }
    }

    /// Score one work item and publish its result
    ///
    /// Returns the correlation id the result was published under.
    pub async fn process(&self, message: &ChannelMessage) -> Result<CorrelationId> {
        let item = decode_work_item(&message.payload)?;
        let scoring = self.scorer.score(&item.text());
        let envelope = ResultEnvelope::new(
            item.correlation_id.clone(),
            self.scorer.kind(),
            &scoring,
            epoch_seconds(),
        );
        let payload = serde_json::to_vec(&envelope)?;

        self.channel
            .publish(&self.config.output_topic, item.correlation_id.as_str(), payload)
            .await?;
        debug!(correlation_id = %item.correlation_id, kind = %self.scorer.kind(), "result published");
        Ok(item.correlation_id)
    }

    /// Run until `cancel` fires or the subscription closes
    pub async fn run(self, cancel: CancellationToken) {
        let topics = vec![self.config.input_topic.clone()];
        let mut subscription = loop {
            match self.channel.subscribe(&self.config.group_id, &topics).await {
                Ok(subscription) => break subscription,
                Err(e) => error!(
                    "Worker failed to subscribe to {} (retrying in {:?}): {}",
                    self.config.input_topic, SUBSCRIBE_RETRY, e
                ),
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(SUBSCRIBE_RETRY) => {}
            }
        };
        info!(
            kind = %self.scorer.kind(),
            "Worker consuming {} → {}",
            self.config.input_topic, self.config.output_topic
        );

        let mut processed: u64 = 0;
        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = subscription.poll(self.config.poll_timeout) => polled,
            };

            match polled {
                Ok(Some(message)) => match self.process(&message).await {
                    Ok(_) => processed += 1,
                    Err(e) => warn!("Work item skipped: {}", e),
                },
                Ok(None) => {}
                Err(ChannelError::Closed) => {
                    error!("Work-item subscription closed, worker stopping");
                    break;
                }
                Err(e) => warn!("Channel error while polling work items: {}", e),
            }
        }

        drop(subscription);
        info!(processed, kind = %self.scorer.kind(), "Worker stopped");
    }

    /// Run on a background task
    pub fn spawn(self) -> WorkerHandle {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(self.run(cancel.clone()));
        WorkerHandle { cancel, join }
    }
}

/// Read a work item, tolerating a missing correlation id
fn decode_work_item(payload: &[u8]) -> Result<WorkItem> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| Error::Decode(e.to_string()))?;
    if !value.is_object() {
        return Err(Error::Decode(format!("work item must be an object, got {}", value)));
    }

    let correlation_id = value
        .get("correlation_id")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(NO_CORRELATION_ID);
    let payload = value.get("payload").cloned().unwrap_or(Value::Null);
    Ok(WorkItem::new(correlation_id.into(), payload))
}

/// Owner's handle on a spawned worker
pub struct WorkerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!("Worker task ended abnormally: {}", e);
        }
    }
}
