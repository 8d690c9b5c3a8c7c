//! Correlation dispatcher
//!
//! Turns a payload into a work item with a fresh correlation id and hands it
//! to the channel keyed by that id. Returns as soon as the channel has
//! buffered the message; never waits for a worker. No retries here: a failed
//! publish is reported to the caller as is.

use serde::Serialize;
use sentiflow_common::channel::SharedChannel;
use sentiflow_common::{CorrelationId, Error, Result, WorkItem};
use tracing::debug;

pub struct Dispatcher {
    channel: SharedChannel,
}

impl Dispatcher {
    pub fn new(channel: SharedChannel) -> Self {
        Self { channel }
    }

    /// Publish `payload` to `topic` under a newly generated correlation id
    ///
    /// ## Errors
    /// - [`Error::Serialization`]: payload is not representable as JSON
    /// - [`Error::ChannelUnavailable`]: broker unreachable or buffer full
    pub async fn enqueue<P: Serialize + ?Sized>(&self, topic: &str, payload: &P) -> Result<CorrelationId> {
        let correlation_id = CorrelationId::generate();
        self.enqueue_as(&correlation_id, topic, payload).await?;
        Ok(correlation_id)
    }

    /// Publish under a caller-chosen id (used when the id must be recorded
    /// before the message can possibly be answered)
    pub(crate) async fn enqueue_as<P: Serialize + ?Sized>(
        &self,
        correlation_id: &CorrelationId,
        topic: &str,
        payload: &P,
    ) -> Result<()> {
        let payload = serde_json::to_value(payload).map_err(|e| Error::Serialization(e.to_string()))?;
        let item = WorkItem::new(correlation_id.clone(), payload);
        let bytes = serde_json::to_vec(&item).map_err(|e| Error::Serialization(e.to_string()))?;

        self.channel
            .publish(topic, correlation_id.as_str(), bytes)
            .await?;

        debug!(correlation_id = %correlation_id, topic, "work item enqueued");
        Ok(())
    }
}
