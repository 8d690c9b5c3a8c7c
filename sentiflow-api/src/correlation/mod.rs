//! Request/response correlation over the message channel
//!
//! The broker only offers publish/subscribe, so pairing a request with its
//! answer is done here:
//! - [`Dispatcher`] publishes work items under fresh correlation ids
//! - [`PendingTable`] remembers the submitted text until the answer arrives
//! - [`Resolver`] drains result topics into the [`ResultsTable`]
//! - [`CorrelationService::get_result`] is what clients poll

pub mod dispatcher;
pub mod pending;
pub mod resolver;
pub mod results;

pub use dispatcher::Dispatcher;
pub use pending::PendingTable;
pub use resolver::{
    Outcome, Resolver, ResolverConfig, ResolverHandle, ResolverState, ResolverStats,
};
pub use results::ResultsTable;

use sentiflow_common::{CorrelationId, Result, ResultEnvelope};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Frontend-facing operations: submit text, look up and acknowledge results
pub struct CorrelationService {
    dispatcher: Dispatcher,
    pending: PendingTable,
    results: Arc<ResultsTable>,
}

impl CorrelationService {
    pub fn new(dispatcher: Dispatcher, pending: PendingTable, results: Arc<ResultsTable>) -> Self {
        Self {
            dispatcher,
            pending,
            results,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn results(&self) -> &Arc<ResultsTable> {
        &self.results
    }

    /// Enqueue `text` to `topic` with automatic result logging
    ///
    /// The pending text is recorded before publishing so a fast worker can
    /// never answer an id the resolver does not know yet. If the publish
    /// fails the pending entry is rolled back.
    pub async fn submit_text(&self, topic: &str, text: &str) -> Result<CorrelationId> {
        let correlation_id = CorrelationId::generate();
        self.pending.insert(&correlation_id, text).await?;

        let payload = json!({ "text": text });
        if let Err(e) = self.dispatcher.enqueue_as(&correlation_id, topic, &payload).await {
            if let Err(rollback) = self.pending.take(&correlation_id).await {
                warn!(correlation_id = %correlation_id, "pending rollback failed: {}", rollback);
            }
            return Err(e);
        }
        Ok(correlation_id)
    }

    /// Non-blocking lookup; `NotFound` while the result is in flight
    pub async fn get_result(&self, correlation_id: &CorrelationId) -> Result<ResultEnvelope> {
        self.results.get(correlation_id).await
    }

    /// Client acknowledgement: forget a result once it has been read
    pub async fn acknowledge(&self, correlation_id: &CorrelationId) -> Option<ResultEnvelope> {
        self.results.remove(correlation_id).await
    }
}
