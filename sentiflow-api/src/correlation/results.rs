//! Results table: correlation id → last result envelope received
//!
//! Bounded two ways: entries expire after a TTL, and when capacity is
//! exceeded the least recently resolved entry goes first. Clients may also
//! acknowledge a result, which removes it immediately.
//!
//! Every stored envelope is also broadcast to [`ResultsTable::subscribe`]
//! receivers, in storage order.

use sentiflow_common::{CorrelationId, Error, ResultEnvelope, Result};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Stored envelopes a lagging subscriber may fall behind by
const UPDATE_BUFFER: usize = 256;

struct StoredResult {
    envelope: ResultEnvelope,
    stored_at: Instant,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CorrelationId, StoredResult>,
    /// Resolution order: seq → id, oldest first
    order: BTreeMap<u64, CorrelationId>,
    next_seq: u64,
}

impl Inner {
    fn remove(&mut self, correlation_id: &CorrelationId) -> Option<StoredResult> {
        let stored = self.entries.remove(correlation_id)?;
        self.order.remove(&stored.seq);
        Some(stored)
    }

    fn pop_oldest(&mut self) -> Option<CorrelationId> {
        let (_, oldest) = self.order.pop_first()?;
        self.entries.remove(&oldest);
        Some(oldest)
    }

    fn oldest_stored_at(&self) -> Option<Instant> {
        let (_, id) = self.order.first_key_value()?;
        self.entries.get(id).map(|s| s.stored_at)
    }
}

/// Thread-safe store of resolved results
pub struct ResultsTable {
    inner: RwLock<Inner>,
    ttl: Duration,
    capacity: usize,
    updates: broadcast::Sender<ResultEnvelope>,
}

impl ResultsTable {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ttl,
            capacity: capacity.max(1),
            updates: broadcast::channel(UPDATE_BUFFER).0,
        }
    }

    /// Receive each envelope as it is stored, duplicates included
    pub fn subscribe(&self) -> broadcast::Receiver<ResultEnvelope> {
        self.updates.subscribe()
    }

    /// Store or overwrite the result for its correlation id
    ///
    /// Returns `true` when an earlier result was replaced (duplicate delivery).
    pub async fn insert(&self, envelope: ResultEnvelope) -> bool {
        let correlation_id = envelope.correlation_id.clone();
        let mut inner = self.inner.write().await;

        if self.updates.receiver_count() > 0 {
            // Sent under the write lock so receivers see storage order
            let _ = self.updates.send(envelope.clone());
        }

        let replaced = inner.remove(&correlation_id).is_some();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, correlation_id.clone());
        inner.entries.insert(
            correlation_id,
            StoredResult {
                envelope,
                stored_at: Instant::now(),
                seq,
            },
        );

        while inner.entries.len() > self.capacity {
            if let Some(evicted) = inner.pop_oldest() {
                debug!(correlation_id = %evicted, "results table over capacity, evicted");
            }
        }
        replaced
    }

    /// Look up a resolved result
    ///
    /// ## Errors
    /// - [`Error::NotFound`]: unknown, still in flight, expired, or acknowledged
    pub async fn get(&self, correlation_id: &CorrelationId) -> Result<ResultEnvelope> {
        let inner = self.inner.read().await;
        match inner.entries.get(correlation_id) {
            Some(stored) if stored.stored_at.elapsed() <= self.ttl => Ok(stored.envelope.clone()),
            _ => Err(Error::NotFound(correlation_id.to_string())),
        }
    }

    /// Remove a result (client acknowledgement)
    pub async fn remove(&self, correlation_id: &CorrelationId) -> Option<ResultEnvelope> {
        let mut inner = self.inner.write().await;
        inner.remove(correlation_id).map(|stored| stored.envelope)
    }

    pub async fn contains(&self, correlation_id: &CorrelationId) -> bool {
        self.inner.read().await.entries.contains_key(correlation_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop entries older than the TTL; returns how many were removed
    pub async fn evict_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        while let Some(stored_at) = inner.oldest_stored_at() {
            if stored_at.elapsed() <= self.ttl {
                break;
            }
            inner.pop_oldest();
            removed += 1;
        }
        if removed > 0 {
            debug!(removed, "evicted expired results");
        }
        removed
    }
}
