//! In-process channel backend using Tokio MPSC channels
//!
//! ## Purpose
//! Stands in for the broker in tests and single-process runs. Mirrors the
//! broker semantics the correlation layer relies on:
//! - each consumer group receives every message of its topics
//! - within a group, one member receives a given key (hash partitioning), so
//!   per-key order is preserved
//! - messages published before any group subscribed are retained and handed
//!   to the first group (earliest offset reset)
//!
//! Availability can be toggled to simulate a broker outage. Channels built
//! with [`InMemoryChannel::recording`] also keep every published message for
//! inspection; plain channels keep nothing once it is delivered.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{ChannelError, ChannelMessage, ChannelResult, MessageChannel, Subscription};

#[derive(Default)]
struct TopicState {
    /// Everything published, only filled on recording channels
    history: Vec<ChannelMessage>,
    /// Published while no group was subscribed
    backlog: Vec<ChannelMessage>,
    /// group id -> member senders
    groups: HashMap<String, Vec<mpsc::UnboundedSender<ChannelMessage>>>,
}

impl TopicState {
    fn deliver(&mut self, message: ChannelMessage) {
        if self.groups.is_empty() {
            self.backlog.push(message);
            return;
        }
        for members in self.groups.values_mut() {
            members.retain(|tx| !tx.is_closed());
            if members.is_empty() {
                continue;
            }
            let idx = partition_for(message.key.as_deref(), members.len());
            // A member closing between retain and send only loses this copy
            let _ = members[idx].send(message.clone());
        }
        self.groups.retain(|_, members| !members.is_empty());
    }
}

fn partition_for(key: Option<&str>, partitions: usize) -> usize {
    match key {
        Some(k) => {
            let mut hasher = DefaultHasher::new();
            k.hash(&mut hasher);
            (hasher.finish() % partitions as u64) as usize
        }
        None => 0,
    }
}

/// In-process publish/subscribe channel
#[derive(Clone, Default)]
pub struct InMemoryChannel {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
    unavailable: Arc<AtomicBool>,
    record: bool,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel that also keeps a copy of every published message, readable
    /// through [`published`](Self::published). Memory grows with traffic.
    pub fn recording() -> Self {
        Self {
            record: true,
            ..Self::default()
        }
    }

    /// Simulate the broker going away (`false`) or coming back (`true`)
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Messages published to `topic` so far, in publish order (always empty
    /// unless the channel is recording)
    pub fn published(&self, topic: &str) -> Vec<ChannelMessage> {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .get(topic)
            .map(|state| state.history.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> ChannelResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ChannelError::Unavailable("in-memory broker marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageChannel for InMemoryChannel {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> ChannelResult<()> {
        self.check_available()?;
        let message = ChannelMessage::new(topic, Some(key), payload);
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let state = topics.entry(topic.to_string()).or_default();
        if self.record {
            state.history.push(message.clone());
        }
        state.deliver(message);
        Ok(())
    }

    async fn subscribe(&self, group: &str, topics: &[String]) -> ChannelResult<Box<dyn Subscription>> {
        self.check_available()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut all = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        for topic in topics {
            let state = all.entry(topic.clone()).or_default();
            state
                .groups
                .entry(group.to_string())
                .or_default()
                .push(tx.clone());
            for message in std::mem::take(&mut state.backlog) {
                let _ = tx.send(message);
            }
        }
        Ok(Box::new(InMemorySubscription { rx }))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

struct InMemorySubscription {
    rx: mpsc::UnboundedReceiver<ChannelMessage>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn poll(&mut self, timeout: Duration) -> ChannelResult<Option<ChannelMessage>> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => Err(ChannelError::Closed),
            Err(_) => Ok(None),
        }
    }
}
