//! Message channel abstraction
//!
//! ## Purpose
//! The broker is an at-least-once, partitioned publish/subscribe system with
//! no request/response pairing. This module narrows it to the two operations
//! the pipeline needs: keyed publish and group subscription with bounded
//! polling.
//!
//! ## Backends
//! - [`kafka::KafkaChannel`]: rdkafka producer and stream consumer
//! - [`in_memory::InMemoryChannel`]: in-process topics for tests and local runs
//!
//! ## Invariants
//! - Messages published with the same key are delivered to a subscriber in
//!   publish order
//! - `publish` returns once the message is buffered locally, not once the
//!   broker has persisted it

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod in_memory;
#[cfg(feature = "kafka")]
pub mod kafka;

pub use in_memory::InMemoryChannel;
#[cfg(feature = "kafka")]
pub use kafka::KafkaChannel;

/// Errors that can occur during channel operations
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Broker could not be reached
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// Local producer queue rejected the message
    #[error("Publish not buffered: {0}")]
    QueueFull(String),

    /// Subscription could not be established
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    /// Transient consumer-side error (message-level, not fatal)
    #[error("Consumer error: {0}")]
    Consumer(String),

    /// Channel or subscription has been closed
    #[error("Channel closed")]
    Closed,

    /// Payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// One message as seen by a subscriber
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl ChannelMessage {
    pub fn new(topic: impl Into<String>, key: Option<&str>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            key: key.map(str::to_string),
            payload: payload.into(),
        }
    }
}

/// Publish side and subscription factory
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Publish `payload` to `topic`, partitioned by `key`
    ///
    /// ## Errors
    /// - [`ChannelError::Unavailable`]: broker unreachable
    /// - [`ChannelError::QueueFull`]: local buffer rejected the message
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> ChannelResult<()>;

    /// Open a consumer in `group` subscribed to every topic in `topics`
    ///
    /// Topics that do not exist yet are not an error.
    async fn subscribe(&self, group: &str, topics: &[String]) -> ChannelResult<Box<dyn Subscription>>;

    /// Backend name for logs and diagnostics
    fn backend(&self) -> &'static str;
}

/// A live consumer; dropping it releases the subscription
#[async_trait]
pub trait Subscription: Send {
    /// Wait up to `timeout` for the next message
    ///
    /// `Ok(None)` means the timeout elapsed with nothing to deliver.
    async fn poll(&mut self, timeout: Duration) -> ChannelResult<Option<ChannelMessage>>;
}

/// Shared handle used by dispatchers, resolvers and workers
pub type SharedChannel = Arc<dyn MessageChannel>;

/// Which broker implementation to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelBackend {
    #[default]
    Kafka,
    Memory,
}

impl std::str::FromStr for ChannelBackend {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kafka" => Ok(ChannelBackend::Kafka),
            "memory" | "in-memory" => Ok(ChannelBackend::Memory),
            other => Err(crate::Error::Config(format!("Unknown channel backend: {}", other))),
        }
    }
}

/// Open the configured backend
///
/// The in-memory backend is process-local: API and workers only see each
/// other when they share the returned handle.
pub async fn connect(backend: ChannelBackend, brokers: &str) -> ChannelResult<SharedChannel> {
    match backend {
        #[cfg(feature = "kafka")]
        ChannelBackend::Kafka => Ok(Arc::new(KafkaChannel::connect(brokers).await?)),
        #[cfg(not(feature = "kafka"))]
        ChannelBackend::Kafka => Err(ChannelError::Unavailable(format!(
            "built without the `kafka` feature; cannot reach {}",
            brokers
        ))),
        ChannelBackend::Memory => Ok(Arc::new(InMemoryChannel::new())),
    }
}
