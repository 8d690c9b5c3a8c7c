//! Kafka backend using rdkafka
//!
//! ## Design Decisions
//! - **Producer**: `FutureProducer::send_result`, which returns as soon as
//!   librdkafka has queued the record locally; delivery reports are awaited
//!   on a detached task and only logged
//! - **Consumer**: `StreamConsumer`, auto-commit, earliest offset reset
//! - **Keys**: the correlation id, so one correlation stays on one partition
//! - **Connectivity**: `connect` fetches cluster metadata once so an
//!   unreachable broker fails fast instead of on the first request

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::Message;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChannelError, ChannelMessage, ChannelResult, MessageChannel, Subscription};

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka channel shared by the dispatcher and every subscription
#[derive(Clone)]
pub struct KafkaChannel {
    brokers: String,
    producer: FutureProducer,
}

impl KafkaChannel {
    /// Create the producer and verify the cluster answers a metadata request
    ///
    /// ## Errors
    /// - [`ChannelError::Unavailable`]: producer creation or metadata fetch failed
    pub async fn connect(brokers: &str) -> ChannelResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| ChannelError::Unavailable(format!("Failed to create Kafka producer: {}", e)))?;

        let probe = producer.clone();
        tokio::task::spawn_blocking(move || {
            probe
                .client()
                .fetch_metadata(None, METADATA_TIMEOUT)
                .map(|_| ())
        })
        .await
        .map_err(|e| ChannelError::Unavailable(format!("Metadata probe aborted: {}", e)))?
        .map_err(|e| ChannelError::Unavailable(format!("Kafka brokers {} unreachable: {}", brokers, e)))?;

        Ok(Self {
            brokers: brokers.to_string(),
            producer,
        })
    }

    fn map_produce_error(err: KafkaError) -> ChannelError {
        match err {
            KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => {
                ChannelError::QueueFull("librdkafka producer queue is full".to_string())
            }
            other => ChannelError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl MessageChannel for KafkaChannel {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> ChannelResult<()> {
        let record = FutureRecord::to(topic).key(key).payload(&payload);
        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(err, _)| Self::map_produce_error(err))?;

        let topic = topic.to_string();
        let key = key.to_string();
        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok(_)) => debug!(topic = %topic, key = %key, "delivered"),
                Ok(Err((err, _))) => warn!(topic = %topic, key = %key, "delivery failed: {}", err),
                Err(_) => warn!(topic = %topic, key = %key, "delivery report dropped"),
            }
        });
        Ok(())
    }

    async fn subscribe(&self, group: &str, topics: &[String]) -> ChannelResult<Box<dyn Subscription>> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| ChannelError::Subscribe(format!("Failed to create Kafka consumer: {}", e)))?;

        let refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&refs)
            .map_err(|e| ChannelError::Subscribe(format!("Failed to subscribe: {}", e)))?;

        Ok(Box::new(KafkaSubscription { consumer }))
    }

    fn backend(&self) -> &'static str {
        "kafka"
    }
}

struct KafkaSubscription {
    consumer: StreamConsumer,
}

#[async_trait]
impl Subscription for KafkaSubscription {
    async fn poll(&mut self, timeout: Duration) -> ChannelResult<Option<ChannelMessage>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(Ok(msg)) => Ok(Some(ChannelMessage {
                topic: msg.topic().to_string(),
                key: msg.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            })),
            // Unknown topics surface here until they are created; not fatal
            Ok(Err(err)) => Err(ChannelError::Consumer(err.to_string())),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for KafkaSubscription {
    fn drop(&mut self) {
        self.consumer.unsubscribe();
    }
}
