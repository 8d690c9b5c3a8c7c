//! Worker integration tests against the in-process channel

use sentiflow_common::channel::{ChannelMessage, InMemoryChannel, MessageChannel, SharedChannel};
use sentiflow_common::{ResultEnvelope, ScoringResult, WorkItem, WorkerKind};
use sentiflow_worker::{scorer_for, ScoringWorker, WorkerConfig, NO_CORRELATION_ID};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn worker_config(kind: WorkerKind) -> WorkerConfig {
    let (input_topic, output_topic) = match kind {
        WorkerKind::Sentiment => ("ml.sentiment.in", "ml.sentiment.out"),
        WorkerKind::Aspect => ("ml.absa.in", "ml.absa.out"),
    };
    WorkerConfig {
        group_id: format!("test-{}", kind),
        input_topic: input_topic.to_string(),
        output_topic: output_topic.to_string(),
        poll_timeout: Duration::from_millis(20),
    }
}

fn work_message(topic: &str, cid: &str, text: &str) -> ChannelMessage {
    let item = WorkItem::new(cid.into(), json!({ "text": text }));
    ChannelMessage::new(topic, Some(cid), serde_json::to_vec(&item).unwrap())
}

fn decode(message: &ChannelMessage) -> ResultEnvelope {
    serde_json::from_slice(&message.payload).unwrap()
}

#[tokio::test]
async fn test_sentiment_result_is_tagged_and_keyed() {
    let memory = InMemoryChannel::recording();
    let channel: SharedChannel = Arc::new(memory.clone());
    let worker = ScoringWorker::new(
        channel,
        scorer_for(WorkerKind::Sentiment),
        worker_config(WorkerKind::Sentiment),
    );

    let cid = worker
        .process(&work_message("ml.sentiment.in", "c-1", "the item was broken on arrival"))
        .await
        .unwrap();
    assert_eq!(cid.as_str(), "c-1");

    let published = memory.published("ml.sentiment.out");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].key.as_deref(), Some("c-1"));

    let envelope = decode(&published[0]);
    assert_eq!(envelope.kind, Some(WorkerKind::Sentiment));
    assert!(envelope.ts.is_some());
    assert_eq!(envelope.result, json!({"prediction": "negative", "proba": null}));
}

#[tokio::test]
async fn test_aspect_worker_publishes_mapping() {
    let memory = InMemoryChannel::recording();
    let worker = ScoringWorker::new(
        Arc::new(memory.clone()),
        scorer_for(WorkerKind::Aspect),
        worker_config(WorkerKind::Aspect),
    );

    worker
        .process(&work_message("ml.absa.in", "c-2", "Great quality, fast shipping"))
        .await
        .unwrap();

    let envelope = decode(&memory.published("ml.absa.out")[0]);
    match envelope.scoring(WorkerKind::Sentiment).unwrap() {
        ScoringResult::Aspects(map) => {
            assert_eq!(map["quality"], "positive");
            assert_eq!(map["shipping"], "positive");
        }
        other => panic!("expected aspect mapping, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_correlation_id_published_as_placeholder() {
    let memory = InMemoryChannel::recording();
    let worker = ScoringWorker::new(
        Arc::new(memory.clone()),
        scorer_for(WorkerKind::Sentiment),
        worker_config(WorkerKind::Sentiment),
    );

    let message = ChannelMessage::new("ml.sentiment.in", None, br#"{"payload": {"text": "ok"}}"#.to_vec());
    worker.process(&message).await.unwrap();

    let published = memory.published("ml.sentiment.out");
    assert_eq!(decode(&published[0]).correlation_id.as_str(), NO_CORRELATION_ID);
}

#[tokio::test]
async fn test_broker_down_is_an_error_not_a_panic() {
    let memory = InMemoryChannel::recording();
    let worker = ScoringWorker::new(
        Arc::new(memory.clone()),
        scorer_for(WorkerKind::Sentiment),
        worker_config(WorkerKind::Sentiment),
    );
    memory.set_available(false);

    let result = worker
        .process(&work_message("ml.sentiment.in", "c-3", "fine"))
        .await;
    assert!(matches!(result, Err(sentiflow_common::Error::ChannelUnavailable(_))));
}

#[tokio::test]
async fn test_spawned_worker_skips_bad_items_and_keeps_going() {
    let memory = InMemoryChannel::recording();
    let handle = ScoringWorker::new(
        Arc::new(memory.clone()),
        scorer_for(WorkerKind::Sentiment),
        worker_config(WorkerKind::Sentiment),
    )
    .spawn();

    memory
        .publish("ml.sentiment.in", "junk", b"not json".to_vec())
        .await
        .unwrap();
    let good = work_message("ml.sentiment.in", "c-4", "love it");
    memory
        .publish("ml.sentiment.in", "c-4", good.payload)
        .await
        .unwrap();

    let mut published = Vec::new();
    for _ in 0..100 {
        published = memory.published("ml.sentiment.out");
        if !published.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.shutdown().await;

    assert_eq!(published.len(), 1);
    let envelope = decode(&published[0]);
    assert_eq!(envelope.correlation_id.as_str(), "c-4");
    assert_eq!(envelope.result["prediction"], "positive");
}
