//! HTTP API integration tests (router driven with `oneshot`)

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::Harness;
use http_body_util::BodyExt;
use sentiflow_common::config::TopicConfig;
use sentiflow_common::{ResultEnvelope, WorkItem};
use serde_json::{json, Value};
use std::io::Write;
use tower::ServiceExt;

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn work_item(message: &sentiflow_common::channel::ChannelMessage) -> WorkItem {
    serde_json::from_slice(&message.payload).unwrap()
}

#[tokio::test]
async fn test_health_reports_resolver_state() {
    let harness = Harness::new().await;

    let (status, body) = send(harness.router(), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "sentiflow-api");
    assert_eq!(body["resolver"], "polling");
}

#[tokio::test]
async fn test_predict_publishes_keyed_work_item_and_records_pending() {
    let harness = Harness::new().await;

    // When: a text is submitted
    let (status, body) = send(
        harness.router(),
        post_json("/predict", json!({"text": "arrived late"})),
    )
    .await;

    // Then: the id is returned and the work item is on the sentiment topic
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let cid = body["correlation_id"].as_str().unwrap().to_string();

    let published = harness.memory.published("ml.sentiment.in");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].key.as_deref(), Some(cid.as_str()));

    let item = work_item(&published[0]);
    assert_eq!(item.correlation_id.as_str(), cid);
    assert_eq!(item.payload, json!({"text": "arrived late"}));
    assert_eq!(item.meta.source, "integration-api");

    assert!(harness.pending.contains(&cid.as_str().into()).await.unwrap());
}

#[tokio::test]
async fn test_invalid_body_returns_json_error() {
    let harness = Harness::new().await;

    // When: the body misspells the text field
    let (status, body) = send(
        harness.router(),
        post_json("/predict", json!({"txt": "typo field"})),
    )
    .await;

    // Then: a JSON error names the missing field and nothing is queued
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_BODY");
    assert!(body["detail"].as_str().unwrap().contains("text"));
    assert!(harness.pending.is_empty().await.unwrap());

    let (status, body) = send(
        harness.router(),
        post_json("/batch-items", json!({"items": "not a list"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_BODY");
}

#[tokio::test]
async fn test_result_not_found_until_resolved() {
    let harness = Harness::new().await;

    let (status, body) = send(harness.router(), get("/result/unknown-id")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Result not found yet");

    // Given: a result lands for that id
    let raw = json!({
        "correlation_id": "unknown-id",
        "result": {"prediction": "positive", "proba": [0.1, 0.9]},
        "ts": 1700000000.25,
        "worker": "baseline"
    });
    let envelope: ResultEnvelope = serde_json::from_value(raw.clone()).unwrap();
    harness.results.insert(envelope).await;

    // Then: the envelope comes back exactly as published
    let (status, body) = send(harness.router(), get("/result/unknown-id")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, raw);
}

#[tokio::test]
async fn test_delete_acknowledges_result() {
    let harness = Harness::new().await;
    let envelope: ResultEnvelope =
        serde_json::from_value(json!({"correlation_id": "ack-me", "result": {}})).unwrap();
    harness.results.insert(envelope).await;

    let (status, _) = send(harness.router(), delete("/result/ack-me")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(harness.router(), get("/result/ack-me")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(harness.router(), delete("/result/ack-me")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_items_queue_in_order() {
    let harness = Harness::new().await;

    let (status, body) = send(
        harness.router(),
        post_json(
            "/batch-items",
            json!({"items": [{"text": "first"}, {"text": "second"}, {"text": "third"}]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queued"], 3);
    let ids: Vec<String> = body["correlation_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 3);
    assert_ne!(ids[0], ids[1]);

    let texts: Vec<String> = harness
        .memory
        .published("ml.sentiment.in")
        .iter()
        .map(|m| work_item(m).text())
        .collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
    assert_eq!(harness.pending.len().await.unwrap(), 3);
}

#[tokio::test]
async fn test_batch_csv_reads_server_file() {
    let harness = Harness::new().await;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"id,review\n1,great value\n2,arrived broken\n3,meh\n")
        .unwrap();

    let (status, body) = send(
        harness.router(),
        post_json(
            "/batch",
            json!({
                "csv_path": file.path().to_str().unwrap(),
                "text_col": "review",
                "max_rows": 2
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queued"], 2);
    assert_eq!(harness.memory.published("ml.sentiment.in").len(), 2);
}

#[tokio::test]
async fn test_batch_csv_missing_column_lists_columns() {
    let harness = Harness::new().await;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"id,review\n1,fine\n").unwrap();

    let (status, body) = send(
        harness.router(),
        post_json(
            "/batch",
            json!({"csv_path": file.path().to_str().unwrap(), "text_col": "text"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_COLUMN");
    assert_eq!(body["cols"], json!(["id", "review"]));
    assert!(harness.memory.published("ml.sentiment.in").is_empty());
}

#[tokio::test]
async fn test_predict_aspects_routes_to_aspect_topic() {
    let harness = Harness::new().await;

    let (status, body) = send(
        harness.router(),
        post_json("/predict/aspects", json!({"text": "price is fair"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let published = harness.memory.published("ml.absa.in");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].key.as_deref(), body["correlation_id"].as_str());
}

#[tokio::test]
async fn test_predict_aspects_unavailable_when_disabled() {
    let topics = TopicConfig {
        aspect_in: None,
        aspect_out: None,
        ..TopicConfig::default()
    };
    let harness = Harness::with_topics(topics).await;

    let (status, body) = send(
        harness.router(),
        post_json("/predict/aspects", json!({"text": "anything"})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "UNAVAILABLE");
    assert!(harness.pending.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_broker_down_returns_500_and_rolls_back_pending() {
    let harness = Harness::new().await;
    harness.memory.set_available(false);

    let (status, body) = send(
        harness.router(),
        post_json("/predict", json!({"text": "will not be sent"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "CHANNEL_UNAVAILABLE");
    assert!(harness.pending.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_stats_reports_table_sizes() {
    let harness = Harness::new().await;
    send(
        harness.router(),
        post_json("/predict", json!({"text": "one"})),
    )
    .await;

    let (status, body) = send(harness.router(), get("/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resolver_state"], "polling");
    assert_eq!(body["pending"], 1);
    assert_eq!(body["results"], 0);
    assert_eq!(body["counters"]["messages_received"], 0);
}
