//! sentiflow-worker - keyword scoring worker
//!
//! Runs one model family (sentiment or aspect) against the broker until
//! SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use sentiflow_common::channel::{self, ChannelBackend};
use sentiflow_common::config::{LoggingConfig, TopicConfig};
use sentiflow_common::shutdown::shutdown_signal;
use sentiflow_common::WorkerKind;
use sentiflow_worker::{scorer_for, ScoringWorker, WorkerConfig};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sentiflow-worker")]
#[command(about = "Rule-based sentiment/aspect scoring worker")]
#[command(version)]
struct Args {
    /// Model family: sentiment or aspect
    #[arg(long, default_value = "sentiment", env = "WORKER_FAMILY")]
    family: String,

    #[arg(long, default_value = "kafka:9092", env = "KAFKA_BROKERS")]
    brokers: String,

    /// Work-item topic (defaults per family)
    #[arg(long, env = "WORKER_INPUT_TOPIC")]
    input_topic: Option<String>,

    /// Result topic (defaults per family)
    #[arg(long, env = "WORKER_OUTPUT_TOPIC")]
    output_topic: Option<String>,

    /// Consumer group (defaults to `sentiflow-worker-<family>`)
    #[arg(long, env = "WORKER_GROUP_ID")]
    group_id: Option<String>,

    #[arg(long, default_value = "1000", env = "POLL_TIMEOUT_MS")]
    poll_timeout_ms: u64,

    /// Log level or filter directive, used when RUST_LOG is unset
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,
}

/// Log targets a bare `--log-level` applies to
const LOG_TARGETS: &[&str] = &["sentiflow_worker", "sentiflow_common"];

fn default_topics(kind: WorkerKind) -> (String, String) {
    let topics = TopicConfig::default();
    match kind {
        WorkerKind::Sentiment => (topics.sentiment_in, topics.sentiment_out),
        WorkerKind::Aspect => (
            topics.aspect_in.unwrap_or_else(|| "ml.absa.in".to_string()),
            topics.aspect_out.unwrap_or_else(|| "ml.absa.out".to_string()),
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let logging = LoggingConfig {
        level: args.log_level.clone(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| logging.directive(LOG_TARGETS).into()),
        )
        .init();

    info!(
        "Starting sentiflow-worker v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let kind: WorkerKind = args.family.parse().context("Invalid --family")?;
    let (default_in, default_out) = default_topics(kind);

    let config = WorkerConfig {
        group_id: args
            .group_id
            .unwrap_or_else(|| format!("sentiflow-worker-{}", kind)),
        input_topic: args.input_topic.unwrap_or(default_in),
        output_topic: args.output_topic.unwrap_or(default_out),
        poll_timeout: Duration::from_millis(args.poll_timeout_ms.max(1)),
    };
    info!("Family: {}, brokers: {}", kind, args.brokers);

    let channel = channel::connect(ChannelBackend::Kafka, &args.brokers)
        .await
        .with_context(|| format!("Failed to connect to broker at {}", args.brokers))?;

    let worker = ScoringWorker::new(channel, scorer_for(kind), config).spawn();

    shutdown_signal("sentiflow-worker").await;
    worker.shutdown().await;

    info!("Worker shutdown complete");
    Ok(())
}
