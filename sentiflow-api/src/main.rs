//! sentiflow-api - review analysis HTTP service
//!
//! Accepts review texts, publishes them to the scoring workers over the
//! broker and correlates the asynchronous results back to the submitting
//! client. Results are logged to CSV as they land; negative/high reviews
//! raise an alert row.

use anyhow::{Context, Result};
use clap::Parser;
use sentiflow_api::config::{ApiConfig, Args};
use sentiflow_api::correlation::{
    CorrelationService, Dispatcher, PendingTable, Resolver, ResolverStats, ResultsTable,
};
use sentiflow_api::report_log::ReportLog;
use sentiflow_api::{build_router, AppState};
use sentiflow_common::channel::{self, ChannelBackend, SharedChannel};
use sentiflow_common::config::TomlConfig;
use sentiflow_common::shutdown::shutdown_signal;
use sentiflow_common::WorkerKind;
use sentiflow_worker::{scorer_for, ScoringWorker, WorkerConfig, WorkerHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Attempts to reach the broker before giving up at startup
const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_BACKOFF: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // Config comes first so the file's logging level can seed the filter
    let args = Args::parse();
    let file = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load config file")?;
    let config = ApiConfig::resolve(&args, file).context("Invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_directive().into()),
        )
        .init();

    // Build identification first, before any broker or database delay
    info!(
        "Starting sentiflow-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &args.config {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        Some(path) => warn!("Config file {} not found, using defaults", path.display()),
        None => info!("No config file, using flags, environment and defaults"),
    }

    info!("Broker: {:?} at {}", config.broker.backend, config.broker.brokers);
    info!("Result topics: {}", config.topics.result_topics().join(", "));
    if config.topics.aspect_out.is_none() {
        info!("Aspect family disabled, running sentiment-only");
    }

    let channel = connect_with_retry(&config).await?;

    let pending = PendingTable::open(
        &config.pending_db,
        config.pending_ttl(),
        config.cache.pending_capacity,
    )
    .await
    .context("Failed to open pending database")?;
    info!("Pending texts carried over from last run: {}", pending.len().await.unwrap_or(0));

    let report = Arc::new(ReportLog::new(&config.reports_dir).context("Failed to prepare reports directory")?);
    info!("Result log: {}", report.results_path().display());
    info!("Alert log: {}", report.alerts_path().display());

    let results = Arc::new(ResultsTable::new(config.result_ttl(), config.cache.result_capacity));
    let stats = Arc::new(ResolverStats::default());

    let resolver = Resolver::new(
        Arc::clone(&results),
        pending.clone(),
        report,
        config.topics.clone(),
        Arc::clone(&stats),
    )
    .spawn(Arc::clone(&channel), config.resolver_config());

    let workers = if config.broker.backend == ChannelBackend::Memory {
        spawn_embedded_workers(&channel, &config)
    } else {
        Vec::new()
    };

    let correlation = Arc::new(CorrelationService::new(
        Dispatcher::new(Arc::clone(&channel)),
        pending,
        results,
    ));
    let state = AppState::new(correlation, config.topics.clone(), resolver.state(), stats);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("sentiflow-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal("sentiflow-api").await;
        })
        .await
        .context("Server error")?;

    for worker in workers {
        worker.shutdown().await;
    }
    resolver.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

async fn connect_with_retry(config: &ApiConfig) -> Result<SharedChannel> {
    let mut attempt = 1;
    loop {
        match channel::connect(config.broker.backend, &config.broker.brokers).await {
            Ok(channel) => {
                info!("✓ Connected to {} broker", channel.backend());
                return Ok(channel);
            }
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                warn!(
                    "Broker connect attempt {}/{} failed: {} (retrying in {:?})",
                    attempt, CONNECT_ATTEMPTS, e, CONNECT_BACKOFF
                );
                attempt += 1;
                tokio::time::sleep(CONNECT_BACKOFF).await;
            }
            Err(e) => {
                error!("Giving up on broker at {}: {}", config.broker.brokers, e);
                return Err(e).context("Broker unavailable");
            }
        }
    }
}

/// Keyword workers sharing the in-process channel
fn spawn_embedded_workers(channel: &SharedChannel, config: &ApiConfig) -> Vec<WorkerHandle> {
    let mut families = vec![(
        WorkerKind::Sentiment,
        config.topics.sentiment_in.clone(),
        config.topics.sentiment_out.clone(),
    )];
    if let (Some(aspect_in), Some(aspect_out)) = (&config.topics.aspect_in, &config.topics.aspect_out) {
        families.push((WorkerKind::Aspect, aspect_in.clone(), aspect_out.clone()));
    }

    families
        .into_iter()
        .map(|(kind, input_topic, output_topic)| {
            info!("Embedded {} worker: {} → {}", kind, input_topic, output_topic);
            ScoringWorker::new(
                Arc::clone(channel),
                scorer_for(kind),
                WorkerConfig {
                    group_id: format!("sentiflow-worker-{}", kind),
                    input_topic,
                    output_topic,
                    poll_timeout: config.poll_timeout,
                },
            )
            .spawn()
        })
        .collect()
}
