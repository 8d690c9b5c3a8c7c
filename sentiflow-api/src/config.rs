//! Command-line and environment configuration for sentiflow-api
//!
//! Every setting can come from a flag, its environment variable, the TOML
//! file named by `--config`, or the compiled default, in that order.

use clap::Parser;
use sentiflow_common::channel::ChannelBackend;
use sentiflow_common::config::{
    default_pending_db, default_reports_dir, non_empty, BrokerConfig, CacheConfig, LoggingConfig,
    TomlConfig, TopicConfig,
};
use sentiflow_common::time::secs_to_duration;
use sentiflow_common::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::correlation::ResolverConfig;

const DEFAULT_PORT: u16 = 8000;

/// Log targets a bare `logging.level` applies to
pub const LOG_TARGETS: &[&str] = &[
    "sentiflow_api",
    "sentiflow_common",
    "sentiflow_worker",
    "tower_http",
];

/// Command-line arguments for sentiflow-api
#[derive(Parser, Debug)]
#[command(name = "sentiflow-api")]
#[command(about = "Review analysis API with broker-backed result correlation")]
#[command(version)]
pub struct Args {
    /// TOML config file
    #[arg(long, env = "SENTIFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Broker backend: kafka or memory
    #[arg(long, env = "CHANNEL_BACKEND")]
    pub channel_backend: Option<String>,

    /// Kafka bootstrap servers
    #[arg(long, env = "KAFKA_BROKERS")]
    pub brokers: Option<String>,

    /// Consumer group for the result resolver
    #[arg(long, env = "GROUP_ID")]
    pub group_id: Option<String>,

    #[arg(long, env = "TOPIC_SENT_IN")]
    pub topic_sent_in: Option<String>,

    #[arg(long, env = "TOPIC_SENT_OUT")]
    pub topic_sent_out: Option<String>,

    /// Aspect work-item topic (empty disables)
    #[arg(long, env = "TOPIC_ABSA_IN")]
    pub topic_absa_in: Option<String>,

    /// Aspect result topic (empty disables)
    #[arg(long, env = "TOPIC_ABSA_OUT")]
    pub topic_absa_out: Option<String>,

    /// Directory for results_log.csv and alerts_log.csv
    #[arg(long, env = "REPORTS_DIR")]
    pub reports_dir: Option<PathBuf>,

    /// SQLite file holding pending texts
    #[arg(long, env = "PENDING_DB")]
    pub pending_db: Option<PathBuf>,

    #[arg(long, env = "RESULT_TTL_SECS")]
    pub result_ttl_secs: Option<u64>,

    #[arg(long, env = "RESULT_CAPACITY")]
    pub result_capacity: Option<usize>,

    #[arg(long, env = "PENDING_TTL_SECS")]
    pub pending_ttl_secs: Option<u64>,

    #[arg(long, env = "PENDING_CAPACITY")]
    pub pending_capacity: Option<usize>,

    /// Resolver poll timeout in milliseconds
    #[arg(long, default_value = "1000", env = "POLL_TIMEOUT_MS")]
    pub poll_timeout_ms: u64,

    /// Log level or filter directive, used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub broker: BrokerConfig,
    pub topics: TopicConfig,
    pub cache: CacheConfig,
    pub reports_dir: PathBuf,
    pub pending_db: PathBuf,
    pub poll_timeout: Duration,
    pub logging: LoggingConfig,
}

impl ApiConfig {
    /// Layer `args` (flags and env) over the TOML file's values
    pub fn resolve(args: &Args, file: TomlConfig) -> Result<Self> {
        let TomlConfig {
            port,
            reports_dir,
            pending_db,
            broker,
            topics,
            cache,
            logging,
        } = file;

        let backend = match &args.channel_backend {
            Some(name) => name.parse::<ChannelBackend>()?,
            None => broker.backend,
        };

        let topics = TopicConfig {
            sentiment_in: args.topic_sent_in.clone().unwrap_or(topics.sentiment_in),
            sentiment_out: args.topic_sent_out.clone().unwrap_or(topics.sentiment_out),
            aspect_in: non_empty(args.topic_absa_in.clone().or(topics.aspect_in)),
            aspect_out: non_empty(args.topic_absa_out.clone().or(topics.aspect_out)),
        };
        topics.validate()?;

        Ok(Self {
            host: args.host.clone(),
            port: args.port.or(port).unwrap_or(DEFAULT_PORT),
            broker: BrokerConfig {
                backend,
                brokers: args.brokers.clone().unwrap_or(broker.brokers),
                group_id: args.group_id.clone().unwrap_or(broker.group_id),
            },
            topics,
            cache: CacheConfig {
                result_ttl_secs: args.result_ttl_secs.unwrap_or(cache.result_ttl_secs),
                result_capacity: args.result_capacity.unwrap_or(cache.result_capacity),
                pending_ttl_secs: args.pending_ttl_secs.unwrap_or(cache.pending_ttl_secs),
                pending_capacity: args.pending_capacity.unwrap_or(cache.pending_capacity),
                sweep_interval_secs: cache.sweep_interval_secs,
            },
            reports_dir: args
                .reports_dir
                .clone()
                .or(reports_dir)
                .unwrap_or_else(default_reports_dir),
            pending_db: args
                .pending_db
                .clone()
                .or(pending_db)
                .unwrap_or_else(default_pending_db),
            poll_timeout: Duration::from_millis(args.poll_timeout_ms.max(1)),
            logging: LoggingConfig {
                level: non_empty(args.log_level.clone()).unwrap_or(logging.level),
            },
        })
    }

    /// `EnvFilter` fallback when `RUST_LOG` is unset
    pub fn log_directive(&self) -> String {
        self.logging.directive(LOG_TARGETS)
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            group_id: self.broker.group_id.clone(),
            poll_timeout: self.poll_timeout,
            sweep_interval: secs_to_duration(self.cache.sweep_interval_secs.max(1)),
        }
    }

    pub fn result_ttl(&self) -> Duration {
        secs_to_duration(self.cache.result_ttl_secs)
    }

    pub fn pending_ttl(&self) -> Duration {
        secs_to_duration(self.cache.pending_ttl_secs)
    }
}
