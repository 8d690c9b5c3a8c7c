//! Configuration loading
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (handled by clap `env` in each binary)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module owns layers 3 and 4. A missing TOML file is not an error:
//! the caller gets the compiled defaults and a warning.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::channel::ChannelBackend;
use crate::{Error, Result};

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub backend: ChannelBackend,
    pub brokers: String,
    pub group_id: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: ChannelBackend::Kafka,
            brokers: "kafka:9092".to_string(),
            group_id: "integration-api-v1".to_string(),
        }
    }
}

/// Input and output topics per model family
///
/// The aspect family is optional; `None` (or an empty string from the
/// environment) runs the pipeline sentiment-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub sentiment_in: String,
    pub sentiment_out: String,
    pub aspect_in: Option<String>,
    pub aspect_out: Option<String>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            sentiment_in: "ml.sentiment.in".to_string(),
            sentiment_out: "ml.sentiment.out".to_string(),
            aspect_in: Some("ml.absa.in".to_string()),
            aspect_out: Some("ml.absa.out".to_string()),
        }
    }
}

impl TopicConfig {
    /// Result topics the resolver subscribes to, sentiment first
    pub fn result_topics(&self) -> Vec<String> {
        let mut topics = vec![self.sentiment_out.clone()];
        if let Some(aspect_out) = &self.aspect_out {
            topics.push(aspect_out.clone());
        }
        topics
    }

    pub fn validate(&self) -> Result<()> {
        if self.sentiment_in.trim().is_empty() || self.sentiment_out.trim().is_empty() {
            return Err(Error::Config(
                "sentiment input and output topics are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bounds on the in-memory correlation caches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a resolved result stays readable
    pub result_ttl_secs: u64,
    /// Maximum resolved results kept; oldest resolved evicted first
    pub result_capacity: usize,
    /// Seconds an unanswered correlation keeps its pending text
    pub pending_ttl_secs: u64,
    /// Maximum pending texts kept; oldest evicted first
    pub pending_capacity: usize,
    /// Seconds between eviction sweeps run by the resolver
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            result_ttl_secs: 3600,
            result_capacity: 10_000,
            pending_ttl_secs: 86_400,
            pending_capacity: 100_000,
            sweep_interval_secs: 60,
        }
    }
}

/// Logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set. A bare level (`debug`) is
    /// scoped to the service's own targets; anything containing `=` or `,`
    /// is passed to `EnvFilter` verbatim.
    pub level: String,
}

impl LoggingConfig {
    /// `EnvFilter` directive for a service whose log targets are `targets`
    pub fn directive(&self, targets: &[&str]) -> String {
        let level = self.level.trim();
        if level.contains('=') || level.contains(',') {
            return level.to_string();
        }
        let level = if level.is_empty() { "info" } else { level };
        targets
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub reports_dir: Option<PathBuf>,
    pub pending_db: Option<PathBuf>,
    pub broker: BrokerConfig,
    pub topics: TopicConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a TOML file; errors if it cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load `path` if given and present, otherwise compiled defaults
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => {
                let config = Self::load(p)?;
                info!("Loaded config file {}", p.display());
                Ok(config)
            }
            Some(p) => {
                warn!("Config file {} not found, using defaults", p.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}

/// Treat blank values (e.g. `TOPIC_ABSA_OUT=""`) as unset
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// OS-dependent data directory for logs and the pending database
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sentiflow"))
        .unwrap_or_else(|| PathBuf::from("./sentiflow_data"))
}

/// Default directory for `results_log.csv` and `alerts_log.csv`
pub fn default_reports_dir() -> PathBuf {
    default_data_dir().join("reports")
}

/// Default SQLite file backing the pending table
pub fn default_pending_db() -> PathBuf {
    default_data_dir().join("pending.db")
}
