//! TOML configuration loading tests

use sentiflow_common::channel::ChannelBackend;
use sentiflow_common::config::{non_empty, LoggingConfig, TomlConfig};
use std::io::Write;

fn write_toml(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_partial_file_keeps_defaults() {
    let file = write_toml(
        r#"
port = 9001

[broker]
backend = "memory"

[topics]
sentiment_in = "reviews.in"

[cache]
result_capacity = 50
"#,
    );

    let config = TomlConfig::load(file.path()).unwrap();

    assert_eq!(config.port, Some(9001));
    assert_eq!(config.broker.backend, ChannelBackend::Memory);
    assert_eq!(config.broker.brokers, "kafka:9092");
    assert_eq!(config.broker.group_id, "integration-api-v1");
    assert_eq!(config.topics.sentiment_in, "reviews.in");
    assert_eq!(config.topics.sentiment_out, "ml.sentiment.out");
    assert_eq!(config.topics.aspect_out.as_deref(), Some("ml.absa.out"));
    assert_eq!(config.cache.result_capacity, 50);
    assert_eq!(config.cache.result_ttl_secs, 3600);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = TomlConfig::load_or_default(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_unparseable_file_is_an_error() {
    let file = write_toml("port = \"not a number\"");
    assert!(TomlConfig::load_or_default(Some(file.path())).is_err());
}

#[test]
fn test_blank_values_count_as_unset() {
    assert_eq!(non_empty(Some("  ".to_string())), None);
    assert_eq!(non_empty(Some("ml.absa.out".to_string())).as_deref(), Some("ml.absa.out"));
    assert_eq!(non_empty(None), None);
}

#[test]
fn test_logging_level_read_from_file() {
    let file = write_toml("[logging]\nlevel = \"debug\"\n");

    let config = TomlConfig::load(file.path()).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        config.logging.directive(&["sentiflow_api", "tower_http"]),
        "sentiflow_api=debug,tower_http=debug"
    );
}

#[test]
fn test_logging_full_directive_used_verbatim() {
    let logging = LoggingConfig {
        level: "warn,sentiflow_api::correlation=trace".to_string(),
    };
    assert_eq!(
        logging.directive(&["sentiflow_api"]),
        "warn,sentiflow_api::correlation=trace"
    );

    let blank = LoggingConfig {
        level: " ".to_string(),
    };
    assert_eq!(blank.directive(&["sentiflow_worker"]), "sentiflow_worker=info");
}
