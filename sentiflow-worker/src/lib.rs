//! sentiflow-worker library - rule-based scoring workers
//!
//! A worker consumes work items from one input topic, scores the text and
//! publishes a tagged result envelope to its output topic, keyed by the
//! correlation id so results for one request stay ordered.

pub mod scorer;
pub mod worker;

pub use scorer::{scorer_for, KeywordAspects, KeywordSentiment, Scorer};
pub use worker::{ScoringWorker, WorkerConfig, WorkerHandle, NO_CORRELATION_ID};
