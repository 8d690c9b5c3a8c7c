//! # sentiflow common library
//!
//! Shared code for the sentiflow API and scoring workers:
//! - Wire envelopes (work items and results)
//! - Message channel abstraction with Kafka and in-process backends
//! - Text heuristics for urgency, aspects and keyword sentiment
//! - Configuration loading
//! - Time helpers and shutdown signal handling

pub mod analysis;
pub mod channel;
pub mod config;
pub mod envelope;
pub mod error;
pub mod shutdown;
pub mod time;

pub use envelope::{CorrelationId, ResultEnvelope, ScoringResult, WorkItem, WorkerKind};
pub use error::{Error, Result};
