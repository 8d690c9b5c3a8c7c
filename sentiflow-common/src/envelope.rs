//! Wire envelopes exchanged over the message channel
//!
//! Work items flow API → worker on the `*.in` topics, result envelopes flow
//! worker → API on the `*.out` topics. Both are JSON objects keyed (at the
//! channel level) by the correlation identifier.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result};

/// Source tag stamped on every work item published by the API
pub const API_SOURCE: &str = "integration-api";

/// Identity key for one request across its whole lifetime
///
/// Generated as a UUIDv4 by the API. Results coming back from workers may
/// carry any string, so parsing never validates the UUID shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Fresh identifier backed by 122 random bits
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Model family that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    /// Baseline sentiment classifier: `{"prediction", "proba"}`
    Sentiment,
    /// Aspect-based classifier: `{aspect: label, ...}`
    Aspect,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Sentiment => "sentiment",
            WorkerKind::Aspect => "aspect",
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentiment" => Ok(WorkerKind::Sentiment),
            "aspect" | "absa" => Ok(WorkerKind::Aspect),
            other => Err(Error::InvalidInput(format!("Unknown worker kind: {}", other))),
        }
    }
}

/// Provenance attached to a work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkMeta {
    pub source: String,
}

/// Unit of work published to an input topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub correlation_id: CorrelationId,
    pub payload: Value,
    pub meta: WorkMeta,
}

impl WorkItem {
    pub fn new(correlation_id: CorrelationId, payload: Value) -> Self {
        Self {
            correlation_id,
            payload,
            meta: WorkMeta {
                source: API_SOURCE.to_string(),
            },
        }
    }

    /// Text to score: `payload.text` when the payload is an object, else the
    /// payload rendered as a string
    pub fn text(&self) -> String {
        match &self.payload {
            Value::Object(map) => match map.get("text") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            },
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Result event published by a scoring worker
///
/// Fields the API does not know about are kept in `extra` so a stored
/// envelope serializes back exactly as it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub correlation_id: CorrelationId,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<WorkerKind>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultEnvelope {
    pub fn new(correlation_id: CorrelationId, kind: WorkerKind, result: &ScoringResult, ts: f64) -> Self {
        Self {
            correlation_id,
            result: result.to_value(),
            ts: Some(ts),
            kind: Some(kind),
            extra: Map::new(),
        }
    }

    /// Interpret `result` according to the envelope's own `kind`, falling
    /// back to `default_kind` for untagged envelopes
    pub fn scoring(&self, default_kind: WorkerKind) -> Result<ScoringResult> {
        ScoringResult::from_value(self.kind.unwrap_or(default_kind), &self.result)
    }
}

/// Typed view of a worker result
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringResult {
    Sentiment {
        prediction: Option<String>,
        proba: Option<Vec<f64>>,
    },
    Aspects(BTreeMap<String, String>),
}

impl ScoringResult {
    pub fn from_value(kind: WorkerKind, value: &Value) -> Result<Self> {
        match kind {
            WorkerKind::Sentiment => match value {
                Value::Object(map) => {
                    let prediction = map.get("prediction").and_then(label_of);
                    let proba = map.get("proba").and_then(Value::as_array).map(|arr| {
                        arr.iter().filter_map(Value::as_f64).collect::<Vec<_>>()
                    });
                    Ok(ScoringResult::Sentiment { prediction, proba })
                }
                Value::Null => Ok(ScoringResult::Sentiment {
                    prediction: None,
                    proba: None,
                }),
                scalar => Ok(ScoringResult::Sentiment {
                    prediction: label_of(scalar),
                    proba: None,
                }),
            },
            WorkerKind::Aspect => match value {
                Value::Object(map) => Ok(ScoringResult::Aspects(
                    map.iter()
                        .map(|(aspect, label)| {
                            (aspect.clone(), label_of(label).unwrap_or_default())
                        })
                        .collect(),
                )),
                other => Err(Error::Decode(format!(
                    "aspect result must be an object, got {}",
                    other
                ))),
            },
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ScoringResult::Sentiment { prediction, proba } => serde_json::json!({
                "prediction": prediction,
                "proba": proba,
            }),
            ScoringResult::Aspects(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        }
    }
}

fn label_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
