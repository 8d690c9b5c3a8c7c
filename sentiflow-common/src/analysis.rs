//! Keyword heuristics applied to review text
//!
//! These are the rules the API uses when a result lands: urgency from
//! (sentiment, keywords) and a coarse aspect summary when the worker did not
//! provide one. The keyword sentiment classifier backs the rule-based worker.

use std::collections::BTreeMap;

/// Words that escalate a negative review to high urgency
pub const URGENCY_KEYWORDS: &[&str] = &["broken", "refund", "late", "missing", "defect"];

pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "late", "broken", "refund", "bad", "terrible", "defect", "poor", "damaged", "slow", "missing",
];

pub const POSITIVE_KEYWORDS: &[&str] = &[
    "good", "great", "excellent", "perfect", "amazing", "love", "works", "nice", "fast",
];

/// Aspect name and the substrings that signal it
const ASPECT_RULES: &[(&str, &[&str])] = &[
    ("price", &["price", "$"]),
    ("quality", &["quality", "defect", "broken"]),
    ("shipping", &["shipping", "delivery", "late"]),
];

/// Coarse urgency label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::High => "high",
        }
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Normalise a sentiment label the way it is written to the logs
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// High only for negative sentiment with an urgency keyword present
pub fn urgency(text: &str, sentiment: &str) -> Urgency {
    let lowered = text.to_lowercase();
    if normalize_label(sentiment) == "negative" && contains_any(&lowered, URGENCY_KEYWORDS) {
        Urgency::High
    } else {
        Urgency::Low
    }
}

/// Aspect names mentioned in the text, in rule order
pub fn keyword_aspects(text: &str) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    ASPECT_RULES
        .iter()
        .filter(|(_, needles)| contains_any(&lowered, needles))
        .map(|(name, _)| *name)
        .collect()
}

/// Pipe-delimited `name` tokens
pub fn format_aspect_names(names: &[&str]) -> String {
    names.join("|")
}

/// Pipe-delimited `name:label` tokens in key order
pub fn format_aspect_labels(aspects: &BTreeMap<String, String>) -> String {
    aspects
        .iter()
        .map(|(name, label)| format!("{}:{}", name, label))
        .collect::<Vec<_>>()
        .join("|")
}

/// Rule-based sentiment: any negative keyword wins, then positive, else neutral
pub fn keyword_sentiment(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    if contains_any(&lowered, NEGATIVE_KEYWORDS) {
        "negative"
    } else if contains_any(&lowered, POSITIVE_KEYWORDS) {
        "positive"
    } else {
        "neutral"
    }
}
