//! Text scorers

use sentiflow_common::analysis;
use sentiflow_common::{ScoringResult, WorkerKind};
use std::sync::Arc;

/// One model family's scoring function
pub trait Scorer: Send + Sync {
    /// Family tag stamped on published results
    fn kind(&self) -> WorkerKind;

    fn score(&self, text: &str) -> ScoringResult;
}

/// Keyword sentiment: any negative keyword wins, then positive, else neutral
///
/// There is no probability model behind it, so `proba` is always absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordSentiment;

impl Scorer for KeywordSentiment {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Sentiment
    }

    fn score(&self, text: &str) -> ScoringResult {
        ScoringResult::Sentiment {
            prediction: Some(analysis::keyword_sentiment(text).to_string()),
            proba: None,
        }
    }
}

/// Keyword aspects: each aspect mentioned gets the sentiment of the whole text
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordAspects;

impl Scorer for KeywordAspects {
    fn kind(&self) -> WorkerKind {
        WorkerKind::Aspect
    }

    fn score(&self, text: &str) -> ScoringResult {
        let label = analysis::keyword_sentiment(text);
        ScoringResult::Aspects(
            analysis::keyword_aspects(text)
                .into_iter()
                .map(|aspect| (aspect.to_string(), label.to_string()))
                .collect(),
        )
    }
}

pub fn scorer_for(kind: WorkerKind) -> Arc<dyn Scorer> {
    match kind {
        WorkerKind::Sentiment => Arc::new(KeywordSentiment),
        WorkerKind::Aspect => Arc::new(KeywordAspects),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_sentiment_labels() {
        let scorer = KeywordSentiment;
        assert_eq!(
            scorer.score("excellent product, fast shipping"),
            ScoringResult::Sentiment {
                prediction: Some("positive".to_string()),
                proba: None
            }
        );
        match scorer.score("great, but it arrived broken") {
            ScoringResult::Sentiment { prediction, .. } => {
                assert_eq!(prediction.as_deref(), Some("negative"))
            }
            other => panic!("unexpected {:?}", other),
        }
        match scorer.score("it is a box") {
            ScoringResult::Sentiment { prediction, .. } => {
                assert_eq!(prediction.as_deref(), Some("neutral"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_keyword_aspects_share_text_label() {
        match KeywordAspects.score("Delivery was late and the price too high") {
            ScoringResult::Aspects(map) => {
                assert_eq!(map.len(), 2);
                assert_eq!(map["price"], "negative");
                assert_eq!(map["shipping"], "negative");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_aspects_gives_empty_mapping() {
        assert_eq!(KeywordAspects.score("fine"), ScoringResult::Aspects(Default::default()));
    }

    #[test]
    fn test_scorer_for_kind() {
        assert_eq!(scorer_for(WorkerKind::Aspect).kind(), WorkerKind::Aspect);
        assert_eq!(scorer_for(WorkerKind::Sentiment).kind(), WorkerKind::Sentiment);
    }
}
