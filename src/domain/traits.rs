// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The orchestrator and the cache only ever talk to these
// traits, never to the concrete runtime:
//
//   Scorer         → LoadedModel (ml::runtime), test doubles
//   ModelProvider  → ArtifactModelProvider (ml::cache), test doubles
//   HistorySink    → CsvHistoryLog (infra::history_log)

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::history::HistoryRecord;
use crate::domain::model_key::ModelKey;
use crate::error::{ServiceError, ServiceResult};

/// Probability above which `classify` answers 1.
pub const DECISION_THRESHOLD: f32 = 0.5;

// ─── Scorer ───────────────────────────────────────────────────────────────────
/// Anything that can say how likely a text belongs to a hub.
///
/// Implementations are shared read-only between concurrent requests.
pub trait Scorer: Send + Sync {
    /// Raw probability in [0, 1] as produced by the predictor.
    fn score(&self, text: &str, hub: &str) -> ServiceResult<f32>;

    /// 1 if `score > 0.5`, else 0.
    fn classify(&self, text: &str, hub: &str) -> ServiceResult<u8> {
        Ok(u8::from(self.score(text, hub)? > DECISION_THRESHOLD))
    }

    /// Pairwise scores, in input order.
    fn batch_score(&self, texts: &[String], hubs: &[String]) -> ServiceResult<Vec<f32>> {
        if texts.len() != hubs.len() {
            return Err(ServiceError::invalid(format!(
                "texts and hubs must have same length ({} != {})",
                texts.len(),
                hubs.len()
            )));
        }
        texts
            .iter()
            .zip(hubs)
            .map(|(text, hub)| self.score(text, hub))
            .collect()
    }
}

// ─── ModelProvider ────────────────────────────────────────────────────────────
/// Produces a ready model for a key. Called by the model cache at most
/// once per key at a time.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn load(&self, key: &ModelKey) -> ServiceResult<Arc<dyn Scorer>>;
}

// ─── HistorySink ──────────────────────────────────────────────────────────────
/// Destination for request history. Failures are reported to the
/// caller, which logs and drops them.
pub trait HistorySink: Send + Sync {
    fn record(&self, record: &HistoryRecord) -> anyhow::Result<()>;
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Scores by looking the hub name up in a fixed table.
    struct TableScorer;

    impl Scorer for TableScorer {
        fn score(&self, text: &str, hub: &str) -> ServiceResult<f32> {
            Ok(match hub {
                "high" => 0.9,
                "edge" => 0.5,
                _ => text.len() as f32 / 100.0,
            })
        }
    }

    #[test]
    fn test_classify_threshold_is_strict() {
        assert_eq!(TableScorer.classify("t", "high").unwrap(), 1);
        assert_eq!(TableScorer.classify("t", "edge").unwrap(), 0);
    }

    #[test]
    fn test_batch_score_matches_pairwise() {
        let texts = vec!["abc".to_string(), "abcdef".to_string()];
        let hubs = vec!["x".to_string(), "high".to_string()];
        let batch = TableScorer.batch_score(&texts, &hubs).unwrap();
        assert_eq!(
            batch,
            vec![
                TableScorer.score("abc", "x").unwrap(),
                TableScorer.score("abcdef", "high").unwrap(),
            ]
        );
    }

    #[test]
    fn test_batch_score_length_mismatch() {
        let err = TableScorer
            .batch_score(&["a".to_string()], &[])
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }
}
