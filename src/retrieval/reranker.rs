//! Cross-encoder re-ranking over an over-fetched candidate set
//!
//! The scorer loads lazily, at most once per process: the first call pays
//! the model load, and a failed load pins the scorer absent for the rest
//! of the process. Every degradation path (disabled, load failure, scoring
//! failure) returns the candidates in their original similarity order,
//! truncated to `top_k`; re-ranking never fails a request.

use crate::config::RerankerConfig;
use crate::domain::DocumentUnit;
use crate::store::ScoredUnit;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::{Arc, OnceLock};

/// Scoring seam: joint (query, passage) relevance, higher is better
pub trait CrossEncoderScorer: Send + Sync {
    /// One score per passage, aligned with the input order
    fn score(&self, query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>>;
}

/// FastEmbed-backed cross-encoder
struct FastEmbedScorer {
    model: TextRerank,
}

impl FastEmbedScorer {
    fn load(model_name: &str) -> anyhow::Result<Self> {
        let model = match model_name {
            "bge-reranker-base" | "BAAI/bge-reranker-base" => RerankerModel::BGERerankerBase,
            other => {
                tracing::warn!(model = other, "unrecognized re-ranker model, using bge-reranker-base");
                RerankerModel::BGERerankerBase
            }
        };
        tracing::info!(model = model_name, "loading cross-encoder re-ranker");
        let init_options = RerankInitOptions::new(model).with_show_download_progress(true);
        let model = TextRerank::try_new(init_options)?;
        Ok(Self { model })
    }
}

impl CrossEncoderScorer for FastEmbedScorer {
    fn score(&self, query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>> {
        let documents: Vec<&str> = passages.iter().map(|s| s.as_str()).collect();
        let results = self.model.rerank(query, documents, false, None)?;

        // rerank returns results sorted by score; realign to input order
        let mut scores = vec![f32::NEG_INFINITY; passages.len()];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = result.score;
            }
        }
        Ok(scores)
    }
}

pub struct Reranker {
    enabled: bool,
    model_name: String,
    scorer: OnceLock<Option<Arc<dyn CrossEncoderScorer>>>,
}

impl Reranker {
    pub fn new(config: &RerankerConfig) -> Self {
        Self {
            enabled: config.enabled,
            model_name: config.model.clone(),
            scorer: OnceLock::new(),
        }
    }

    /// Pass-through re-ranker: always original order, truncated
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            model_name: String::new(),
            scorer: OnceLock::new(),
        }
    }

    /// Inject a scorer directly (tests, alternative models)
    pub fn with_scorer(scorer: Arc<dyn CrossEncoderScorer>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Some(scorer));
        Self {
            enabled: true,
            model_name: "injected".to_string(),
            scorer: cell,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Lazy at-most-once load; `None` is sticky after a failed attempt
    fn scorer(&self) -> Option<&Arc<dyn CrossEncoderScorer>> {
        self.scorer
            .get_or_init(|| match FastEmbedScorer::load(&self.model_name) {
                Ok(scorer) => Some(Arc::new(scorer)),
                Err(e) => {
                    tracing::warn!(
                        model = %self.model_name,
                        error = %e,
                        "re-ranker load failed, falling back to similarity order for this process"
                    );
                    None
                }
            })
            .as_ref()
    }

    /// Re-order candidates by cross-encoder relevance, truncated to
    /// `top_k`. Ties and every fallback path keep the input order.
    pub fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredUnit>,
        top_k: Option<usize>,
    ) -> Vec<DocumentUnit> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let units: Vec<DocumentUnit> = candidates.into_iter().map(|s| s.unit).collect();
        if !self.enabled {
            return truncate(units, top_k);
        }
        let Some(scorer) = self.scorer() else {
            return truncate(units, top_k);
        };

        let passages: Vec<String> = units.iter().map(|u| u.content.clone()).collect();
        let scores = match scorer.score(query, &passages) {
            Ok(scores) if scores.len() == passages.len() => scores,
            Ok(scores) => {
                tracing::warn!(
                    expected = passages.len(),
                    got = scores.len(),
                    "re-ranker returned misaligned scores, keeping similarity order"
                );
                return truncate(units, top_k);
            }
            Err(e) => {
                tracing::warn!(error = %e, "re-ranking failed, keeping similarity order");
                return truncate(units, top_k);
            }
        };

        let mut order: Vec<usize> = (0..units.len()).collect();
        // Stable sort: equal scores keep the original similarity order
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut slots: Vec<Option<DocumentUnit>> = units.into_iter().map(Some).collect();
        let reordered: Vec<DocumentUnit> = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();

        tracing::debug!(candidates = reordered.len(), "candidates re-ranked");
        truncate(reordered, top_k)
    }
}

fn truncate(mut units: Vec<DocumentUnit>, top_k: Option<usize>) -> Vec<DocumentUnit> {
    if let Some(k) = top_k {
        units.truncate(k);
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentType, LegalDomain, UnitKind};

    fn scored(content: &str, score: f32) -> ScoredUnit {
        ScoredUnit {
            unit: DocumentUnit {
                content: content.to_string(),
                source: "test.txt".to_string(),
                document_type: DocumentType::Law,
                legal_domain: LegalDomain::Civil,
                unit_kind: UnitKind::Article,
                unit_title: String::new(),
                unit_index: 0,
                start_offset: None,
            },
            score,
        }
    }

    fn contents(units: &[DocumentUnit]) -> Vec<&str> {
        units.iter().map(|u| u.content.as_str()).collect()
    }

    /// Scorer driven by a fixed score table
    struct TableScorer {
        by_passage: fn(&str) -> f32,
    }

    impl CrossEncoderScorer for TableScorer {
        fn score(&self, _query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>> {
            Ok(passages.iter().map(|p| (self.by_passage)(p)).collect())
        }
    }

    struct FailingScorer;

    impl CrossEncoderScorer for FailingScorer {
        fn score(&self, _query: &str, _passages: &[String]) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("scorer exploded")
        }
    }

    #[test]
    fn test_empty_input_empty_output() {
        let reranker = Reranker::disabled();
        assert!(reranker.rerank("سوال", Vec::new(), Some(3)).is_empty());
    }

    #[test]
    fn test_disabled_truncates_in_order() {
        let reranker = Reranker::disabled();
        let candidates = vec![scored("الف", 0.9), scored("ب", 0.8), scored("ج", 0.7)];
        let result = reranker.rerank("سوال", candidates, Some(2));
        assert_eq!(contents(&result), vec!["الف", "ب"]);
    }

    #[test]
    fn test_disabled_without_top_k_passes_all() {
        let reranker = Reranker::disabled();
        let candidates = vec![scored("الف", 0.9), scored("ب", 0.8)];
        assert_eq!(reranker.rerank("سوال", candidates, None).len(), 2);
    }

    #[test]
    fn test_scorer_reorders_by_score() {
        let reranker = Reranker::with_scorer(Arc::new(TableScorer {
            by_passage: |p| match p {
                "الف" => 0.1,
                "ب" => 0.9,
                _ => 0.5,
            },
        }));
        let candidates = vec![scored("الف", 0.9), scored("ب", 0.8), scored("ج", 0.7)];
        let result = reranker.rerank("سوال", candidates, Some(2));
        assert_eq!(contents(&result), vec!["ب", "ج"]);
    }

    #[test]
    fn test_decreasing_scores_keep_identity_order() {
        let reranker = Reranker::with_scorer(Arc::new(TableScorer {
            by_passage: |p| match p {
                "الف" => 3.0,
                "ب" => 2.0,
                _ => 1.0,
            },
        }));
        let candidates = vec![scored("الف", 0.9), scored("ب", 0.8), scored("ج", 0.7)];
        let result = reranker.rerank("سوال", candidates, Some(3));
        assert_eq!(contents(&result), vec!["الف", "ب", "ج"]);
    }

    #[test]
    fn test_tied_scores_keep_similarity_order() {
        let reranker = Reranker::with_scorer(Arc::new(TableScorer { by_passage: |_| 0.5 }));
        let candidates = vec![scored("الف", 0.9), scored("ب", 0.8), scored("ج", 0.7)];
        let result = reranker.rerank("سوال", candidates, None);
        assert_eq!(contents(&result), vec!["الف", "ب", "ج"]);
    }

    #[test]
    fn test_scoring_failure_falls_back_to_truncation() {
        let reranker = Reranker::with_scorer(Arc::new(FailingScorer));
        let candidates = vec![scored("الف", 0.9), scored("ب", 0.8), scored("ج", 0.7)];
        let result = reranker.rerank("سوال", candidates, Some(2));
        assert_eq!(contents(&result), vec!["الف", "ب"]);
    }

    #[test]
    fn test_top_k_larger_than_input() {
        let reranker = Reranker::with_scorer(Arc::new(TableScorer { by_passage: |_| 1.0 }));
        let candidates = vec![scored("الف", 0.9)];
        assert_eq!(reranker.rerank("سوال", candidates, Some(10)).len(), 1);
    }
}
