//! RAG orchestration
//!
//! `RagEngine` owns the long-lived collaborators and hands out immutable
//! per-request `RagChain`s; a chain runs the full pipeline for one
//! question: cache check, classify-and-retrieve, re-rank, prompt assembly,
//! generation, citation extraction, metrics, cache store. Without a
//! generation backend the chain still answers, extractively.

mod chain;
mod prompt;

pub use chain::{RagChain, RagEngine};
pub use prompt::{
    join_context, user_message, CITATION_KEYWORDS, FALLBACK_PREAMBLE,
    PERSIAN_LEGAL_SYSTEM_PROMPT,
};

use crate::domain::DocumentUnit;
use serde::{Deserialize, Serialize};

/// Per-request pipeline options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainOptions {
    pub top_k: usize,
    pub use_enhanced_retrieval: bool,
    pub use_reranking: bool,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            use_enhanced_retrieval: true,
            use_reranking: true,
        }
    }
}

/// The answer payload returned by a chain and stored in the result cache
///
/// Optional fields depend on the mode: citation metrics only exist when a
/// generation backend produced the answer, domain metadata only when
/// enhanced retrieval classified the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    /// Unique unit sources, first-seen order
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_confidence: Option<f32>,
}

/// Unique source identifiers from ranked units, first-seen order
pub fn extract_citations(units: &[DocumentUnit]) -> Vec<String> {
    let mut seen = ahash::AHashSet::new();
    let mut sources = Vec::new();
    for unit in units {
        if !unit.source.is_empty() && seen.insert(unit.source.as_str()) {
            sources.push(unit.source.clone());
        }
    }
    sources
}

/// Whether a generated answer carries any citation marker
pub fn answer_mentions_citation(answer: &str) -> bool {
    CITATION_KEYWORDS.iter().any(|kw| answer.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentType, LegalDomain, UnitKind};

    fn unit(source: &str) -> DocumentUnit {
        DocumentUnit {
            content: "متن".to_string(),
            source: source.to_string(),
            document_type: DocumentType::Law,
            legal_domain: LegalDomain::Civil,
            unit_kind: UnitKind::Article,
            unit_title: String::new(),
            unit_index: 0,
            start_offset: None,
        }
    }

    #[test]
    fn test_extract_citations_unique_first_seen() {
        let units = vec![unit("a"), unit("b"), unit("a")];
        assert_eq!(extract_citations(&units), vec!["a", "b"]);
    }

    #[test]
    fn test_extract_citations_skips_empty_source() {
        let units = vec![unit(""), unit("a")];
        assert_eq!(extract_citations(&units), vec!["a"]);
    }

    #[test]
    fn test_citation_heuristic() {
        assert!(answer_mentions_citation("طبق ماده ۱۲ قانون مدنی"));
        assert!(answer_mentions_citation("منابع: قانون اساسی"));
        assert!(!answer_mentions_citation("پاسخ بدون ارجاع"));
    }

    #[test]
    fn test_answer_round_trips_without_optional_fields() {
        let answer = RagAnswer {
            answer: "پاسخ".to_string(),
            sources: vec!["a.txt".to_string()],
            response_time_seconds: Some(0.123),
            citation_count: None,
            citation_accuracy: None,
            domain: None,
            domain_label: None,
            domain_confidence: None,
        };
        let json = serde_json::to_string(&answer).unwrap();
        assert!(!json.contains("citation_accuracy"));
        let back: RagAnswer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, answer);
    }

    #[test]
    fn test_default_options() {
        let options = ChainOptions::default();
        assert_eq!(options.top_k, 5);
        assert!(options.use_enhanced_retrieval);
        assert!(options.use_reranking);
    }
}
