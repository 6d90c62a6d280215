//! The per-question pipeline
//!
//! Stage order: cache check, classify-and-retrieve (over-fetching 2k when
//! enhanced retrieval or re-ranking is on), re-rank to k, context join,
//! prompt assembly, generation, citation extraction, metrics, cache store.
//! Model-bound stages run on blocking threads. The result cache key is
//! (question, top_k, use_enhanced); the re-ranking flag and conversation
//! memory are deliberately not part of it (see DESIGN.md).

use crate::cache::ResultCache;
use crate::classify::QuestionClassifier;
use crate::domain::{Classification, DocumentUnit};
use crate::error::{DadyarError, Result};
use crate::llm::{ChatTurn, LanguageModel};
use crate::rag::{
    answer_mentions_citation, extract_citations, join_context, user_message, ChainOptions,
    RagAnswer, FALLBACK_PREAMBLE, PERSIAN_LEGAL_SYSTEM_PROMPT,
};
use crate::retrieval::{prefix_query, EnhancedRetriever, Reranker, ScoredUnit};
use crate::store::VectorStore;
use std::sync::Arc;
use std::time::Instant;

/// Owns the long-lived collaborators and builds per-request chains
pub struct RagEngine {
    store: Arc<VectorStore>,
    retriever: Arc<EnhancedRetriever>,
    reranker: Arc<Reranker>,
    llm: Option<Arc<dyn LanguageModel>>,
    cache: ResultCache,
}

impl RagEngine {
    pub fn new(
        store: Arc<VectorStore>,
        classifier: Arc<dyn QuestionClassifier>,
        reranker: Arc<Reranker>,
        llm: Option<Arc<dyn LanguageModel>>,
        cache: ResultCache,
        enable_domain_filter: bool,
    ) -> Self {
        let retriever = Arc::new(EnhancedRetriever::new(
            store.clone(),
            classifier,
            enable_domain_filter,
        ));
        Self {
            store,
            retriever,
            reranker,
            llm,
            cache,
        }
    }

    pub fn has_generation_backend(&self) -> bool {
        self.llm.is_some()
    }

    /// Build an immutable chain for one request configuration
    pub fn chain(&self, options: ChainOptions) -> RagChain {
        RagChain {
            store: self.store.clone(),
            retriever: self.retriever.clone(),
            reranker: self.reranker.clone(),
            llm: self.llm.clone(),
            cache: self.cache.clone(),
            options,
            memory: Vec::new(),
        }
    }
}

/// One configured pipeline instance; cheap to build, immutable once built
pub struct RagChain {
    store: Arc<VectorStore>,
    retriever: Arc<EnhancedRetriever>,
    reranker: Arc<Reranker>,
    llm: Option<Arc<dyn LanguageModel>>,
    cache: ResultCache,
    options: ChainOptions,
    memory: Vec<ChatTurn>,
}

impl RagChain {
    /// Attach prior conversation turns; they become structured chat
    /// history in the generation request
    pub fn with_memory(mut self, turns: Vec<ChatTurn>) -> Self {
        self.memory = turns;
        self
    }

    /// Run the full pipeline for one question
    pub async fn ask(&self, question: &str) -> Result<RagAnswer> {
        let k = self.options.top_k;
        let enhanced = self.options.use_enhanced_retrieval;

        if let Some(cached) = self.cache.get_result::<RagAnswer>(question, k, enhanced) {
            tracing::debug!("answer served from result cache");
            return Ok(cached);
        }

        let started = Instant::now();

        // Over-fetch so re-ranking has candidates to discard
        let fetch_k = if enhanced || self.options.use_reranking {
            k * 2
        } else {
            k
        };
        let (candidates, classification) = self.retrieve(question, fetch_k, enhanced).await?;
        let ranked = self.rank(question, candidates, k).await?;

        let context = join_context(&ranked);
        let sources = extract_citations(&ranked);

        let Some(llm) = self.llm.clone() else {
            return Ok(self.fallback_answer(context, sources, classification, started, enhanced));
        };

        let user = user_message(question, &context);
        let generated = llm
            .generate(PERSIAN_LEGAL_SYSTEM_PROMPT, &self.memory, &user)
            .await?;

        let citation_count = sources.len();
        let citation_accuracy = if citation_count > 0 && answer_mentions_citation(&generated) {
            1.0
        } else {
            0.5
        };

        let mut answer = RagAnswer {
            answer: generated,
            sources,
            response_time_seconds: Some(round3(started.elapsed().as_secs_f64())),
            citation_count: Some(citation_count),
            citation_accuracy: Some(citation_accuracy),
            domain: None,
            domain_label: None,
            domain_confidence: None,
        };
        if enhanced {
            if let Some(classification) = classification {
                answer.domain = Some(classification.domain.as_str().to_string());
                answer.domain_label = Some(classification.domain.label().to_string());
                answer.domain_confidence = Some(round2(classification.confidence));
            }
        }

        // Best-effort: a failed store must never fail the request
        self.cache.set_result(question, k, enhanced, &answer);
        Ok(answer)
    }

    async fn retrieve(
        &self,
        question: &str,
        fetch_k: usize,
        enhanced: bool,
    ) -> Result<(Vec<ScoredUnit>, Option<Classification>)> {
        let question = question.to_string();
        let retriever = self.retriever.clone();
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || {
            if enhanced {
                let (units, classification) =
                    retriever.retrieve_with_classification(&question, fetch_k)?;
                Ok((units, Some(classification)))
            } else {
                let units = store.similarity_search(&prefix_query(&question), fetch_k, None)?;
                Ok((units, None))
            }
        })
        .await
        .map_err(|e| DadyarError::Other(anyhow::anyhow!("retrieval task panicked: {}", e)))?
    }

    async fn rank(
        &self,
        question: &str,
        candidates: Vec<ScoredUnit>,
        k: usize,
    ) -> Result<Vec<DocumentUnit>> {
        if !self.options.use_reranking {
            return Ok(candidates.into_iter().take(k).map(|s| s.unit).collect());
        }
        let question = question.to_string();
        let reranker = self.reranker.clone();
        tokio::task::spawn_blocking(move || reranker.rerank(&question, candidates, Some(k)))
            .await
            .map_err(|e| DadyarError::Other(anyhow::anyhow!("re-ranking task panicked: {}", e)))
    }

    /// Extractive answer for the no-LLM mode: fixed preamble plus the raw
    /// context. Citation metrics stay absent; domain metadata survives
    /// when classification ran.
    fn fallback_answer(
        &self,
        context: String,
        sources: Vec<String>,
        classification: Option<Classification>,
        started: Instant,
        enhanced: bool,
    ) -> RagAnswer {
        let mut answer = RagAnswer {
            answer: format!("{}\n\n{}", FALLBACK_PREAMBLE, context),
            sources,
            response_time_seconds: Some(round3(started.elapsed().as_secs_f64())),
            citation_count: None,
            citation_accuracy: None,
            domain: None,
            domain_label: None,
            domain_confidence: None,
        };
        if enhanced {
            if let Some(classification) = classification {
                answer.domain = Some(classification.domain.as_str().to_string());
                answer.domain_confidence = Some(round2(classification.confidence));
            }
        }
        answer
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding() {
        assert_eq!(round3(0.123_456), 0.123);
        assert_eq!(round3(1.999_9), 2.0);
        assert_eq!(round2(0.333_3), 0.33);
        assert_eq!(round2(0.875), 0.88);
    }
}
