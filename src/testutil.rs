//! Shared test doubles for unit tests
//!
//! Integration tests under `tests/` carry their own copies since this
//! module is compiled only for the library's own test build.

use crate::embedding::{EmbeddingError, EmbeddingProvider};

/// Deterministic embedder: token hashes scattered over a small dense
/// vector, normalized, so shared words mean higher cosine
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in text.split_whitespace() {
            let hash = blake3::hash(token.as_bytes());
            let slot = hash.as_bytes()[0] as usize % self.dimension;
            vector[slot] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }
}
