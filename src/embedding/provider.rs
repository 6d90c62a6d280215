/// Embedding provider trait and FastEmbed implementation
use crate::config::EmbeddingConfig;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for embedding providers
///
/// Abstracts over embedding backends so the store and tests can swap in
/// deterministic implementations. Persian queries follow the asymmetric
/// E5 convention: callers prefix query text with `"query: "`, passages are
/// embedded as-is.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts (batched for efficiency),
    /// one output vector per input in order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// FastEmbed provider for local embedding generation
///
/// Runs the multilingual E5 family on ONNX, fully offline after the first
/// model download:
/// - multilingual-e5-small: ~120MB, 384 dims
/// - multilingual-e5-base: ~280MB, 768 dims (default; matches the corpus
///   embedding used at ingestion)
/// - multilingual-e5-large: ~1GB, 1024 dims
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a provider from the embedding configuration
    ///
    /// Models download on demand to the hub cache on first use. The
    /// configured dimension must match the model; a stored corpus embedded
    /// at one dimension cannot be searched at another.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension) = match config.model.as_str() {
            "multilingual-e5-small" | "intfloat/multilingual-e5-small" => {
                (EmbeddingModel::MultilingualE5Small, 384)
            }
            "multilingual-e5-base" | "intfloat/multilingual-e5-base" => {
                (EmbeddingModel::MultilingualE5Base, 768)
            }
            "multilingual-e5-large" | "intfloat/multilingual-e5-large" => {
                (EmbeddingModel::MultilingualE5Large, 1024)
            }
            other => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: multilingual-e5-small, \
                     multilingual-e5-base, multilingual-e5-large",
                    other
                )));
            }
        };

        if config.dimension != dimension {
            return Err(EmbeddingError::InitializationError(format!(
                "Configured dimension {} does not match model {} ({} dims)",
                config.dimension, config.model, dimension
            )));
        }

        // The hub client honors this knob; only fill it in when the
        // environment has not chosen one already.
        if std::env::var_os("HF_HUB_DOWNLOAD_TIMEOUT").is_none() {
            std::env::set_var(
                "HF_HUB_DOWNLOAD_TIMEOUT",
                config.download_timeout_secs.to_string(),
            );
        }

        tracing::info!(
            "Initializing embedding model: {} ({}D, downloaded on first use)",
            config.model,
            dimension
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: config.model.clone(),
            dimension,
        })
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let embeddings = self
            .model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Empty entries would silently misalign outputs against inputs
        if let Some(pos) = texts.iter().position(|t| t.is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!(
                "Empty text at position {}",
                pos
            )));
        }

        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            model: model.to_string(),
            dimension,
            batch_size: 32,
            download_timeout_secs: 120,
        }
    }

    #[test]
    fn test_unsupported_model_rejected() {
        let result = FastEmbedProvider::new(&config("word2vec", 300));
        assert!(matches!(
            result,
            Err(EmbeddingError::InitializationError(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        // Wrong dimension fails before any model download
        let result = FastEmbedProvider::new(&config("multilingual-e5-base", 384));
        assert!(matches!(
            result,
            Err(EmbeddingError::InitializationError(_))
        ));
    }

    #[test]
    #[ignore] // Requires model download (~120MB) - run with: cargo test -- --ignored
    fn test_provider_creation() {
        let provider = FastEmbedProvider::new(&config("multilingual-e5-small", 384)).unwrap();
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.model_name(), "multilingual-e5-small");
    }

    #[test]
    #[ignore] // Requires model download (~120MB) - run with: cargo test -- --ignored
    fn test_persian_embedding() {
        let provider = FastEmbedProvider::new(&config("multilingual-e5-small", 384)).unwrap();
        let embedding = provider.embed("ماده ۱ هر شخص دارای حقوق مدنی است.").unwrap();
        assert_eq!(embedding.len(), 384);

        // E5 embeddings come back normalized
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.1);
    }

    #[test]
    #[ignore] // Requires model download (~120MB) - run with: cargo test -- --ignored
    fn test_query_matches_related_passage() {
        let provider = FastEmbedProvider::new(&config("multilingual-e5-small", 384)).unwrap();

        let query = provider.embed("query: مجازات سرقت چیست؟").unwrap();
        let related = provider.embed("سرقت مستوجب حبس است.").unwrap();
        let unrelated = provider.embed("قرارداد اجاره باید کتبی باشد.").unwrap();

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    #[ignore] // Requires model download (~120MB) - run with: cargo test -- --ignored
    fn test_empty_batch_entry_rejected() {
        let provider = FastEmbedProvider::new(&config("multilingual-e5-small", 384)).unwrap();
        let texts = vec!["متن".to_string(), String::new()];
        assert!(matches!(
            provider.embed_batch(&texts),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (mag_a * mag_b)
    }
}
