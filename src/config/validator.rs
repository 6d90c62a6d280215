use crate::config::Config;
use crate::error::{DadyarError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        // Validate schema version
        Self::validate_schema_version(config, &mut errors);

        // Validate storage settings
        Self::validate_storage(config, &mut errors);

        // Validate chunking settings
        Self::validate_chunking(config, &mut errors);

        // Validate embedding settings
        Self::validate_embedding(config, &mut errors);

        // Validate retrieval settings
        Self::validate_retrieval(config, &mut errors);

        // Validate reranker settings
        Self::validate_reranker(config, &mut errors);

        // Validate LLM settings
        Self::validate_llm(config, &mut errors);

        // Validate cache settings
        Self::validate_cache(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DadyarError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }

        let collection = &config.storage.collection;
        if collection.is_empty() {
            errors.push(ValidationError::new(
                "storage.collection",
                "Collection name cannot be empty",
            ));
        } else if collection.contains(['/', '\\']) {
            errors.push(ValidationError::new(
                "storage.collection",
                format!("Collection name must not contain path separators: {}", collection),
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.chunking.chunk_size == 0 {
            errors.push(ValidationError::new(
                "chunking.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        // Overlap equal to or beyond the chunk size would never advance
        if config.chunking.chunk_overlap >= config.chunking.chunk_size
            && config.chunking.chunk_size > 0
        {
            errors.push(ValidationError::new(
                "chunking.chunk_overlap",
                format!(
                    "Chunk overlap ({}) must be smaller than chunk size ({})",
                    config.chunking.chunk_overlap, config.chunking.chunk_size
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Vector dimension must be greater than 0",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.default_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_top_k",
                "default_top_k must be greater than 0",
            ));
        }

        if config.retrieval.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "retrieval.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }

        if config.retrieval.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "retrieval.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.retrieval.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "retrieval.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }
    }

    fn validate_reranker(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.reranker.enabled && config.reranker.model.is_empty() {
            errors.push(ValidationError::new(
                "reranker.model",
                "Re-ranker model name cannot be empty when enabled",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.llm.openai_api_key_env.is_empty() {
            errors.push(ValidationError::new(
                "llm.openai_api_key_env",
                "API key environment variable name cannot be empty",
            ));
        }

        // Validate temperature range
        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        if config.llm.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.request_timeout_secs",
                "Request timeout must be greater than 0",
            ));
        }

        if !config.llm.ollama_model.is_empty() && config.llm.ollama_base_url.is_empty() {
            errors.push(ValidationError::new(
                "llm.ollama_base_url",
                "Ollama base URL cannot be empty when an Ollama model is set",
            ));
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.enabled {
            for (path, ttl) in [
                ("cache.result_ttl_secs", config.cache.result_ttl_secs),
                (
                    "cache.classification_ttl_secs",
                    config.cache.classification_ttl_secs,
                ),
                ("cache.embedding_ttl_secs", config.cache.embedding_ttl_secs),
            ] {
                if ttl == 0 {
                    errors.push(ValidationError::new(path, "TTL must be greater than 0"));
                }
            }
        }
    }
}
