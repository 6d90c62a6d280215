//! Configuration management for dadyar
//!
//! Loading, validation, profile application, and environment overrides for
//! every tunable in the pipeline. All sections have working defaults; a
//! config file is optional for local use.

use crate::error::{DadyarError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub reranker: RerankerConfig,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Logical corpus name; databases and archives live under
    /// `data_dir/<collection>`
    pub collection: String,
}

/// Fallback splitter configuration (used when a document has no
/// recognizable legal headings)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap carried between consecutive chunks, in characters
    pub chunk_overlap: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    /// Model hub download timeout, applied when the standard env knob is
    /// unset
    pub download_timeout_secs: u64,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Final result count when the caller does not specify one
    pub default_top_k: usize,
    /// Whether classified questions constrain search to their domain
    pub enable_domain_filter: bool,
    pub hnsw_ef_search: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
}

/// Cross-encoder re-ranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub enabled: bool,
    pub model: String,
}

/// Generation backend configuration
///
/// Provider selection at startup: the OpenAI-compatible backend when the
/// configured key env var is set, else Ollama when `ollama_model` is
/// non-empty, else extractive fallback mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub openai_api_key_env: String,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Empty string disables the Ollama backend
    pub ollama_model: String,
    pub ollama_base_url: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

/// Answer / classification / embedding cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub result_ttl_secs: u64,
    pub classification_ttl_secs: u64,
    pub embedding_ttl_secs: u64,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranker_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_enabled: Option<bool>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DadyarError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DadyarError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load from the default path, falling back to defaults when no file
    /// exists yet
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            let mut config = Config::default();
            config.apply_env_overrides();
            ConfigValidator::validate(&config)?;
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DadyarError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DadyarError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        if let Some(overrides) = self.profiles.get(profile) {
            if let Some(model) = &overrides.embedding_model {
                self.embedding.model = model.clone();
            }
            if let Some(dimension) = overrides.embedding_dimension {
                self.embedding.dimension = dimension;
            }
            if let Some(enabled) = overrides.reranker_enabled {
                self.reranker.enabled = enabled;
            }
            if let Some(enabled) = overrides.cache_enabled {
                self.cache.enabled = enabled;
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: DADYAR_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("DADYAR_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        fn parse_bool(path: &str, value: &str) -> Result<bool> {
            value.parse().map_err(|_| DadyarError::InvalidConfigValue {
                path: path.to_string(),
                message: format!("Cannot parse '{}' as boolean", value),
            })
        }
        fn parse_usize(path: &str, value: &str) -> Result<usize> {
            value.parse().map_err(|_| DadyarError::InvalidConfigValue {
                path: path.to_string(),
                message: format!("Cannot parse '{}' as integer", value),
            })
        }

        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "STORAGE__COLLECTION" => {
                self.storage.collection = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__DIMENSION" => {
                self.embedding.dimension = parse_usize(path, value)?;
            }
            "RETRIEVAL__DEFAULT_TOP_K" => {
                self.retrieval.default_top_k = parse_usize(path, value)?;
            }
            "RETRIEVAL__ENABLE_DOMAIN_FILTER" => {
                self.retrieval.enable_domain_filter = parse_bool(path, value)?;
            }
            "RERANKER__ENABLED" => {
                self.reranker.enabled = parse_bool(path, value)?;
            }
            "RERANKER__MODEL" => {
                self.reranker.model = value.to_string();
            }
            "LLM__OPENAI_MODEL" => {
                self.llm.openai_model = value.to_string();
            }
            "LLM__OLLAMA_MODEL" => {
                self.llm.ollama_model = value.to_string();
            }
            "LLM__OLLAMA_BASE_URL" => {
                self.llm.ollama_base_url = value.to_string();
            }
            "CACHE__ENABLED" => {
                self.cache.enabled = parse_bool(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DadyarError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("dadyar").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| DadyarError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".dadyar"))
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.dadyar");

        let mut profiles = HashMap::new();
        // Offline keeps everything local and cheap; accuracy trades load
        // time for the larger embedding model.
        profiles.insert(
            "offline".to_string(),
            ProfileOverrides {
                embedding_model: Some("multilingual-e5-small".to_string()),
                embedding_dimension: Some(384),
                reranker_enabled: Some(false),
                cache_enabled: None,
            },
        );
        profiles.insert(
            "accuracy".to_string(),
            ProfileOverrides {
                embedding_model: Some("multilingual-e5-large".to_string()),
                embedding_dimension: Some(1024),
                reranker_enabled: Some(true),
                cache_enabled: None,
            },
        );

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir,
                collection: "legal_docs".to_string(),
            },
            chunking: ChunkingConfig {
                chunk_size: 800,
                chunk_overlap: 120,
            },
            embedding: EmbeddingConfig {
                model: "multilingual-e5-base".to_string(),
                dimension: 768,
                batch_size: 32,
                download_timeout_secs: 120,
            },
            retrieval: RetrievalConfig {
                default_top_k: 5,
                enable_domain_filter: true,
                hnsw_ef_search: 50,
                hnsw_ef_construction: 200,
                hnsw_m: 16,
            },
            reranker: RerankerConfig {
                enabled: true,
                model: "bge-reranker-base".to_string(),
            },
            llm: LlmConfig {
                openai_api_key_env: "OPENAI_API_KEY".to_string(),
                openai_model: "gpt-4o-mini".to_string(),
                openai_base_url: "https://api.openai.com/v1".to_string(),
                ollama_model: String::new(),
                ollama_base_url: "http://localhost:11434".to_string(),
                temperature: 0.0,
                request_timeout_secs: 120,
            },
            cache: CacheConfig {
                enabled: true,
                result_ttl_secs: 3600,
                classification_ttl_secs: 3600,
                embedding_ttl_secs: 86400,
            },
            profiles,
        }
    }
}
