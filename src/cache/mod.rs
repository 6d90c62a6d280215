//! TTL cache for answers, classifications, and query embeddings
//!
//! Three namespaces share one backend: `rag:result` for full answer
//! payloads, `classification` for question/domain assignments, and
//! `embedding` for query vectors. The backend is optional; every operation
//! degrades to a miss or no-op when it is absent or failing, so callers
//! never branch on cache health.
//!
//! The result key is (question, top_k, use_enhanced). The re-ranking flag
//! and any conversation history are deliberately not part of the key; see
//! DESIGN.md.

use crate::config::CacheConfig;
use ahash::AHashMap;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, RwLock};

const RESULT_NAMESPACE: &str = "rag:result";
const CLASSIFICATION_NAMESPACE: &str = "classification";
const EMBEDDING_NAMESPACE: &str = "embedding";

/// Joined key args beyond this length are replaced by a content hash
const MAX_PLAIN_KEY_CHARS: usize = 200;

/// Cache backend contract
///
/// Implementations swallow their own failures; the pipeline treats every
/// miss and every failed write identically.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, ttl_secs: u64);
    fn delete(&self, key: &str);
}

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// In-process TTL backend
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<AHashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = Utc::now();
        {
            let entries = self.entries.read().ok()?;
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }
        // Expired: evict lazily under the write lock
        if let Ok(mut entries) = self.entries.write() {
            if entries
                .get(key)
                .map(|e| e.expires_at <= now)
                .unwrap_or(false)
            {
                entries.remove(key);
            }
        }
        None
    }

    fn set(&self, key: &str, value: String, ttl_secs: u64) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                key.to_string(),
                Entry {
                    value,
                    expires_at: Utc::now() + Duration::seconds(ttl_secs as i64),
                },
            );
        }
    }

    fn delete(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}

/// Namespaced cache front used throughout the pipeline
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct ResultCache {
    store: Option<Arc<dyn CacheStore>>,
    result_ttl_secs: u64,
    classification_ttl_secs: u64,
    embedding_ttl_secs: u64,
}

impl ResultCache {
    /// In-process backend when enabled, inert front otherwise
    pub fn new(config: &CacheConfig) -> Self {
        let store: Option<Arc<dyn CacheStore>> = if config.enabled {
            Some(Arc::new(MemoryCache::new()))
        } else {
            None
        };
        Self {
            store,
            result_ttl_secs: config.result_ttl_secs,
            classification_ttl_secs: config.classification_ttl_secs,
            embedding_ttl_secs: config.embedding_ttl_secs,
        }
    }

    /// Custom backend (tests, alternative stores)
    pub fn with_store(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store: Some(store),
            result_ttl_secs: config.result_ttl_secs,
            classification_ttl_secs: config.classification_ttl_secs,
            embedding_ttl_secs: config.embedding_ttl_secs,
        }
    }

    /// Front with no backend: every get misses, every set is a no-op
    pub fn disabled() -> Self {
        Self {
            store: None,
            result_ttl_secs: 0,
            classification_ttl_secs: 0,
            embedding_ttl_secs: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    fn make_key(namespace: &str, args: &[&str]) -> String {
        let joined = args.join(":");
        if joined.chars().count() > MAX_PLAIN_KEY_CHARS {
            format!("{}:{}", namespace, blake3::hash(joined.as_bytes()).to_hex())
        } else {
            format!("{}:{}", namespace, joined)
        }
    }

    fn get_json<T: DeserializeOwned>(&self, namespace: &str, args: &[&str]) -> Option<T> {
        let store = self.store.as_ref()?;
        let key = Self::make_key(namespace, args);
        let raw = store.get(&key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key = %key, "cache hit");
                Some(value)
            }
            Err(e) => {
                // Undecodable entries are treated as misses and evicted
                tracing::debug!(key = %key, error = %e, "dropping undecodable cache entry");
                store.delete(&key);
                None
            }
        }
    }

    fn set_json<T: Serialize>(&self, namespace: &str, args: &[&str], value: &T, ttl_secs: u64) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let key = Self::make_key(namespace, args);
        match serde_json::to_string(value) {
            Ok(raw) => store.set(&key, raw, ttl_secs),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to serialize cache value");
            }
        }
    }

    fn delete_key(&self, namespace: &str, args: &[&str]) {
        if let Some(store) = self.store.as_ref() {
            store.delete(&Self::make_key(namespace, args));
        }
    }

    /// Cached answer payload for (question, top_k, use_enhanced)
    pub fn get_result<T: DeserializeOwned>(
        &self,
        question: &str,
        top_k: usize,
        use_enhanced: bool,
    ) -> Option<T> {
        self.get_json(
            RESULT_NAMESPACE,
            &[question, &top_k.to_string(), &use_enhanced.to_string()],
        )
    }

    pub fn set_result<T: Serialize>(
        &self,
        question: &str,
        top_k: usize,
        use_enhanced: bool,
        value: &T,
    ) {
        self.set_json(
            RESULT_NAMESPACE,
            &[question, &top_k.to_string(), &use_enhanced.to_string()],
            value,
            self.result_ttl_secs,
        );
    }

    pub fn delete_result(&self, question: &str, top_k: usize, use_enhanced: bool) {
        self.delete_key(
            RESULT_NAMESPACE,
            &[question, &top_k.to_string(), &use_enhanced.to_string()],
        );
    }

    pub fn get_classification<T: DeserializeOwned>(&self, question: &str) -> Option<T> {
        self.get_json(CLASSIFICATION_NAMESPACE, &[question])
    }

    pub fn set_classification<T: Serialize>(&self, question: &str, value: &T) {
        self.set_json(
            CLASSIFICATION_NAMESPACE,
            &[question],
            value,
            self.classification_ttl_secs,
        );
    }

    pub fn get_embedding(&self, text: &str) -> Option<Vec<f32>> {
        self.get_json(EMBEDDING_NAMESPACE, &[text])
    }

    pub fn set_embedding(&self, text: &str, vector: &[f32]) {
        self.set_json(EMBEDDING_NAMESPACE, &[text], &vector, self.embedding_ttl_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ResultCache {
        ResultCache::new(&CacheConfig {
            enabled: true,
            result_ttl_secs: 3600,
            classification_ttl_secs: 3600,
            embedding_ttl_secs: 86400,
        })
    }

    #[test]
    fn test_result_round_trip() {
        let cache = cache();
        let value = serde_json::json!({"answer": "پاسخ", "sources": ["a.txt"]});

        assert!(cache
            .get_result::<serde_json::Value>("سوال", 5, true)
            .is_none());
        cache.set_result("سوال", 5, true, &value);
        let back: serde_json::Value = cache.get_result("سوال", 5, true).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_key_distinguishes_top_k_and_mode() {
        let cache = cache();
        cache.set_result("سوال", 5, true, &serde_json::json!("a"));
        assert!(cache
            .get_result::<serde_json::Value>("سوال", 3, true)
            .is_none());
        assert!(cache
            .get_result::<serde_json::Value>("سوال", 5, false)
            .is_none());
    }

    #[test]
    fn test_delete_result() {
        let cache = cache();
        cache.set_result("سوال", 5, true, &serde_json::json!("a"));
        cache.delete_result("سوال", 5, true);
        assert!(cache
            .get_result::<serde_json::Value>("سوال", 5, true)
            .is_none());
    }

    #[test]
    fn test_disabled_cache_is_inert() {
        let cache = ResultCache::disabled();
        cache.set_result("سوال", 5, true, &serde_json::json!("a"));
        assert!(cache
            .get_result::<serde_json::Value>("سوال", 5, true)
            .is_none());
        assert!(!cache.is_enabled());
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let backend = MemoryCache::new();
        backend.set("k", "v".to_string(), 0);
        // TTL 0 expires immediately
        assert!(backend.get("k").is_none());
    }

    #[test]
    fn test_long_keys_are_hashed() {
        let long_arg = "پرسش ".repeat(100);
        let key = ResultCache::make_key(RESULT_NAMESPACE, &[&long_arg, "5", "true"]);
        // namespace + ':' + 64 hex chars
        assert_eq!(key.len(), RESULT_NAMESPACE.len() + 1 + 64);
        assert!(key.starts_with("rag:result:"));
    }

    #[test]
    fn test_embedding_round_trip() {
        let cache = cache();
        let vector = vec![0.25_f32, -0.5, 1.0];
        cache.set_embedding("query: متن", &vector);
        assert_eq!(cache.get_embedding("query: متن").unwrap(), vector);
        assert!(cache.get_embedding("query: دیگر").is_none());
    }

    #[test]
    fn test_undecodable_entry_is_evicted() {
        let backend = Arc::new(MemoryCache::new());
        let cache = ResultCache::with_store(
            backend.clone(),
            &CacheConfig {
                enabled: true,
                result_ttl_secs: 3600,
                classification_ttl_secs: 3600,
                embedding_ttl_secs: 86400,
            },
        );
        backend.set("classification:سوال", "not-json".to_string(), 3600);
        assert!(cache
            .get_classification::<serde_json::Value>("سوال")
            .is_none());
        assert!(backend.get("classification:سوال").is_none());
    }
}
