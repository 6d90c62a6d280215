//! Vector store over the unit catalog
//!
//! The SQLite catalog is the source of truth; the HNSW index is an
//! in-memory acceleration structure rebuilt from persisted vectors at open
//! and after any destructive write. Filtered search bypasses the index and
//! scans the matching catalog rows exactly, so a domain filter never
//! changes which vectors are comparable, only which rows compete.

use crate::cache::ResultCache;
use crate::config::Config;
use crate::domain::{DocumentUnit, MetadataFilter};
use crate::embedding::EmbeddingProvider;
use crate::error::{DadyarError, Result};
use std::path::PathBuf;
use std::sync::Arc;

mod blob;
mod database;
mod index;

pub use blob::ArchiveStore;
pub use database::{CatalogStats, Database};
pub use index::{IndexHit, VectorIndex};

/// Raw documents below this size are archived uncompressed
const COMPRESSION_THRESHOLD: usize = 4096;

/// A retrieved unit with its similarity score
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    pub unit: DocumentUnit,
    /// Cosine similarity against the query, higher is more similar
    pub score: f32,
}

/// Store-wide totals for the stats command
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub document_count: u64,
    pub unit_count: u64,
    pub indexed_vectors: usize,
    pub dimension: usize,
    pub db_size_bytes: u64,
}

pub struct VectorStore {
    db: Database,
    index: VectorIndex,
    archive: ArchiveStore,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: ResultCache,
    ef_search: usize,
    batch_size: usize,
}

impl VectorStore {
    /// Open the store under `data_dir/<collection>`, rebuilding the vector
    /// index from the persisted catalog
    pub fn open(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        cache: ResultCache,
    ) -> Result<Self> {
        let collection_dir = collection_dir(config);
        let db = Database::new(&collection_dir.join("catalog.db"))?;
        let archive = ArchiveStore::new(&collection_dir, COMPRESSION_THRESHOLD)?;
        let index = VectorIndex::new(
            embedder.dimension(),
            config.retrieval.hnsw_ef_construction,
            config.retrieval.hnsw_m,
        );

        let store = Self {
            db,
            index,
            archive,
            embedder,
            cache,
            ef_search: config.retrieval.hnsw_ef_search,
            batch_size: config.embedding.batch_size,
        };
        store.rebuild_index()?;
        Ok(store)
    }

    /// Test constructor over an in-memory catalog
    #[cfg(test)]
    pub fn in_memory(
        archive_dir: &std::path::Path,
        embedder: Arc<dyn EmbeddingProvider>,
        cache: ResultCache,
    ) -> Result<Self> {
        let store = Self {
            db: Database::in_memory()?,
            index: VectorIndex::new(embedder.dimension(), 200, 16),
            archive: ArchiveStore::new(archive_dir, COMPRESSION_THRESHOLD)?,
            embedder,
            cache,
            ef_search: 50,
            batch_size: 32,
        };
        Ok(store)
    }

    fn rebuild_index(&self) -> Result<()> {
        self.index.clear();
        let vectors = self.db.all_embeddings()?;
        if vectors.is_empty() {
            return Ok(());
        }
        let count = vectors.len();
        self.index
            .insert_batch(&vectors)
            .map_err(|e| DadyarError::Config(format!("Index rebuild failed: {}", e)))?;
        tracing::info!(vectors = count, "vector index rebuilt from catalog");
        Ok(())
    }

    /// Embed and persist units, replacing any previous units of the same
    /// sources. Returns the number of units stored.
    ///
    /// A corrupt catalog is recreated once and the write retried; a second
    /// failure propagates.
    pub fn add_documents(&self, units: &[DocumentUnit]) -> Result<usize> {
        if units.is_empty() {
            return Ok(0);
        }

        let mut embeddings = Vec::with_capacity(units.len());
        for batch in units.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|u| u.content.clone()).collect();
            let batch_vectors = self
                .embedder
                .embed_batch(&texts)
                .map_err(|e| DadyarError::Upstream {
                    service: "embedding".to_string(),
                    reason: e.to_string(),
                })?;
            embeddings.extend(batch_vectors);
        }

        let mut sources: Vec<String> = units.iter().map(|u| u.source.clone()).collect();
        sources.dedup();

        let (ids, replaced) = match self.db.replace_units(&sources, units, &embeddings) {
            Ok(result) => result,
            Err(DadyarError::Database(ref e)) if database::is_corruption_error(e) => {
                tracing::warn!(error = %e, "catalog corrupt, recreating and retrying write");
                self.db.recreate()?;
                self.index.clear();
                self.db.replace_units(&sources, units, &embeddings)?
            }
            Err(e) => return Err(e),
        };

        if replaced {
            // Stale vectors for the replaced rows cannot be deleted from
            // the HNSW graph, so rebuild from the catalog
            self.rebuild_index()?;
        } else {
            let items: Vec<(i64, Vec<f32>)> = ids.into_iter().zip(embeddings).collect();
            self.index
                .insert_batch(&items)
                .map_err(|e| DadyarError::Config(format!("Index insert failed: {}", e)))?;
        }

        tracing::info!(units = units.len(), sources = sources.len(), "units stored");
        Ok(units.len())
    }

    /// Top-k similarity search, optionally constrained by metadata.
    ///
    /// Query embeddings go through the `embedding` cache namespace; callers
    /// apply the `"query: "` prefix before calling.
    pub fn similarity_search(
        &self,
        query_text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredUnit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = self.embed_query(query_text)?;

        match filter {
            Some(filter) if !filter.is_empty() => self.filtered_search(&query, k, filter),
            _ => self.index_search(&query, k),
        }
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.get_embedding(text) {
            if cached.len() == self.embedder.dimension() {
                return Ok(cached);
            }
        }
        let vector = self.embedder.embed(text).map_err(|e| DadyarError::Upstream {
            service: "embedding".to_string(),
            reason: e.to_string(),
        })?;
        self.cache.set_embedding(text, &vector);
        Ok(vector)
    }

    fn index_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredUnit>> {
        let hits = self
            .index
            .search(query, k, self.ef_search)
            .map_err(|e| DadyarError::Config(format!("Vector search failed: {}", e)))?;

        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        let rows = self.db.fetch_by_ids(&ids)?;

        let scores: ahash::AHashMap<i64, f32> = hits.into_iter().map(|h| (h.id, h.score)).collect();
        Ok(rows
            .into_iter()
            .map(|(id, unit)| ScoredUnit {
                unit,
                score: scores.get(&id).copied().unwrap_or(0.0),
            })
            .collect())
    }

    /// Exact cosine scan over the catalog rows matching the filter
    fn filtered_search(
        &self,
        query: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredUnit>> {
        let rows = self.db.scan_filtered(filter)?;
        let mut scored: Vec<ScoredUnit> = rows
            .into_iter()
            .map(|(_, unit, embedding)| ScoredUnit {
                score: cosine_similarity(query, &embedding),
                unit,
            })
            .collect();

        // Stable sort keeps catalog (rowid) order on exact ties
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// Archive a source's raw text and record its hash in the registry
    pub fn archive_source(&self, source: &str, text: &str) -> Result<String> {
        let (hash, newly_written) = self.archive.store(text)?;
        if newly_written {
            tracing::debug!(source, hash = %hash, "raw document archived");
        }
        self.db.set_document_hash(source, &hash)?;
        Ok(hash)
    }

    /// Read back a source's archived text by hash
    pub fn read_archived(&self, hash: &str) -> Result<String> {
        self.archive.read(hash)
    }

    /// Record an ingested source in the document registry
    pub fn register_document(
        &self,
        source: &str,
        document_type: crate::domain::DocumentType,
        legal_domain: crate::domain::LegalDomain,
        unit_count: usize,
    ) -> Result<()> {
        self.db.upsert_document(source, document_type, legal_domain, unit_count)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let catalog = self.db.stats()?;
        Ok(StoreStats {
            document_count: catalog.document_count,
            unit_count: catalog.unit_count,
            indexed_vectors: self.index.len(),
            dimension: self.index.dimension(),
            db_size_bytes: catalog.db_size_bytes,
        })
    }

    pub fn units_per_domain(&self) -> Result<Vec<(crate::domain::LegalDomain, u64)>> {
        self.db.units_per_domain()
    }
}

fn collection_dir(config: &Config) -> PathBuf {
    config.storage.data_dir.join(&config.storage.collection)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentType, LegalDomain, UnitKind};
    use crate::testutil::HashEmbedder;
    use tempfile::TempDir;

    fn unit(source: &str, index: usize, domain: LegalDomain, content: &str) -> DocumentUnit {
        DocumentUnit {
            content: content.to_string(),
            source: source.to_string(),
            document_type: DocumentType::Law,
            legal_domain: domain,
            unit_kind: UnitKind::Article,
            unit_title: format!("{}", index + 1),
            unit_index: index,
            start_offset: None,
        }
    }

    fn store() -> (TempDir, VectorStore) {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::in_memory(
            dir.path(),
            Arc::new(HashEmbedder::new(16)),
            ResultCache::disabled(),
        )
        .unwrap();
        (dir, store)
    }

    #[test]
    fn test_add_and_unfiltered_search() {
        let (_dir, store) = store();
        let units = vec![
            unit("a.txt", 0, LegalDomain::Civil, "عقد اجاره ملک و قرارداد"),
            unit("a.txt", 1, LegalDomain::Criminal, "مجازات سرقت و حبس"),
        ];
        assert_eq!(store.add_documents(&units).unwrap(), 2);

        let hits = store
            .similarity_search("مجازات سرقت و حبس", 1, None)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit.legal_domain, LegalDomain::Criminal);
        assert!(hits[0].score > 0.9);
    }

    #[test]
    fn test_filtered_search_only_matching_domain() {
        let (_dir, store) = store();
        let units = vec![
            unit("a.txt", 0, LegalDomain::Civil, "عقد اجاره ملک"),
            unit("b.txt", 0, LegalDomain::Criminal, "مجازات سرقت"),
        ];
        store.add_documents(&units).unwrap();

        let filter = MetadataFilter {
            legal_domain: Some(LegalDomain::Civil),
            document_type: None,
        };
        // The query matches the criminal unit but the filter excludes it
        let hits = store
            .similarity_search("مجازات سرقت", 5, Some(&filter))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit.legal_domain, LegalDomain::Civil);
    }

    #[test]
    fn test_empty_filter_uses_index() {
        let (_dir, store) = store();
        store
            .add_documents(&[unit("a.txt", 0, LegalDomain::Civil, "متن عقد")])
            .unwrap();

        let empty = MetadataFilter::default();
        let hits = store.similarity_search("متن عقد", 5, Some(&empty)).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_reingest_replaces_source_units() {
        let (_dir, store) = store();
        store
            .add_documents(&[
                unit("a.txt", 0, LegalDomain::Civil, "متن اول"),
                unit("a.txt", 1, LegalDomain::Civil, "متن دوم"),
            ])
            .unwrap();
        assert_eq!(store.stats().unwrap().unit_count, 2);

        store
            .add_documents(&[unit("a.txt", 0, LegalDomain::Civil, "متن جایگزین")])
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.unit_count, 1);
        assert_eq!(stats.indexed_vectors, 1);

        let hits = store.similarity_search("متن جایگزین", 5, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit.content, "متن جایگزین");
    }

    #[test]
    fn test_archive_round_trip() {
        let (_dir, store) = store();
        let text = "ماده ۱ متن کامل سند.";
        let hash = store.archive_source("a.txt", text).unwrap();
        assert_eq!(store.read_archived(&hash).unwrap(), text);
    }

    #[test]
    fn test_k_zero_returns_nothing() {
        let (_dir, store) = store();
        store
            .add_documents(&[unit("a.txt", 0, LegalDomain::Civil, "متن")])
            .unwrap();
        assert!(store.similarity_search("متن", 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
