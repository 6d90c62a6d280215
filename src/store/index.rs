/// HNSW vector index for similarity search
use hnsw_rs::prelude::*;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// Search result with catalog row ID and similarity score
#[derive(Debug, Clone)]
pub struct IndexHit {
    /// Rowid of the unit in the catalog
    pub id: i64,
    /// Cosine similarity score (higher is more similar)
    pub score: f32,
}

/// HNSW vector index wrapper
///
/// In-memory approximate nearest neighbor search over unit embeddings.
/// The catalog is the source of truth; the index is rebuilt from persisted
/// vectors at open and after destructive writes. Uses cosine similarity
/// (dot product on normalized vectors).
pub struct VectorIndex {
    index: RwLock<Hnsw<'static, f32, DistCosine>>,
    dimension: usize,
    ef_construction: usize,
    m: usize,
    count: RwLock<usize>,
}

/// Capacity hint for layer generation; the index grows past it
const EXPECTED_ELEMENTS: usize = 10_000;
const MAX_LAYERS: usize = 16;

impl VectorIndex {
    pub fn new(dimension: usize, ef_construction: usize, m: usize) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(
            m,
            EXPECTED_ELEMENTS,
            MAX_LAYERS,
            ef_construction,
            DistCosine,
        );
        Self {
            index: RwLock::new(index),
            dimension,
            ef_construction,
            m,
            count: RwLock::new(0),
        }
    }

    /// Insert a vector keyed by its catalog rowid
    pub fn insert(&self, id: i64, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let data = vector.to_vec();
        let index = self.index.write().unwrap();
        index.insert((&data, id as usize));

        let mut count = self.count.write().unwrap();
        *count += 1;

        Ok(())
    }

    pub fn insert_batch(&self, items: &[(i64, Vec<f32>)]) -> Result<(), VectorIndexError> {
        for (id, vector) in items {
            self.insert(*id, vector)?;
        }
        Ok(())
    }

    /// Search for k nearest neighbors, sorted by score descending
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<IndexHit>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index.read().unwrap();
        let results = index.search(query, k, ef_search);

        Ok(results
            .into_iter()
            .map(|neighbour| IndexHit {
                id: neighbour.d_id as i64,
                score: 1.0 - neighbour.distance,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        *self.count.read().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Drop all vectors and start over (used when the catalog is rebuilt)
    pub fn clear(&self) {
        let mut index = self.index.write().unwrap();
        *index = Hnsw::<f32, DistCosine>::new(
            self.m,
            EXPECTED_ELEMENTS,
            MAX_LAYERS,
            self.ef_construction,
            DistCosine,
        );

        let mut count = self.count.write().unwrap();
        *count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index() {
        let index = VectorIndex::new(4, 200, 16);
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 4);
        assert!(index.search(&[1.0, 0.0, 0.0, 0.0], 3, 50).unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_search() {
        let index = VectorIndex::new(4, 200, 16);

        index.insert(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.insert(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        index.insert(3, &[0.9, 0.1, 0.0, 0.0]).unwrap();
        assert_eq!(index.len(), 3);

        let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 2, 50).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].id == 1 || hits[0].id == 3);
        assert!(hits[0].score > 0.8);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_dimension_validation() {
        let index = VectorIndex::new(4, 200, 16);
        assert!(index.insert(1, &[1.0, 0.0]).is_err());
        index.insert(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(index.search(&[1.0, 0.0], 1, 50).is_err());
    }

    #[test]
    fn test_clear() {
        let index = VectorIndex::new(4, 200, 16);
        index.insert(7, &[0.5, 0.5, 0.0, 0.0]).unwrap();
        assert_eq!(index.len(), 1);

        index.clear();
        assert!(index.is_empty());
        assert!(index.search(&[0.5, 0.5, 0.0, 0.0], 1, 50).unwrap().is_empty());
    }
}
