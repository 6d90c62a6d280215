//! Query-time retrieval: metadata-filtered search and re-ranking

mod enhanced;
mod reranker;

pub use enhanced::EnhancedRetriever;
pub use reranker::{CrossEncoderScorer, Reranker};

pub use crate::store::ScoredUnit;

/// Instruction token the E5 family expects on the query side of its
/// asymmetric query/passage scheme. Passages are embedded bare.
pub const QUERY_PREFIX: &str = "query: ";

pub fn prefix_query(query: &str) -> String {
    format!("{}{}", QUERY_PREFIX, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_query() {
        assert_eq!(prefix_query("مجازات سرقت چیست؟"), "query: مجازات سرقت چیست؟");
    }
}
