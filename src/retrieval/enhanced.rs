//! Domain-aware retrieval over the vector store
//!
//! Classifies the question, then constrains similarity search to the
//! detected domain when filtering is enabled. An unknown domain or a
//! disabled filter degrades to plain top-k search; retrieval never fails
//! because classification was inconclusive.

use crate::classify::QuestionClassifier;
use crate::domain::{Classification, DocumentType, LegalDomain, MetadataFilter};
use crate::error::Result;
use crate::retrieval::prefix_query;
use crate::store::{ScoredUnit, VectorStore};
use std::sync::Arc;

pub struct EnhancedRetriever {
    store: Arc<VectorStore>,
    classifier: Arc<dyn QuestionClassifier>,
    enable_domain_filter: bool,
}

impl EnhancedRetriever {
    pub fn new(
        store: Arc<VectorStore>,
        classifier: Arc<dyn QuestionClassifier>,
        enable_domain_filter: bool,
    ) -> Self {
        Self {
            store,
            classifier,
            enable_domain_filter,
        }
    }

    /// Build the metadata filter for a request, or `None` for unfiltered
    /// search. A concrete domain only filters when domain filtering is
    /// enabled; a document type filters on its own.
    fn build_filter(
        &self,
        domain: Option<LegalDomain>,
        document_type: Option<DocumentType>,
    ) -> Option<MetadataFilter> {
        match domain {
            Some(domain) if self.enable_domain_filter && domain != LegalDomain::Unknown => {
                Some(MetadataFilter {
                    legal_domain: Some(domain),
                    document_type,
                })
            }
            _ => document_type.map(|doc_type| MetadataFilter {
                legal_domain: None,
                document_type: Some(doc_type),
            }),
        }
    }

    /// Top-k retrieval with optional domain and document-type constraints
    pub fn retrieve(
        &self,
        query: &str,
        k: usize,
        domain: Option<LegalDomain>,
        document_type: Option<DocumentType>,
    ) -> Result<Vec<ScoredUnit>> {
        let filter = self.build_filter(domain, document_type);
        if let Some(filter) = &filter {
            tracing::debug!(
                domain = ?filter.legal_domain.map(|d| d.as_str()),
                document_type = ?filter.document_type.map(|t| t.as_str()),
                "retrieving with metadata filter"
            );
        }
        self.store
            .similarity_search(&prefix_query(query), k, filter.as_ref())
    }

    /// Classify the question, then retrieve with the detected domain
    pub fn retrieve_with_classification(
        &self,
        question: &str,
        k: usize,
    ) -> Result<(Vec<ScoredUnit>, Classification)> {
        let classification = self.classifier.classify(question);
        let units = self.retrieve(question, k, Some(classification.domain), None)?;
        Ok((units, classification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KeywordClassifier;
    use crate::cache::ResultCache;

    fn retriever(enable_domain_filter: bool) -> (tempfile::TempDir, EnhancedRetriever) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(
            VectorStore::in_memory(
                dir.path(),
                Arc::new(crate::testutil::HashEmbedder::new(16)),
                ResultCache::disabled(),
            )
            .unwrap(),
        );
        let retriever = EnhancedRetriever::new(
            store,
            Arc::new(KeywordClassifier::without_cache()),
            enable_domain_filter,
        );
        (dir, retriever)
    }

    #[test]
    fn test_filter_construction() {
        let (_dir, enabled) = retriever(true);

        assert_eq!(enabled.build_filter(None, None), None);
        assert_eq!(enabled.build_filter(Some(LegalDomain::Unknown), None), None);

        let domain_only = enabled
            .build_filter(Some(LegalDomain::Criminal), None)
            .unwrap();
        assert_eq!(domain_only.legal_domain, Some(LegalDomain::Criminal));
        assert_eq!(domain_only.document_type, None);

        let both = enabled
            .build_filter(Some(LegalDomain::Civil), Some(DocumentType::Law))
            .unwrap();
        assert_eq!(both.legal_domain, Some(LegalDomain::Civil));
        assert_eq!(both.document_type, Some(DocumentType::Law));

        // Document type filters even without a domain
        let type_only = enabled.build_filter(None, Some(DocumentType::Ruling)).unwrap();
        assert_eq!(type_only.legal_domain, None);
        assert_eq!(type_only.document_type, Some(DocumentType::Ruling));
    }

    #[test]
    fn test_classification_drives_the_filter() {
        let (_dir, retriever) = retriever(true);
        let units = vec![
            crate::domain::DocumentUnit {
                content: "نفقه زوجه بر عهده زوج است".to_string(),
                source: "خانواده.txt".to_string(),
                document_type: DocumentType::Law,
                legal_domain: LegalDomain::Family,
                unit_kind: crate::domain::UnitKind::Article,
                unit_title: "۱".to_string(),
                unit_index: 0,
                start_offset: None,
            },
            crate::domain::DocumentUnit {
                content: "مجازات سرقت حبس است".to_string(),
                source: "کیفری.txt".to_string(),
                document_type: DocumentType::Law,
                legal_domain: LegalDomain::Criminal,
                unit_kind: crate::domain::UnitKind::Article,
                unit_title: "۱".to_string(),
                unit_index: 0,
                start_offset: None,
            },
        ];
        retriever.store.add_documents(&units).unwrap();

        let (hits, classification) = retriever
            .retrieve_with_classification("نفقه چگونه محاسبه می‌شود؟", 5)
            .unwrap();
        assert_eq!(classification.domain, LegalDomain::Family);
        assert!(classification.confidence > 0.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit.legal_domain, LegalDomain::Family);
    }

    #[test]
    fn test_disabled_filter_keeps_document_type() {
        let (_dir, disabled) = retriever(false);
        assert_eq!(disabled.build_filter(Some(LegalDomain::Criminal), None), None);

        let type_only = disabled
            .build_filter(Some(LegalDomain::Criminal), Some(DocumentType::Law))
            .unwrap();
        assert_eq!(type_only.legal_domain, None);
        assert_eq!(type_only.document_type, Some(DocumentType::Law));
    }
}
