//! Core data model: legal domains, document types, and document units
//!
//! Every unit stored or retrieved by the pipeline carries this metadata.
//! String values are stable (they are persisted in the unit catalog and
//! appear in answer payloads); Persian labels are presentation-only.

use serde::{Deserialize, Serialize};

/// Legal domain a document or question belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegalDomain {
    Criminal,
    Civil,
    Family,
    Commercial,
    Unknown,
}

impl LegalDomain {
    /// Stable string value used in storage and answer payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            LegalDomain::Criminal => "criminal",
            LegalDomain::Civil => "civil",
            LegalDomain::Family => "family",
            LegalDomain::Commercial => "commercial",
            LegalDomain::Unknown => "unknown",
        }
    }

    /// Persian display label
    pub fn label(&self) -> &'static str {
        match self {
            LegalDomain::Criminal => "کیفری",
            LegalDomain::Civil => "مدنی",
            LegalDomain::Family => "خانواده",
            LegalDomain::Commercial => "تجاری",
            LegalDomain::Unknown => "عمومی",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "criminal" => Some(LegalDomain::Criminal),
            "civil" => Some(LegalDomain::Civil),
            "family" => Some(LegalDomain::Family),
            "commercial" => Some(LegalDomain::Commercial),
            "unknown" => Some(LegalDomain::Unknown),
            _ => None,
        }
    }
}

/// Kind of legal document, detected at ingestion time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Law,
    Regulation,
    Ruling,
    /// Default when no keyword matches
    Document,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Law => "law",
            DocumentType::Regulation => "regulation",
            DocumentType::Ruling => "ruling",
            DocumentType::Document => "document",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "law" => Some(DocumentType::Law),
            "regulation" => Some(DocumentType::Regulation),
            "ruling" => Some(DocumentType::Ruling),
            "document" => Some(DocumentType::Document),
            _ => None,
        }
    }
}

/// Structural kind of a segmented unit
///
/// The first four correspond to the Persian heading keywords the segmenter
/// recognizes; `Section` is the fallback for unmatched headings and for
/// chunks produced by the generic splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// ماده
    Article,
    /// اصل
    Principle,
    /// تبصره
    Note,
    /// بند
    Clause,
    /// بخش
    Section,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Article => "ماده",
            UnitKind::Principle => "اصل",
            UnitKind::Note => "تبصره",
            UnitKind::Clause => "بند",
            UnitKind::Section => "بخش",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ماده" => Some(UnitKind::Article),
            "اصل" => Some(UnitKind::Principle),
            "تبصره" => Some(UnitKind::Note),
            "بند" => Some(UnitKind::Clause),
            "بخش" => Some(UnitKind::Section),
            _ => None,
        }
    }
}

/// One retrievable unit of a legal document
///
/// Units are identified by `(source, unit_index)`; re-ingesting a source
/// replaces its units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUnit {
    /// Unit text, trimmed
    pub content: String,
    /// Originating file name or logical source identifier
    pub source: String,
    pub document_type: DocumentType,
    pub legal_domain: LegalDomain,
    pub unit_kind: UnitKind,
    /// Heading remainder, e.g. "۱۲ مکرر" for "ماده ۱۲ مکرر"; empty for
    /// generic chunks
    pub unit_title: String,
    /// Zero-based position within the source
    pub unit_index: usize,
    /// Byte offset into the source text; only populated by the fallback
    /// splitter
    pub start_offset: Option<usize>,
}

/// Question classification result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub domain: LegalDomain,
    /// Matched keywords / table size, in [0, 1]
    pub confidence: f32,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            domain: LegalDomain::Unknown,
            confidence: 0.0,
        }
    }
}

/// Metadata constraints applied during similarity search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub legal_domain: Option<LegalDomain>,
    pub document_type: Option<DocumentType>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.legal_domain.is_none() && self.document_type.is_none()
    }

    /// Whether a unit satisfies every set constraint
    pub fn matches(&self, unit: &DocumentUnit) -> bool {
        if let Some(domain) = self.legal_domain {
            if unit.legal_domain != domain {
                return false;
            }
        }
        if let Some(doc_type) = self.document_type {
            if unit.document_type != doc_type {
                return false;
            }
        }
        true
    }
}
