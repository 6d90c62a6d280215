//! Document ingestion: load, detect, segment, store
//!
//! Accepts UTF-8 `.txt` and `.md` files. Each file is annotated with a
//! detected document type and legal domain, segmented into legal units,
//! archived verbatim, and written to the vector store. Detection is a
//! coarse keyword scan: the filename first for the document type, the
//! opening text for the domain. The query-time classifier in `classify`
//! uses richer tables; ingestion only needs a rough tag to filter on.

use crate::domain::{DocumentType, LegalDomain};
use crate::error::{DadyarError, Result};
use crate::segment::Segmenter;
use crate::store::VectorStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ACCEPTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// How far into the content detection looks
const TYPE_SCAN_CHARS: usize = 500;
const DOMAIN_SCAN_CHARS: usize = 1000;

const LAW_KEYWORDS: &[&str] = &["قانون", "law"];
const REGULATION_KEYWORDS: &[&str] = &["آیین‌نامه", "آیین نامه", "regulation"];
const RULING_KEYWORDS: &[&str] = &["رای", "حکم", "ruling"];

/// Ingestion-time domain tags; scan order doubles as the tie-break order
const DOMAIN_KEYWORDS: &[(LegalDomain, &[&str])] = &[
    (LegalDomain::Criminal, &["جرم", "مجازات", "کیفری", "زندان", "حبس"]),
    (LegalDomain::Civil, &["حقوق مدنی", "عقد", "قرارداد", "ارث", "وصیت"]),
    (LegalDomain::Family, &["خانواده", "ازدواج", "طلاق", "نفقه", "حضانت"]),
    (LegalDomain::Commercial, &["تجاری", "شرکت", "سهامی", "چک", "برات"]),
];

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| haystack.contains(kw))
}

/// Document type from the filename, then the opening content
pub fn detect_document_type(source: &str, text: &str) -> DocumentType {
    let source_lower = source.to_lowercase();
    let priority: &[(DocumentType, &[&str])] = &[
        (DocumentType::Law, LAW_KEYWORDS),
        (DocumentType::Regulation, REGULATION_KEYWORDS),
        (DocumentType::Ruling, RULING_KEYWORDS),
    ];

    for (doc_type, keywords) in priority {
        if contains_any(&source_lower, keywords) {
            return *doc_type;
        }
    }

    let text_lower = truncate_chars(text, TYPE_SCAN_CHARS).to_lowercase();
    for (doc_type, keywords) in priority {
        if contains_any(&text_lower, keywords) {
            return *doc_type;
        }
    }

    DocumentType::Document
}

/// Legal domain from the opening content: keyword presence counts per
/// domain, highest non-zero count wins, earlier domain wins on ties
pub fn detect_legal_domain(text: &str) -> LegalDomain {
    let text_lower = truncate_chars(text, DOMAIN_SCAN_CHARS).to_lowercase();

    let mut best = LegalDomain::Unknown;
    let mut best_score = 0usize;
    for (domain, keywords) in DOMAIN_KEYWORDS {
        let score = keywords.iter().filter(|kw| text_lower.contains(*kw)).count();
        if score > best_score {
            best = *domain;
            best_score = score;
        }
    }
    best
}

/// Outcome of ingesting a single source
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub source: String,
    pub document_type: DocumentType,
    pub legal_domain: LegalDomain,
    pub unit_count: usize,
}

/// Loads files, runs detection and segmentation, and writes to the store
pub struct DocumentIngestor {
    segmenter: Box<dyn Segmenter>,
    store: Arc<VectorStore>,
}

impl DocumentIngestor {
    pub fn new(segmenter: Box<dyn Segmenter>, store: Arc<VectorStore>) -> Self {
        Self { segmenter, store }
    }

    /// Ingest one file. Unsupported extensions are rejected before any
    /// processing; empty files are skipped with a warning (`Ok(None)`).
    pub fn ingest_file(&self, path: &Path) -> Result<Option<IngestReport>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(DadyarError::UnsupportedFile { extension });
        }

        let text = std::fs::read_to_string(path).map_err(|e| DadyarError::Io {
            source: e,
            context: format!("reading {}", path.display()),
        })?;
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        if text.trim().is_empty() {
            tracing::warn!(source, "skipping empty document");
            return Ok(None);
        }

        self.ingest_text(&source, &text).map(Some)
    }

    /// Ingest raw text under a logical source name
    pub fn ingest_text(&self, source: &str, text: &str) -> Result<IngestReport> {
        let document_type = detect_document_type(source, text);
        let legal_domain = detect_legal_domain(text);

        let units = self.segmenter.segment(text, source, document_type, legal_domain);
        tracing::info!(
            source,
            document_type = document_type.as_str(),
            legal_domain = legal_domain.as_str(),
            units = units.len(),
            "document segmented"
        );

        self.store.archive_source(source, text)?;
        let unit_count = self.store.add_documents(&units)?;
        self.store
            .register_document(source, document_type, legal_domain, unit_count)?;

        Ok(IngestReport {
            source: source.to_string(),
            document_type,
            legal_domain,
            unit_count,
        })
    }

    /// Ingest every accepted file under a directory, recursively.
    ///
    /// Files with other extensions are skipped, not rejected; a directory
    /// walk is expected to pass over unrelated files.
    pub fn ingest_dir(&self, dir: &Path) -> Result<Vec<IngestReport>> {
        let mut files = Vec::new();
        collect_accepted_files(dir, &mut files)?;
        files.sort();

        let mut reports = Vec::new();
        for file in files {
            if let Some(report) = self.ingest_file(&file)? {
                reports.push(report);
            }
        }
        Ok(reports)
    }
}

fn collect_accepted_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| DadyarError::Io {
        source: e,
        context: format!("reading directory {}", dir.display()),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| DadyarError::Io {
            source: e,
            context: format!("reading directory entry in {}", dir.display()),
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_accepted_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| ACCEPTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
        {
            out.push(path);
        } else {
            tracing::debug!(path = %path.display(), "skipping non-document file");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_from_filename_beats_content() {
        // Filename says ruling even though the content mentions قانون
        let detected = detect_document_type("رای-دیوان.txt", "قانون مدنی در این رای...");
        assert_eq!(detected, DocumentType::Ruling);
    }

    #[test]
    fn test_type_filename_priority_order() {
        // Law outranks regulation when both keyword sets hit
        let detected = detect_document_type("قانون و آیین‌نامه.txt", "");
        assert_eq!(detected, DocumentType::Law);
    }

    #[test]
    fn test_type_from_content() {
        assert_eq!(
            detect_document_type("doc1.txt", "متن آیین‌نامه اجرایی"),
            DocumentType::Regulation
        );
        assert_eq!(
            detect_document_type("doc2.txt", "ruling of the court"),
            DocumentType::Ruling
        );
    }

    #[test]
    fn test_type_defaults_to_document() {
        assert_eq!(
            detect_document_type("notes.txt", "متن بدون کلیدواژه"),
            DocumentType::Document
        );
    }

    #[test]
    fn test_type_content_scan_is_bounded() {
        let mut text = "متن خنثی ".repeat(100);
        text.push_str("قانون");
        // The keyword sits past the 500-char window
        assert_eq!(detect_document_type("doc.txt", &text), DocumentType::Document);
    }

    #[test]
    fn test_domain_detection() {
        assert_eq!(
            detect_legal_domain("جرم و مجازات در قانون کیفری"),
            LegalDomain::Criminal
        );
        assert_eq!(
            detect_legal_domain("خانواده و ازدواج و طلاق"),
            LegalDomain::Family
        );
        assert_eq!(detect_legal_domain("متن بی‌ربط"), LegalDomain::Unknown);
    }

    #[test]
    fn test_domain_tie_goes_to_earlier_entry() {
        // One criminal keyword, one civil keyword: criminal is scanned first
        assert_eq!(detect_legal_domain("جرم در قرارداد"), LegalDomain::Criminal);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        let text = "ماده یک";
        assert_eq!(truncate_chars(text, 4), "ماده");
        assert_eq!(truncate_chars(text, 100), text);
    }
}
