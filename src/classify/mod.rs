//! Keyword-based question classification
//!
//! Assigns each question to a legal domain by substring-matching curated
//! Persian keyword tables. Confidence is the fraction of a domain's table
//! found in the question, so small focused tables are not drowned out by
//! large ones. Results feed the domain filter in enhanced retrieval and
//! are cached under the `classification` namespace.

use crate::cache::ResultCache;
use crate::domain::{Classification, LegalDomain};

/// Capability interface for question classification
pub trait QuestionClassifier: Send + Sync {
    fn classify(&self, question: &str) -> Classification;
}

struct DomainKeywords {
    domain: LegalDomain,
    keywords: &'static [&'static str],
}

/// Scan order doubles as the tie-break order: on equal confidence the
/// earlier domain wins.
const DOMAIN_TABLE: &[DomainKeywords] = &[
    DomainKeywords {
        domain: LegalDomain::Criminal,
        keywords: &[
            "جرم",
            "مجازات",
            "زندان",
            "حبس",
            "جزا",
            "کیفر",
            "دعوای کیفری",
            "دادگاه کیفری",
            "دادستان",
            "شکایت کیفری",
            "قتل",
            "سرقت",
            "کلاهبرداری",
            "خیانت",
            "توهین",
            "ضرب و جرح",
        ],
    },
    DomainKeywords {
        domain: LegalDomain::Civil,
        keywords: &[
            "حقوق مدنی",
            "عقد",
            "قرارداد",
            "خرید و فروش",
            "اجاره",
            "ملک",
            "ارث",
            "وصیت",
            "ضمان",
            "کفالت",
            "رهن",
            "عقد نکاح",
            "طلاق",
            "نفقه",
            "مهریه",
        ],
    },
    DomainKeywords {
        domain: LegalDomain::Family,
        keywords: &[
            "خانواده",
            "ازدواج",
            "طلاق",
            "نفقه",
            "مهریه",
            "حضانت",
            "ولایت",
            "نسب",
            "عقد نکاح",
            "صیغه",
            "عده",
            "نشوز",
            "شیربها",
        ],
    },
    DomainKeywords {
        domain: LegalDomain::Commercial,
        keywords: &[
            "تجاری",
            "شرکت",
            "سهامی",
            "با مسئولیت محدود",
            "سفته",
            "برات",
            "چک",
            "اسناد تجاری",
            "ورشکستگی",
            "تجارت",
            "بازرگانی",
            "قرارداد تجاری",
        ],
    },
];

/// Keyword classifier with cached results
pub struct KeywordClassifier {
    cache: ResultCache,
}

impl KeywordClassifier {
    pub fn new(cache: ResultCache) -> Self {
        Self { cache }
    }

    pub fn without_cache() -> Self {
        Self {
            cache: ResultCache::disabled(),
        }
    }

    /// Pure scoring pass over the keyword tables
    fn score(question: &str) -> Classification {
        let lowered = question.to_lowercase();
        let mut best = Classification::unknown();
        for entry in DOMAIN_TABLE {
            let matched = entry
                .keywords
                .iter()
                .filter(|keyword| lowered.contains(*keyword))
                .count();
            if matched == 0 {
                continue;
            }
            let confidence = matched as f32 / entry.keywords.len() as f32;
            if confidence > best.confidence {
                best = Classification {
                    domain: entry.domain,
                    confidence,
                };
            }
        }
        best
    }
}

impl QuestionClassifier for KeywordClassifier {
    fn classify(&self, question: &str) -> Classification {
        if let Some(cached) = self.cache.get_classification::<Classification>(question) {
            return cached;
        }
        let result = Self::score(question);
        tracing::debug!(
            domain = result.domain.as_str(),
            confidence = result.confidence,
            "classified question"
        );
        self.cache.set_classification(question, &result);
        result
    }
}
