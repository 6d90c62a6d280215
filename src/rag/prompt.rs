//! Prompt constants and assembly
//!
//! The system prompt fixes persona, language, and the citation
//! requirement; the user message carries the question and the retrieved
//! context. Conversation history goes into the request as structured chat
//! turns between the two, never flattened into the prompt text.

use crate::domain::DocumentUnit;

pub const PERSIAN_LEGAL_SYSTEM_PROMPT: &str = "\
شما یک دستیار حقوقی متخصص در قوانین و مقررات ایران هستید.
با تکیه بر متون بازیابی‌شده، به پرسش پاسخ دقیق و مستند بده. اگر پاسخ قطعی نیست، عدم قطعیت را بیان کن و به منابع اشاره کن.
از حدس زدن خودداری کن و فقط بر اساس مدارک ارائه شده پاسخ بده. در پایان، مواد قانونی و منبع را فهرست کن.
زبان پاسخ: فارسی رسمی و روان.";

/// Fixed preamble of the extractive no-LLM answer
pub const FALLBACK_PREAMBLE: &str = "بر اساس متون یافت‌شده، موارد مرتبط در زیر آمده است. \
لطفاً با دقت مطالعه کنید و در صورت نیاز سوال را دقیق‌تر مطرح نمایید.";

/// Markers whose presence in a generated answer counts as citing
pub const CITATION_KEYWORDS: &[&str] = &["ماده", "اصل", "قانون", "منبع", "منابع"];

/// Ranked unit contents joined with blank lines
pub fn join_context(units: &[DocumentUnit]) -> String {
    units
        .iter()
        .map(|u| u.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The final user turn: question plus retrieved context
pub fn user_message(question: &str, context: &str) -> String {
    format!(
        "سوال: {}\n\nمتون بازیابی‌شده:\n{}\n\nپاسخ دقیق و مستند:",
        question, context
    )
}
