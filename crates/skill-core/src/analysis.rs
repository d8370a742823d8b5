//! Fallback request analysis from free text.
//!
//! Real requests are analysed externally; this keeps the CLI usable when
//! only a sentence is available.

use crate::types::{Intent, RequestAnalysis};

/// Confidence assigned to keyword-extraction analyses.
pub const EXTRACTED_CONFIDENCE: f64 = 0.5;

/// Extracts lowercase keywords from text.
///
/// Splits on non-alphanumeric characters and keeps tokens of at least 3
/// bytes, so a single CJK character survives while "to" and "is" do not.
/// First occurrence order is kept and duplicates are dropped.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.len() < 3 {
            continue;
        }
        let word = word.to_lowercase();
        if !keywords.contains(&word) {
            keywords.push(word);
        }
    }
    keywords
}

impl RequestAnalysis {
    pub fn from_text(text: &str, intent: impl Into<Intent>) -> Self {
        Self::new(extract_keywords(text), intent, EXTRACTED_CONFIDENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_keywords_filters_short_words() {
        let keywords = extract_keywords("A to is PDF test foo");
        assert_eq!(keywords, vec!["pdf", "test", "foo"]);
    }

    #[test]
    fn extract_keywords_keeps_order_and_dedupes() {
        let keywords = extract_keywords("Excel excel, EXCEL report; excel-stats");
        assert_eq!(keywords, vec!["excel", "report", "stats"]);
    }

    #[test]
    fn extract_keywords_keeps_cjk_tokens() {
        let keywords = extract_keywords("用 excel 做 分析");
        assert_eq!(keywords, vec!["用", "excel", "做", "分析"]);
    }

    #[test]
    fn from_text_builds_analysis() {
        let analysis = RequestAnalysis::from_text("Translate the README", "creation");
        assert_eq!(analysis.keywords, vec!["translate", "the", "readme"]);
        assert_eq!(analysis.intent.as_str(), "creation");
        assert_eq!(analysis.confidence, EXTRACTED_CONFIDENCE);
    }

    #[test]
    fn from_text_with_no_usable_words_is_empty() {
        let analysis = RequestAnalysis::from_text("a b ?", "analysis");
        assert!(analysis.keywords.is_empty());
    }
}
