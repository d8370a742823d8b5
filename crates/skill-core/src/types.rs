//! Core types for skill matching.
//!
//! `SkillRecord` and `RequestAnalysis` are the matcher inputs, `MatchResult`
//! its output. All three are plain immutable values passed between stages.

use serde::{Deserialize, Serialize};

/// Category label of a request or a skill (e.g. `analysis`, `creation`).
///
/// Stored trimmed and lower-cased, and a skill's category is normalised the
/// same way before comparing. So `" Analysis"` equals `analysis`, a looser
/// test than exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Intent(String);

impl Intent {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(label.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An intent with an empty label never matches any category.
    pub fn is_unspecified(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a skill's declared category names this intent.
    pub fn matches_category(&self, category: Option<&str>) -> bool {
        if self.is_unspecified() {
            return false;
        }
        category.is_some_and(|c| Self::new(c) == *self)
    }
}

impl From<String> for Intent {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

impl From<&str> for Intent {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<Intent> for String {
    fn from(intent: Intent) -> Self {
        intent.0
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A locally available skill as seen by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    /// Unique skill name.
    pub name: String,
    /// What the skill does and when to use it.
    pub description: String,
    /// Declared category, compared against the request intent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl SkillRecord {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Structured summary of a free-text request.
///
/// Keywords are lower-cased and trimmed but otherwise kept as given,
/// duplicates included, since the keyword score divides by their count.
/// Confidence lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAnalysis")]
pub struct RequestAnalysis {
    pub keywords: Vec<String>,
    pub intent: Intent,
    pub confidence: f64,
}

/// Wire shape of an analysis produced by an external analyser.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    intent: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl From<RawAnalysis> for RequestAnalysis {
    fn from(raw: RawAnalysis) -> Self {
        Self::new(raw.keywords, raw.intent, raw.confidence)
    }
}

impl RequestAnalysis {
    pub fn new<I, S>(keywords: I, intent: impl Into<Intent>, confidence: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized = keywords
            .into_iter()
            .map(|keyword| keyword.as_ref().trim().to_lowercase())
            .collect();

        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Self {
            keywords: normalized,
            intent: intent.into(),
            confidence,
        }
    }
}

/// A skill paired with its relevance score for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub skill_name: String,
    /// Total score in `[0, 1]`.
    pub score: f64,
    /// Keywords found in the skill name or description.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
    /// Whether the skill category equals the request intent.
    pub intent_matched: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_is_normalized() {
        assert_eq!(Intent::new("  Analysis "), Intent::new("analysis"));
        assert_eq!(Intent::new("Creation").as_str(), "creation");
    }

    #[test]
    fn intent_matches_category_case_insensitively() {
        let intent = Intent::new("analysis");
        assert!(intent.matches_category(Some("Analysis")));
        assert!(!intent.matches_category(Some("creation")));
        assert!(!intent.matches_category(None));
    }

    #[test]
    fn empty_intent_never_matches() {
        let intent = Intent::new("");
        assert!(intent.is_unspecified());
        assert!(!intent.matches_category(Some("")));
    }

    #[test]
    fn analysis_keeps_keyword_sequence() {
        let analysis = RequestAnalysis::new(["Excel", " excel ", "", "分析"], "analysis", 0.9);
        assert_eq!(analysis.keywords, vec!["excel", "excel", "", "分析"]);
        assert_eq!(analysis.intent.as_str(), "analysis");
    }

    #[test]
    fn analysis_clamps_confidence() {
        assert_eq!(RequestAnalysis::new(["a"], "x", 1.7).confidence, 1.0);
        assert_eq!(RequestAnalysis::new(["a"], "x", -0.2).confidence, 0.0);
        assert_eq!(RequestAnalysis::new(["a"], "x", f64::NAN).confidence, 0.0);
    }

    #[test]
    fn analysis_deserializes_through_normalization() {
        let json = r#"{"keywords": ["PDF", "pdf", "Export"], "intent": "Creation"}"#;
        let analysis: RequestAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.keywords, vec!["pdf", "pdf", "export"]);
        assert_eq!(analysis.intent, Intent::new("creation"));
        assert_eq!(analysis.confidence, 1.0);
    }

    #[test]
    fn skill_record_serializes_without_missing_category() {
        let record = SkillRecord::new("excel-stats", "Excel statistics.");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("category"));

        let record = record.with_category("analysis");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"category\":\"analysis\""));
    }
}
