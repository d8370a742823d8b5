//! Skill matching and ranking.
//!
//! Scores every skill against a request analysis:
//!
//! ```text
//! keyword = matched_keywords / total_keywords * keyword_weight
//! intent  = intent_weight if skill.category == analysis.intent else 0
//! score   = clamp(keyword + intent, 0, 1)
//! ```
//!
//! Results at or below the threshold are dropped; the rest are sorted by
//! score, ties kept in input order.

use crate::types::{MatchResult, RequestAnalysis, SkillRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub const DEFAULT_KEYWORD_WEIGHT: f64 = 0.6;
pub const DEFAULT_INTENT_WEIGHT: f64 = 0.4;
pub const DEFAULT_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Scoring weights and the inclusion threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    pub keyword_weight: f64,
    pub intent_weight: f64,
    /// Results must score strictly above this to be kept.
    pub threshold: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            intent_weight: DEFAULT_INTENT_WEIGHT,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl MatchWeights {
    pub fn validate(&self) -> Result<(), MatchError> {
        for (name, value) in [
            ("keyword_weight", self.keyword_weight),
            ("intent_weight", self.intent_weight),
            ("threshold", self.threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MatchError::InvalidInput(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Scores one skill against the analysis. No filtering.
pub fn score_skill(
    analysis: &RequestAnalysis,
    skill: &SkillRecord,
    weights: &MatchWeights,
) -> MatchResult {
    let name = skill.name.to_lowercase();
    let description = skill.description.to_lowercase();

    let matched_keywords: Vec<String> = analysis
        .keywords
        .iter()
        .filter(|kw| {
            let kw = kw.to_lowercase();
            name.contains(&kw) || description.contains(&kw)
        })
        .cloned()
        .collect();

    // No keywords means no keyword signal rather than a division by zero.
    let keyword_score = if analysis.keywords.is_empty() {
        0.0
    } else {
        matched_keywords.len() as f64 / analysis.keywords.len() as f64 * weights.keyword_weight
    };

    let intent_matched = analysis.intent.matches_category(skill.category.as_deref());
    let intent_score = if intent_matched {
        weights.intent_weight
    } else {
        0.0
    };

    MatchResult {
        skill_name: skill.name.clone(),
        score: (keyword_score + intent_score).clamp(0.0, 1.0),
        matched_keywords,
        intent_matched,
    }
}

/// Ranks skills for a request.
///
/// Fails with [`MatchError::InvalidInput`] when the weights are unusable or
/// two skills share a name. An empty skill set yields an empty ranking.
pub fn match_skills(
    analysis: &RequestAnalysis,
    skills: &[SkillRecord],
    weights: &MatchWeights,
) -> Result<Vec<MatchResult>, MatchError> {
    weights.validate()?;

    let mut seen: HashSet<&str> = HashSet::with_capacity(skills.len());
    for skill in skills {
        if !seen.insert(skill.name.as_str()) {
            return Err(MatchError::InvalidInput(format!(
                "duplicate skill name: {}",
                skill.name
            )));
        }
    }

    let mut results: Vec<MatchResult> = skills
        .iter()
        .map(|skill| score_skill(analysis, skill, weights))
        .filter(|result| result.score > weights.threshold)
        .collect();

    // Vec::sort_by is stable, so ties keep input order.
    results.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(results)
}
