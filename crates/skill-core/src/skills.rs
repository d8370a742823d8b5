//! SKILL.md frontmatter parsing and validation.
//!
//! A skill is a directory holding a `SKILL.md` whose YAML frontmatter names
//! and describes it. See: https://agentskills.io/specification

use crate::types::SkillRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Where a skill was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLocation {
    /// Under the workspace root (e.g., `.claude/skills`).
    Project,
    /// Outside the workspace (e.g., `~/.claude/skills`).
    Global,
}

impl SkillLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Global => "global",
        }
    }
}

/// Validated metadata from a SKILL.md frontmatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMetadata {
    /// Skill name (1-64 chars, lowercase alphanumeric + hyphens).
    pub name: String,
    /// What the skill does and when to use it (1-1024 chars).
    pub description: String,
    /// Declared category used for intent matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Compatibility notes (max 500 chars).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// Pre-approved tools, from the space-delimited `allowed-tools` field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
    /// Skill directory.
    pub path: PathBuf,
    pub location: SkillLocation,
}

impl SkillMetadata {
    /// The matcher's view of this skill.
    pub fn to_record(&self) -> SkillRecord {
        SkillRecord {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkillError {
    #[error("missing YAML frontmatter")]
    MissingFrontmatter,
    #[error("invalid YAML frontmatter: {0}")]
    InvalidYaml(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("invalid description: {0}")]
    InvalidDescription(String),
    #[error("invalid compatibility: {0}")]
    InvalidCompatibility(String),
    #[error("failed to read SKILL.md: {0}")]
    Io(String),
}

#[derive(Debug, Deserialize)]
struct RawFrontmatter {
    name: Option<String>,
    description: Option<String>,
    category: Option<String>,
    intent: Option<String>,
    license: Option<String>,
    compatibility: Option<String>,
    metadata: Option<HashMap<String, serde_yaml::Value>>,
    #[serde(rename = "allowed-tools")]
    allowed_tools: Option<String>,
}

const MAX_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_CHARS: usize = 1024;
const MAX_COMPATIBILITY_CHARS: usize = 500;

/// Checks a skill name: 1-64 lowercase ASCII letters, digits and single
/// inner hyphens.
pub fn validate_name(name: &str) -> Result<(), SkillError> {
    let problem = if name.is_empty() {
        Some("must not be empty".to_string())
    } else if name.len() > MAX_NAME_LEN {
        Some(format!("longer than {MAX_NAME_LEN} characters ({})", name.len()))
    } else if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        Some(format!("'{bad}' is not a lowercase letter, digit or hyphen"))
    } else if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
        Some("hyphens must separate words".to_string())
    } else {
        None
    };
    problem.map_or(Ok(()), |p| Err(SkillError::InvalidName(format!("{name:?} {p}"))))
}

/// Non-blank, at most `max` chars. Counted in chars because many skills
/// are described in CJK text.
fn check_text(value: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("must not be blank".to_string());
    }
    match value.chars().count() {
        len if len > max => Err(format!("longer than {max} characters ({len})")),
        _ => Ok(()),
    }
}

pub fn validate_description(description: &str) -> Result<(), SkillError> {
    check_text(description, MAX_DESCRIPTION_CHARS).map_err(SkillError::InvalidDescription)
}

fn validate_compatibility(compatibility: &str) -> Result<(), SkillError> {
    check_text(compatibility, MAX_COMPATIBILITY_CHARS).map_err(SkillError::InvalidCompatibility)
}

/// Splits SKILL.md content into (frontmatter, rest after the closing `---`).
fn split_frontmatter(content: &str) -> Result<(&str, &str), SkillError> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    let Some(after_open) = trimmed.strip_prefix("---") else {
        return Err(SkillError::MissingFrontmatter);
    };
    let after_newline = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    // An empty frontmatter closes immediately.
    if let Some(rest) = after_newline.strip_prefix("---") {
        return Ok(("", rest));
    }

    let close_pos = after_newline.find("\n---").ok_or(SkillError::MissingFrontmatter)?;
    let frontmatter = after_newline[..close_pos].trim_end_matches('\r');
    Ok((frontmatter, &after_newline[close_pos + 4..]))
}

fn metadata_value_to_string(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parses SKILL.md content into validated metadata.
pub fn parse_skill_md(
    content: &str,
    path: PathBuf,
    location: SkillLocation,
) -> Result<SkillMetadata, SkillError> {
    let (frontmatter, _) = split_frontmatter(content)?;

    let raw: RawFrontmatter = serde_yaml::from_str(frontmatter)
        .map_err(|e| SkillError::InvalidYaml(e.to_string()))?;

    let name = raw.name.ok_or(SkillError::MissingField("name"))?;
    validate_name(&name)?;

    let description = raw.description.ok_or(SkillError::MissingField("description"))?;
    validate_description(&description)?;
    raw.compatibility.as_deref().map_or(Ok(()), validate_compatibility)?;

    let metadata: HashMap<String, String> = raw
        .metadata
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| metadata_value_to_string(v).map(|v| (k, v)))
        .collect();

    let category = raw
        .category
        .or(raw.intent)
        .or_else(|| metadata.get("category").cloned())
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let allowed_tools = raw
        .allowed_tools
        .as_deref()
        .map_or_else(Vec::new, |tools| tools.split_whitespace().map(str::to_owned).collect());

    Ok(SkillMetadata {
        name,
        description,
        category,
        license: raw.license,
        compatibility: raw.compatibility,
        metadata,
        allowed_tools,
        path,
        location,
    })
}

/// Reads the `description` field without validating anything else.
///
/// Returns `None` for missing frontmatter, broken YAML or an empty value.
pub fn frontmatter_description(content: &str) -> Option<String> {
    let (frontmatter, _) = split_frontmatter(content).ok()?;
    let value: serde_yaml::Value = serde_yaml::from_str(frontmatter).ok()?;
    let description = value.get("description")?.as_str()?.trim();
    if description.is_empty() {
        None
    } else {
        Some(description.to_string())
    }
}

/// Returns the trimmed markdown body after the frontmatter.
pub fn extract_body(content: &str) -> Result<&str, SkillError> {
    let (_, rest) = split_frontmatter(content)?;
    Ok(rest.trim())
}
