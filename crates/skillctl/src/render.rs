//! Output rendering for the skillctl CLI.
//!
//! Table output for terminals and JSON documents for `--json`.

use crate::catalog::DiscoveryResult;
use serde::Serialize;
use skill_core::lifecycle::RequestLifecycle;
use skill_core::scan::{ScanSummary, Severity, SkillScanReport};
use skill_core::skills::SkillMetadata;
use skill_core::{MatchResult, RequestAnalysis};
use std::path::PathBuf;

/// Skill list as a table.
pub fn format_skill_list(discovery: &DiscoveryResult) -> String {
    let mut out = String::new();
    if discovery.skills.is_empty() {
        out.push_str("No skills found.\n");
    } else {
        out.push_str(&format!(
            "{:<28}  {:<14}  {:<8}  DESCRIPTION\n",
            "NAME", "CATEGORY", "LOCATION"
        ));
        out.push_str(&"-".repeat(100));
        out.push('\n');
        for skill in &discovery.skills {
            out.push_str(&format!(
                "{:<28}  {:<14}  {:<8}  {}\n",
                truncate(&skill.name, 28),
                truncate(skill.category.as_deref().unwrap_or("-"), 14),
                skill.location.as_str(),
                truncate(&skill.description, 44),
            ));
        }
        out.push_str(&format!("\n{} skill(s)\n", discovery.skills.len()));
    }

    if !discovery.shadowed.is_empty() {
        out.push_str("\nShadowed by an earlier skill of the same name:\n");
        for dir in &discovery.shadowed {
            out.push_str(&format!("  {}\n", dir.display()));
        }
    }

    if !discovery.errors.is_empty() {
        out.push_str(&format!("\nSkipped {} invalid skill(s):\n", discovery.errors.len()));
        for err in &discovery.errors {
            out.push_str(&format!("  {}: {} ({})\n", err.name, err.error, err.path.display()));
        }
    }
    out
}

/// One skill's metadata followed by its SKILL.md body.
pub fn format_skill_detail(skill: &SkillMetadata, body: &str) -> String {
    let mut out = format!("{}\n{}\n\n", skill.name, skill.description);
    let mut field = |label: &str, value: &str| {
        out.push_str(&format!("  {label:<14} {value}\n"));
    };
    field("category:", skill.category.as_deref().unwrap_or("-"));
    field("location:", skill.location.as_str());
    field("path:", &skill.path.display().to_string());
    if let Some(license) = &skill.license {
        field("license:", license);
    }
    if let Some(compatibility) = &skill.compatibility {
        field("compatibility:", compatibility);
    }
    if !skill.allowed_tools.is_empty() {
        field("allowed tools:", &skill.allowed_tools.join(" "));
    }

    let body = body.trim();
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
        out.push('\n');
    }
    out
}

/// Match ranking as a table.
pub fn format_match_results(results: &[MatchResult]) -> String {
    if results.is_empty() {
        return "No matching skills.\n".to_string();
    }

    let mut out = format!(
        "{:<4}  {:<28}  {:<6}  {:<6}  KEYWORDS\n",
        "RANK", "SKILL", "SCORE", "INTENT"
    );
    out.push_str(&"-".repeat(80));
    out.push('\n');
    for (idx, result) in results.iter().enumerate() {
        let keywords = if result.matched_keywords.is_empty() {
            "-".to_string()
        } else {
            result.matched_keywords.join(", ")
        };
        out.push_str(&format!(
            "{:<4}  {:<28}  {:<6.2}  {:<6}  {}\n",
            idx + 1,
            truncate(&result.skill_name, 28),
            result.score,
            if result.intent_matched { "yes" } else { "no" },
            keywords,
        ));
    }
    out
}

/// Scan summary followed by one table per skill with findings.
pub fn format_scan(reports: &[SkillScanReport]) -> String {
    let summary = ScanSummary::from_reports(reports);
    let mut out = format!(
        "Scanned {} skill(s), {} finding(s)\n",
        summary.skills, summary.findings
    );
    for severity in Severity::ALL {
        let label = format!("{}:", format_severity(severity));
        out.push_str(&format!("  {label:<9} {}\n", summary.count(severity)));
    }

    for report in reports.iter().filter(|r| !r.findings.is_empty()) {
        out.push_str(&format!("\n{} - {}\n", report.skill, report.description));
        out.push_str(&format!(
            "  {:<9}  {:<16}  {:<24}  {:<36}  DETAILS\n",
            "SEVERITY", "DETECTOR", "NAME", "LOCATION"
        ));
        out.push_str(&format!("  {}\n", "-".repeat(110)));
        for finding in &report.findings {
            let location = format!("{}:{}", finding.file, finding.line);
            out.push_str(&format!(
                "  {:<9}  {:<16}  {:<24}  {:<36}  {}\n",
                format_severity(finding.severity),
                finding.detector.as_str(),
                truncate(&finding.name, 24),
                truncate(&location, 36),
                finding.details,
            ));
        }
    }

    let clean: Vec<&str> = reports
        .iter()
        .filter(|r| r.findings.is_empty())
        .map(|r| r.skill.as_str())
        .collect();
    if !clean.is_empty() {
        out.push_str(&format!("\nNo findings: {}\n", clean.join(", ")));
    }

    if summary.has_high_risk() {
        out.push_str("\nHigh-risk code found. Review the skills above before use.\n");
    }
    out
}

fn format_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "CRITICAL",
        Severity::High => "HIGH",
        Severity::Medium => "MEDIUM",
        Severity::Low => "LOW",
    }
}

/// JSON document for `skillctl list --json`.
#[derive(Debug, Serialize)]
pub struct SkillListJson<'a> {
    pub skills: &'a [SkillMetadata],
    pub errors: Vec<DiscoveryErrorJson>,
    pub shadowed: &'a [PathBuf],
}

#[derive(Debug, Serialize)]
pub struct DiscoveryErrorJson {
    pub name: String,
    pub path: String,
    pub error: String,
}

impl<'a> From<&'a DiscoveryResult> for SkillListJson<'a> {
    fn from(discovery: &'a DiscoveryResult) -> Self {
        Self {
            skills: &discovery.skills,
            errors: discovery
                .errors
                .iter()
                .map(|e| DiscoveryErrorJson {
                    name: e.name.clone(),
                    path: e.path.display().to_string(),
                    error: e.error.to_string(),
                })
                .collect(),
            shadowed: &discovery.shadowed,
        }
    }
}

/// JSON document for `skillctl show --json`.
#[derive(Debug, Serialize)]
pub struct ShowJson<'a> {
    pub skill: &'a SkillMetadata,
    pub body: &'a str,
}

/// JSON document for `skillctl match --json`.
#[derive(Debug, Serialize)]
pub struct MatchJson<'a> {
    pub request: &'a RequestLifecycle,
    pub analysis: &'a RequestAnalysis,
    pub results: &'a [MatchResult],
}

/// JSON document for `skillctl scan --json`.
#[derive(Debug, Serialize)]
pub struct ScanJson<'a> {
    pub summary: ScanSummary,
    pub reports: &'a [SkillScanReport],
}

impl<'a> ScanJson<'a> {
    pub fn new(reports: &'a [SkillScanReport]) -> Self {
        Self {
            summary: ScanSummary::from_reports(reports),
            reports,
        }
    }
}

pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Truncates to `max_chars` characters, ending with `...` when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let head: String = s.chars().take(keep).collect();
    format!("{head}...")
}
