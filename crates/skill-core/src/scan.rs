//! Security scan results for skill scripts.

use serde::{Deserialize, Serialize};

/// Risk level of a finding. Ordered most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Self; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Critical and high findings fail a scan.
    pub fn is_high_risk(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule family that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    DangerousCalls,
    NetworkOps,
    FileOps,
    Obfuscation,
    DataExfil,
}

impl Detector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DangerousCalls => "dangerous_calls",
            Self::NetworkOps => "network_ops",
            Self::FileOps => "file_ops",
            Self::Obfuscation => "obfuscation",
            Self::DataExfil => "data_exfil",
        }
    }
}

impl std::fmt::Display for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One suspicious pattern in a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub detector: Detector,
    /// Short rule name, e.g. `os.system` or `sensitive_file`.
    pub name: String,
    pub severity: Severity,
    /// Path relative to the skills root, e.g. `my-skill/scripts/run.py`.
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    /// 0-based byte column of the match.
    pub col: usize,
    pub details: String,
}

/// A script that was scanned, with its content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedFile {
    pub path: String,
    pub sha256: String,
}

/// Scan outcome for one skill directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillScanReport {
    pub skill: String,
    pub description: String,
    #[serde(default)]
    pub files: Vec<ScannedFile>,
    /// Sorted most severe first.
    pub findings: Vec<Finding>,
}

impl SkillScanReport {
    pub fn worst_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).min()
    }

    pub fn has_high_risk(&self) -> bool {
        self.findings.iter().any(|f| f.severity.is_high_risk())
    }
}

/// Totals across a set of skill reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub skills: usize,
    pub findings: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ScanSummary {
    pub fn from_reports(reports: &[SkillScanReport]) -> Self {
        let mut summary = Self {
            skills: reports.len(),
            ..Self::default()
        };
        for finding in reports.iter().flat_map(|r| &r.findings) {
            summary.findings += 1;
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    pub fn has_high_risk(&self) -> bool {
        self.critical + self.high > 0
    }
}
