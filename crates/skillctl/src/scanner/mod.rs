//! Security scanner for skill scripts.
//!
//! Walks each skill's `scripts/` directory and runs the detectors in
//! [`rules`] over every matching source file. Findings are reported per
//! skill, most severe first.

mod lexer;
mod rules;

use crate::catalog::{dir_name, list_skill_dirs};
use sha2::{Digest, Sha256};
use skill_core::config::Config;
use skill_core::scan::{Finding, ScannedFile, SkillScanReport};
use skill_core::skills::frontmatter_description;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Description shown when a skill has no readable SKILL.md description.
pub const UNKNOWN_DESCRIPTION: &str = "unknown";

/// Description length (chars) before truncation.
const DESCRIPTION_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("skills directory not found: {0}")]
    DirectoryNotFound(PathBuf),
}

/// Scanner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Lowercase file extensions without the dot.
    pub extensions: Vec<String>,
    pub long_line_chars: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            extensions: config.scan_extensions.clone(),
            long_line_chars: config.scan_long_line_chars,
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// Run every detector over one source file.
///
/// Findings come back grouped by detector, each group in source order.
pub fn scan_source(source: &str, file: &str, options: &ScanOptions) -> Vec<Finding> {
    let lexed = lexer::lex(source);
    let mut findings = rules::dangerous_calls(&lexed, file);
    findings.extend(rules::network_ops(&lexed, file));
    findings.extend(rules::file_ops(&lexed, file));
    findings.extend(rules::obfuscation(&lexed, file, options.long_line_chars));
    findings.extend(rules::data_exfil(&lexed, file));
    findings
}

/// Scan a single skill directory.
///
/// A skill without `scripts/` yields an empty report. Symlinks under
/// `scripts/` are not followed.
pub fn scan_skill(skill_dir: &Path, options: &ScanOptions) -> SkillScanReport {
    let skill = dir_name(skill_dir);
    let mut report = SkillScanReport {
        description: skill_description(skill_dir),
        skill,
        files: Vec::new(),
        findings: Vec::new(),
    };

    let scripts_dir = skill_dir.join("scripts");
    if !scripts_dir.is_dir() {
        debug!(skill = %report.skill, "no scripts directory");
        return report;
    }

    let mut files = Vec::new();
    collect_files(&scripts_dir, options, &mut files);
    files.sort();

    for path in files {
        let display = relative_display(&report.skill, skill_dir, &path);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read script, skipping");
                continue;
            }
        };
        let Ok(source) = std::str::from_utf8(&bytes) else {
            warn!(path = %path.display(), "script is not valid UTF-8, skipping");
            continue;
        };

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        report.files.push(ScannedFile {
            path: display.clone(),
            sha256: format!("{:x}", hasher.finalize()),
        });
        report.findings.extend(scan_source(source, &display, options));
    }

    // Stable: equal severities keep detector and source order.
    report.findings.sort_by_key(|f| f.severity);

    debug!(
        skill = %report.skill,
        files = report.files.len(),
        findings = report.findings.len(),
        "scanned skill"
    );
    report
}

/// Scan every skill under `skills_dir`.
///
/// Reports are ordered by worst severity, clean skills last, then by name.
pub fn scan_all(skills_dir: &Path, options: &ScanOptions) -> Result<Vec<SkillScanReport>, ScanError> {
    if !skills_dir.is_dir() {
        return Err(ScanError::DirectoryNotFound(skills_dir.to_path_buf()));
    }

    let mut reports: Vec<SkillScanReport> = list_skill_dirs(skills_dir)
        .iter()
        .map(|dir| scan_skill(dir, options))
        .collect();

    reports.sort_by(|a, b| {
        let rank = |r: &SkillScanReport| r.worst_severity().map_or(usize::MAX, |s| s as usize);
        rank(a).cmp(&rank(b)).then_with(|| a.skill.cmp(&b.skill))
    });

    Ok(reports)
}

fn collect_files(dir: &Path, options: &ScanOptions, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to read directory");
            return;
        }
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() {
            debug!(path = %path.display(), "skipping symlink");
        } else if file_type.is_dir() {
            collect_files(&path, options, out);
        } else if file_type.is_file() && options.accepts(&path) {
            out.push(path);
        }
    }
}

/// `skill/scripts/file.py` style path for reports.
fn relative_display(skill: &str, skill_dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(skill_dir).unwrap_or(path);
    let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
    format!("{skill}/{}", parts.join("/"))
}

fn skill_description(skill_dir: &Path) -> String {
    let description = fs::read_to_string(skill_dir.join("SKILL.md"))
        .ok()
        .and_then(|content| frontmatter_description(&content));
    match description {
        Some(desc) if desc.chars().count() > DESCRIPTION_CHARS => {
            let head: String = desc.chars().take(DESCRIPTION_CHARS).collect();
            format!("{head}...")
        }
        Some(desc) => desc,
        None => UNKNOWN_DESCRIPTION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skill_core::scan::{Detector, Severity};
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn scan_source_groups_by_detector() {
        let source = "import requests\nrequests.post(URL, json=secret_key)\neval(x)\n";
        let findings = scan_source(source, "s/scripts/a.py", &ScanOptions::default());
        let detectors: Vec<_> = findings.iter().map(|f| f.detector).collect();

        assert_eq!(
            detectors,
            vec![Detector::DangerousCalls, Detector::NetworkOps, Detector::DataExfil]
        );
    }

    #[test]
    fn scan_skill_walks_scripts_recursively() {
        let tmp = TempDir::new().unwrap();
        let skill = tmp.path().join("fetcher");
        write(
            &skill.join("SKILL.md"),
            "---\nname: fetcher\ndescription: Fetches things.\n---\n",
        );
        write(&skill.join("scripts/main.py"), "vars()\nos.system('ls')\n");
        write(&skill.join("scripts/lib/net.py"), "requests.get(u)\n");
        write(&skill.join("scripts/notes.txt"), "eval(x)\n");
        write(&skill.join("helper.py"), "eval(x)\n");

        let report = scan_skill(&skill, &ScanOptions::default());

        assert_eq!(report.skill, "fetcher");
        assert_eq!(report.description, "Fetches things.");
        let files: Vec<_> = report.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(files, vec!["fetcher/scripts/lib/net.py", "fetcher/scripts/main.py"]);
        assert_eq!(report.files[0].sha256.len(), 64);

        let severities: Vec<_> = report.findings.iter().map(|f| f.severity).collect();
        assert_eq!(severities, vec![Severity::Critical, Severity::Medium, Severity::Low]);
        assert_eq!(report.findings[0].file, "fetcher/scripts/main.py");
        assert_eq!(report.findings[0].line, 2);
    }

    #[test]
    fn scan_skill_without_scripts_or_description() {
        let tmp = TempDir::new().unwrap();
        let skill = tmp.path().join("bare");
        fs::create_dir_all(&skill).unwrap();

        let report = scan_skill(&skill, &ScanOptions::default());

        assert_eq!(report.description, UNKNOWN_DESCRIPTION);
        assert!(report.files.is_empty());
        assert!(report.findings.is_empty());
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let tmp = TempDir::new().unwrap();
        let skill = tmp.path().join("wordy");
        let description = "x".repeat(80);
        write(
            &skill.join("SKILL.md"),
            &format!("---\nname: wordy\ndescription: {description}\n---\n"),
        );

        let report = scan_skill(&skill, &ScanOptions::default());
        assert_eq!(report.description, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn custom_extensions() {
        let tmp = TempDir::new().unwrap();
        let skill = tmp.path().join("mixed");
        write(&skill.join("scripts/run.PY"), "exec(code)\n");
        write(&skill.join("scripts/tool.pyw"), "exec(code)\n");

        let report = scan_skill(&skill, &ScanOptions::default());
        assert_eq!(report.findings.len(), 1);

        let options = ScanOptions {
            extensions: vec!["py".to_string(), "pyw".to_string()],
            ..ScanOptions::default()
        };
        assert_eq!(scan_skill(&skill, &options).findings.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_under_scripts_are_not_followed() {
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new().unwrap();
        let outside = tmp.path().join("outside");
        write(&outside.join("stolen.py"), "exec(payload)\n");

        let skill = tmp.path().join("loopy");
        write(&skill.join("scripts/a.py"), "eval(x)\n");
        symlink(skill.join("scripts"), skill.join("scripts/again")).unwrap();
        symlink(&outside, skill.join("scripts/elsewhere")).unwrap();
        symlink(outside.join("stolen.py"), skill.join("scripts/linked.py")).unwrap();

        let report = scan_skill(&skill, &ScanOptions::default());

        let files: Vec<_> = report.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(files, vec!["loopy/scripts/a.py"]);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].name, "eval");
    }

    #[test]
    fn wrapped_exfiltration_is_high_risk() {
        let tmp = TempDir::new().unwrap();
        let skill = tmp.path().join("sender");
        write(
            &skill.join("scripts/send.py"),
            "requests.post(\n    URL,\n    data=api_token,\n)\nopen(\n    '/home/u/.ssh/id_rsa'\n)\n",
        );

        let report = scan_skill(&skill, &ScanOptions::default());
        let found: Vec<_> = report
            .findings
            .iter()
            .map(|f| (f.name.as_str(), f.severity, f.line))
            .collect();

        assert!(report.has_high_risk());
        assert_eq!(
            found,
            vec![
                ("sensitive_file", Severity::Critical, 5),
                ("http_exfil", Severity::Critical, 1),
                ("requests.post", Severity::Medium, 1),
            ]
        );
    }

    #[test]
    fn scan_all_orders_by_worst_severity_then_name() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("b-clean/scripts/ok.py"), "print('hi')\n");
        write(&tmp.path().join("a-clean/SKILL.md"), "no frontmatter");
        write(&tmp.path().join("medium/scripts/m.py"), "globals()\n");
        write(&tmp.path().join("critical/scripts/c.py"), "pickle.loads(blob)\n");
        write(&tmp.path().join(".hidden/scripts/h.py"), "eval(x)\n");

        let reports = scan_all(tmp.path(), &ScanOptions::default()).unwrap();
        let names: Vec<_> = reports.iter().map(|r| r.skill.as_str()).collect();

        assert_eq!(names, vec!["critical", "medium", "a-clean", "b-clean"]);
    }

    #[test]
    fn scan_all_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            scan_all(&missing, &ScanOptions::default()),
            Err(ScanError::DirectoryNotFound(path)) if path == missing
        ));
    }
}
