//! Configuration parsing for skillctl.
//!
//! Plain `key=value` lines from `.skillctl/config`.
//! Precedence: CLI flags > `--config` file > `.skillctl/config` > defaults.

use crate::matcher::{MatchWeights, DEFAULT_INTENT_WEIGHT, DEFAULT_KEYWORD_WEIGHT, DEFAULT_THRESHOLD};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Workspace-relative location of the config file.
pub const WORKSPACE_CONFIG_PATH: &str = ".skillctl/config";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("line {line_no}: expected key=value, got {line:?}")]
    InvalidLine { line_no: usize, line: String },
    #[error("invalid integer value for {key}: {value}")]
    InvalidInt { key: String, value: String },
    #[error("invalid number value for {key}: {value}")]
    InvalidFloat { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    // Discovery
    /// Directories to scan for skills, highest priority first.
    pub skills_dirs: Vec<PathBuf>,

    // Matching
    pub keyword_weight: f64,
    pub intent_weight: f64,
    pub score_threshold: f64,
    /// Maximum results to show; 0 means no limit.
    pub max_results: usize,

    // Script scanning
    /// File extensions scanned under each skill's `scripts/` directory.
    pub scan_extensions: Vec<String>,
    pub scan_long_line_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            skills_dirs: vec![
                PathBuf::from(".claude/skills"),
                dirs::home_dir()
                    .map_or_else(|| PathBuf::from("~/.claude/skills"), |h| h.join(".claude/skills")),
                PathBuf::from(".agent/skills"),
                dirs::home_dir()
                    .map_or_else(|| PathBuf::from("~/.agent/skills"), |h| h.join(".agent/skills")),
            ],
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            intent_weight: DEFAULT_INTENT_WEIGHT,
            score_threshold: DEFAULT_THRESHOLD,
            max_results: 0,
            scan_extensions: vec!["py".to_string()],
            scan_long_line_chars: 200,
        }
    }
}

impl Config {
    /// Defaults, then `.skillctl/config` under the workspace root when it
    /// exists, then the explicit override file.
    pub fn load_workspace(
        workspace_root: &Path,
        override_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let workspace_config = workspace_root.join(WORKSPACE_CONFIG_PATH);
        for path in [Some(workspace_config.as_path()).filter(|p| p.is_file()), override_path]
            .into_iter()
            .flatten()
        {
            config.load_file(path)?;
        }
        Ok(config)
    }

    /// Overlays values from `path` onto `self`.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        tracing::debug!(path = %path.display(), "loading config");
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    /// Applies `key=value` lines. Blank lines and `#` comments are skipped.
    pub fn parse_content(&mut self, content: &str) -> Result<(), ConfigError> {
        let entries = content
            .lines()
            .enumerate()
            .map(|(idx, raw)| (idx + 1, raw.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        for (line_no, line) in entries {
            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::InvalidLine {
                line_no,
                line: line.to_string(),
            })?;
            self.apply_value(key.trim(), Self::unquote(value.trim()))?;
        }
        Ok(())
    }

    /// Strips one pair of matching single or double quotes.
    fn unquote(value: &str) -> &str {
        ['"', '\'']
            .into_iter()
            .find_map(|q| value.strip_prefix(q)?.strip_suffix(q))
            .unwrap_or(value)
    }

    fn apply_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "skills_dirs" => {
                self.skills_dirs = value.split_whitespace().map(expand_home).collect();
            }
            "keyword_weight" => self.keyword_weight = Self::parse_weight(key, value)?,
            "intent_weight" => self.intent_weight = Self::parse_weight(key, value)?,
            "score_threshold" => self.score_threshold = Self::parse_weight(key, value)?,
            "max_results" => self.max_results = Self::parse_int(key, value)?,
            "scan_extensions" => {
                self.scan_extensions = value
                    .split_whitespace()
                    .map(|ext| ext.trim_start_matches('.').to_lowercase())
                    .filter(|ext| !ext.is_empty())
                    .collect();
            }
            "scan_long_line_chars" => self.scan_long_line_chars = Self::parse_int(key, value)?,
            _ => {
                tracing::warn!(key, "unknown config key, ignoring");
            }
        }
        Ok(())
    }

    fn parse_int(key: &str, value: &str) -> Result<usize, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidInt {
            key: key.into(),
            value: value.into(),
        })
    }

    /// Weights and thresholds must be finite and non-negative.
    fn parse_weight(key: &str, value: &str) -> Result<f64, ConfigError> {
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(ConfigError::InvalidFloat {
                key: key.into(),
                value: value.into(),
            }),
        }
    }

    pub fn match_weights(&self) -> MatchWeights {
        MatchWeights {
            keyword_weight: self.keyword_weight,
            intent_weight: self.intent_weight,
            threshold: self.score_threshold,
        }
    }

    /// First skills directory outside the workspace; the default scan root.
    pub fn global_skills_dir(&self, workspace_root: &Path) -> Option<&Path> {
        self.skills_dirs
            .iter()
            .find(|dir| dir.is_absolute() && !dir.starts_with(workspace_root))
            .map(PathBuf::as_path)
    }
}

/// Expands a leading `~/` to the home directory.
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(raw), |h| h.join(rest)),
        None => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.keyword_weight, 0.6);
        assert_eq!(config.intent_weight, 0.4);
        assert_eq!(config.score_threshold, 0.3);
        assert_eq!(config.max_results, 0);
        assert_eq!(config.scan_extensions, vec!["py"]);
        assert_eq!(config.scan_long_line_chars, 200);
        assert_eq!(config.skills_dirs.len(), 4);
        assert_eq!(config.skills_dirs[0], PathBuf::from(".claude/skills"));
        assert_eq!(config.match_weights(), MatchWeights::default());
    }

    #[test]
    fn parse_matching_config() {
        let mut config = Config::default();
        let content = r#"
# tuned for a small catalog
keyword_weight=0.7
intent_weight="0.3"
score_threshold='0.25'
max_results=5
"#;
        config.parse_content(content).unwrap();
        assert_eq!(config.keyword_weight, 0.7);
        assert_eq!(config.intent_weight, 0.3);
        assert_eq!(config.score_threshold, 0.25);
        assert_eq!(config.max_results, 5);
    }

    #[test]
    fn parse_skills_and_scan_config() {
        let mut config = Config::default();
        let content = r#"
skills_dirs=.skills /opt/skills
scan_extensions=.py SH
scan_long_line_chars=120
"#;
        config.parse_content(content).unwrap();
        assert_eq!(
            config.skills_dirs,
            vec![PathBuf::from(".skills"), PathBuf::from("/opt/skills")]
        );
        assert_eq!(config.scan_extensions, vec!["py", "sh"]);
        assert_eq!(config.scan_long_line_chars, 120);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        assert!(matches!(
            config.parse_content("keyword_weight=heavy"),
            Err(ConfigError::InvalidFloat { .. })
        ));
        assert!(matches!(
            config.parse_content("intent_weight=-0.4"),
            Err(ConfigError::InvalidFloat { .. })
        ));
        assert!(matches!(
            config.parse_content("max_results=many"),
            Err(ConfigError::InvalidInt { .. })
        ));
        assert!(matches!(
            config.parse_content("no equals sign"),
            Err(ConfigError::InvalidLine { line_no: 1, .. })
        ));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut config = Config::default();
        config.parse_content("colour=auto").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn quotes_are_stripped_in_pairs() {
        assert_eq!(Config::unquote("\".claude/skills\""), ".claude/skills");
        assert_eq!(Config::unquote("'0.25'"), "0.25");
        assert_eq!(Config::unquote("bare"), "bare");
        assert_eq!(Config::unquote("\""), "\"");
        assert_eq!(Config::unquote("'mixed\""), "'mixed\"");
    }

    #[test]
    fn invalid_line_reports_line_number() {
        let mut config = Config::default();
        let err = config
            .parse_content("# header\n\nmax_results=2\noops\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLine { line_no: 4, .. }));
        assert_eq!(config.max_results, 2);
    }

    #[test]
    fn load_workspace_layers_override_on_top() {
        let tmp = TempDir::new().unwrap();
        let config_dir = tmp.path().join(".skillctl");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config"), "max_results=3\nscore_threshold=0.5\n").unwrap();

        let override_path = tmp.path().join("override.conf");
        std::fs::write(&override_path, "score_threshold=0.1\n").unwrap();

        let config = Config::load_workspace(tmp.path(), Some(&override_path)).unwrap();
        assert_eq!(config.max_results, 3);
        assert_eq!(config.score_threshold, 0.1);
    }

    #[test]
    fn load_workspace_without_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_workspace(tmp.path(), None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn missing_override_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = Config::load_workspace(tmp.path(), Some(&tmp.path().join("missing")));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn global_skills_dir_skips_workspace_dirs() {
        let mut config = Config::default();
        config.skills_dirs = vec![
            PathBuf::from(".claude/skills"),
            PathBuf::from("/work/.agent/skills"),
            PathBuf::from("/home/u/.claude/skills"),
        ];
        assert_eq!(
            config.global_skills_dir(Path::new("/work")),
            Some(Path::new("/home/u/.claude/skills"))
        );
    }
}
