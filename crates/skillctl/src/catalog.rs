//! Skill registry backed by the filesystem.
//!
//! Every configured directory holds one subdirectory per skill with a
//! `SKILL.md`. Sources are searched in priority order; the first skill with
//! a given name wins and later copies are reported as shadowed.

use skill_core::config::Config;
use skill_core::skills::{parse_skill_md, SkillError, SkillLocation, SkillMetadata};
use skill_core::SkillRecord;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A skills directory with its resolved location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillSource {
    pub dir: PathBuf,
    pub location: SkillLocation,
}

/// Resolves configured directories against the workspace root.
pub fn skill_sources(config: &Config, workspace_root: &Path) -> Vec<SkillSource> {
    config
        .skills_dirs
        .iter()
        .map(|dir| {
            let dir = if dir.is_relative() {
                workspace_root.join(dir)
            } else {
                dir.clone()
            };
            let location = if dir.starts_with(workspace_root) {
                SkillLocation::Project
            } else {
                SkillLocation::Global
            };
            SkillSource { dir, location }
        })
        .collect()
}

/// Everything found while walking the skill sources.
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    /// Loaded skills in search order, names unique.
    pub skills: Vec<SkillMetadata>,
    pub errors: Vec<DiscoveryError>,
    /// Skill directories hidden by an earlier skill of the same name.
    pub shadowed: Vec<PathBuf>,
}

impl DiscoveryResult {
    /// The matcher's view of the catalog.
    pub fn records(&self) -> Vec<SkillRecord> {
        self.skills.iter().map(SkillMetadata::to_record).collect()
    }

    pub fn find(&self, name: &str) -> Option<&SkillMetadata> {
        self.skills.iter().find(|skill| skill.name == name)
    }
}

/// A skill directory whose SKILL.md could not be loaded.
#[derive(Debug)]
pub struct DiscoveryError {
    /// Directory name of the skill.
    pub name: String,
    pub path: PathBuf,
    pub error: SkillError,
}

/// Walk all configured skill sources.
///
/// Missing directories are skipped. A broken SKILL.md is recorded in
/// `errors` and does not stop discovery.
pub fn discover_skills(config: &Config, workspace_root: &Path) -> DiscoveryResult {
    let mut found = DiscoveryResult::default();
    let mut names = HashSet::new();

    for source in skill_sources(config, workspace_root) {
        for skill_dir in list_skill_dirs(&source.dir) {
            let skill_md = skill_dir.join("SKILL.md");
            if !skill_md.is_file() {
                debug!(dir = %skill_dir.display(), "no SKILL.md, not a skill");
                continue;
            }

            match load_skill(&skill_md, &skill_dir, source.location) {
                Ok(skill) if names.contains(&skill.name) => {
                    debug!(
                        skill = %skill.name,
                        dir = %skill_dir.display(),
                        "skill shadowed by earlier source"
                    );
                    found.shadowed.push(skill_dir);
                }
                Ok(skill) => {
                    names.insert(skill.name.clone());
                    found.skills.push(skill);
                }
                Err(error) => {
                    warn!(path = %skill_md.display(), %error, "skipping invalid skill");
                    found.errors.push(DiscoveryError {
                        name: dir_name(&skill_dir),
                        path: skill_md,
                        error,
                    });
                }
            }
        }
    }

    debug!(
        skills = found.skills.len(),
        errors = found.errors.len(),
        shadowed = found.shadowed.len(),
        "skill discovery finished"
    );
    found
}

fn load_skill(
    skill_md: &Path,
    skill_dir: &Path,
    location: SkillLocation,
) -> Result<SkillMetadata, SkillError> {
    let content = fs::read_to_string(skill_md).map_err(|e| SkillError::Io(e.to_string()))?;
    parse_skill_md(&content, skill_dir.to_path_buf(), location)
}

/// Non-hidden subdirectories of `root`, sorted by path.
///
/// An unreadable or missing root yields no entries.
pub(crate) fn list_skill_dirs(root: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            if root.exists() {
                warn!(dir = %root.display(), error = %e, "cannot read skills directory");
            } else {
                debug!(dir = %root.display(), "skills directory does not exist");
            }
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && !is_hidden(path))
        .collect();
    dirs.sort();
    dirs
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

pub(crate) fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
