//! Project configuration stored in `<root>/stagekit.toml`.

use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::core::namespace::DuplicatePolicy;
use crate::core::registry::FileSpec;
use crate::error::ResolveError;

pub const CONFIG_FILE: &str = "stagekit.toml";

/// Project configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults of
/// the conventional research layout.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Top-level folders walked recursively for stage folders.
    pub theme_dirs: Vec<String>,

    /// Top-level folders whose direct subfolders are registered by name.
    pub utility_dirs: Vec<String>,

    /// Workflow definition file, relative to the project root.
    pub workflow_file: String,

    /// Extension appended to `script` file specs.
    pub script_extension: String,

    pub duplicate_names: DuplicatePolicy,

    pub log: LogConfig,

    pub stats: StatsConfig,

    /// Declared project files, registered in order.
    pub files: Vec<FileSpec>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Attach a per-stage log file when a stage starts.
    pub enabled: bool,
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Number of log files kept per stage.
    pub retention: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatsConfig {
    /// Runtime command; the script, log file and arguments are appended.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            retention: 3,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            command: vec!["stata-mp".to_string(), "-b".to_string(), "do".to_string()],
            timeout_secs: 60 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            theme_dirs: vec!["analysis".to_string(), "dgp".to_string()],
            utility_dirs: vec!["rules".to_string(), "utils".to_string()],
            workflow_file: "Snakefile".to_string(),
            script_extension: "py".to_string(),
            duplicate_names: DuplicatePolicy::Error,
            log: LogConfig::default(),
            stats: StatsConfig::default(),
            files: Vec::new(),
        }
    }
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<(), ResolveError> {
        for dir in self.theme_dirs.iter().chain(&self.utility_dirs) {
            if !is_single_component(dir) {
                return Err(invalid(format!(
                    "'{dir}' must be a single folder name below the project root"
                )));
            }
        }
        if self.workflow_file.trim().is_empty() {
            return Err(invalid("workflow_file must not be empty"));
        }
        if self.script_extension.trim().is_empty() || self.script_extension.starts_with('.') {
            return Err(invalid("script_extension must be non-empty and without a leading '.'"));
        }
        if self.log.retention == 0 {
            return Err(invalid("log.retention must be > 0"));
        }
        if self.stats.command.is_empty() || self.stats.command[0].trim().is_empty() {
            return Err(invalid("stats.command must be a non-empty array"));
        }
        if self.stats.timeout_secs == 0 {
            return Err(invalid("stats.timeout_secs must be > 0"));
        }
        if self.stats.output_limit_bytes == 0 {
            return Err(invalid("stats.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ResolveError {
    ResolveError::InvalidConfig(message.into())
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ProjectConfig::default()`.
pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        let cfg = ProjectConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ProjectConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    debug!(path = %path.display(), files = cfg.files.len(), "config loaded");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ProjectConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "duplicate_names = \"override\"\n[log]\nretention = 5\n")
            .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.duplicate_names, DuplicatePolicy::Override);
        assert_eq!(cfg.log.retention, 5);
        assert_eq!(cfg.log.level, "info");
        assert_eq!(cfg.workflow_file, "Snakefile");
    }

    #[test]
    fn rejects_nested_theme_dir() {
        let cfg = ProjectConfig {
            theme_dirs: vec!["analysis/sub".to_string()],
            ..ProjectConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("single folder name"));
    }

    #[test]
    fn rejects_zero_retention() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "[log]\nretention = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("log.retention"));
    }
}
