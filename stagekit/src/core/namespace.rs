//! Typed path namespace for a project layout.
//!
//! Folders are stored by name as [`Folder`] values. Stage folders expand into
//! three flattened keys (`<name>`, `<name>_code`, `<name>_logs`); every other
//! folder contributes only `<name>`. Collisions are checked and resolved per
//! flattened key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// Name of the subfolder that marks a stage folder.
pub const CODE_DIR: &str = "code";
pub const OUTPUT_DIR: &str = "output";
pub const LOGS_DIR: &str = "logs";

/// Directories derived from one stage folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDirs {
    pub base: PathBuf,
    pub output: PathBuf,
    pub code: PathBuf,
    pub logs: PathBuf,
}

impl StageDirs {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            output: base.join(OUTPUT_DIR),
            code: base.join(CODE_DIR),
            logs: base.join(LOGS_DIR),
            base,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Folder {
    /// Leaf pipeline step (contains `code/`).
    Stage(StageDirs),
    /// Intermediate folder inside a theme tree.
    Group { path: PathBuf },
    /// Root, theme and utility folders.
    Plain { path: PathBuf },
}

impl Folder {
    /// Path registered under the folder's own name.
    pub fn path(&self) -> &Path {
        match self {
            Folder::Stage(dirs) => &dirs.output,
            Folder::Group { path } | Folder::Plain { path } => path,
        }
    }

    pub fn as_stage(&self) -> Option<&StageDirs> {
        match self {
            Folder::Stage(dirs) => Some(dirs),
            _ => None,
        }
    }

    fn flattened(&self, name: &str) -> Vec<(String, PathBuf)> {
        match self {
            Folder::Stage(dirs) => vec![
                (name.to_string(), dirs.output.clone()),
                (format!("{name}_code"), dirs.code.clone()),
                (format!("{name}_logs"), dirs.logs.clone()),
            ],
            Folder::Group { path } | Folder::Plain { path } => {
                vec![(name.to_string(), path.clone())]
            }
        }
    }
}

/// What to do when two folders produce the same flattened key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with [`ResolveError::DuplicateName`].
    #[default]
    Error,
    /// Later registrations replace earlier ones (registration order is
    /// root, themes in configured order, then utility folders).
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNamespace {
    policy: DuplicatePolicy,
    folders: BTreeMap<String, Folder>,
    keys: BTreeMap<String, PathBuf>,
}

impl PathNamespace {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            folders: BTreeMap::new(),
            keys: BTreeMap::new(),
        }
    }

    /// Register `folder` under `name`, applying the duplicate policy.
    ///
    /// Under [`DuplicatePolicy::Override`] only the clashing flattened keys are
    /// replaced; keys of the earlier folder that do not clash stay resolvable.
    pub fn insert(&mut self, name: &str, folder: Folder) -> Result<(), ResolveError> {
        let incoming = folder.flattened(name);
        if self.policy == DuplicatePolicy::Error {
            if let Some((key, path)) = incoming.iter().find(|(key, _)| self.keys.contains_key(key)) {
                return Err(ResolveError::DuplicateName {
                    name: key.clone(),
                    existing: self.keys[key].clone(),
                    incoming: path.clone(),
                });
            }
        }
        self.keys.extend(incoming);
        self.folders.insert(name.to_string(), folder);
        Ok(())
    }

    /// Folder registered under its own name.
    pub fn folder(&self, name: &str) -> Option<&Folder> {
        self.folders.get(name)
    }

    pub fn stage(&self, name: &str) -> Option<&StageDirs> {
        self.folder(name).and_then(Folder::as_stage)
    }

    /// Resolve a flattened key (`X`, `X_code`, `X_logs`).
    pub fn get(&self, key: &str) -> Option<&Path> {
        self.keys.get(key).map(PathBuf::as_path)
    }

    /// All flattened keys, sorted by key.
    pub fn entries(&self) -> Vec<(String, PathBuf)> {
        self.keys
            .iter()
            .map(|(key, path)| (key.clone(), path.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Classify a folder from the names of its direct subfolders.
pub fn is_stage<S: AsRef<str>>(subfolder_names: &[S]) -> bool {
    subfolder_names.iter().any(|name| name.as_ref() == CODE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_expands_into_three_keys() {
        let mut ns = PathNamespace::new(DuplicatePolicy::Error);
        ns.insert("estimate_model", Folder::Stage(StageDirs::new("/p/analysis/estimate_model")))
            .expect("insert");

        assert_eq!(
            ns.get("estimate_model"),
            Some(Path::new("/p/analysis/estimate_model/output"))
        );
        assert_eq!(
            ns.get("estimate_model_code"),
            Some(Path::new("/p/analysis/estimate_model/code"))
        );
        assert_eq!(
            ns.get("estimate_model_logs"),
            Some(Path::new("/p/analysis/estimate_model/logs"))
        );
        assert_eq!(ns.get("estimate_model_other"), None);
        assert_eq!(ns.entries().len(), 3);
    }

    #[test]
    fn group_registers_only_itself() {
        let mut ns = PathNamespace::new(DuplicatePolicy::Error);
        ns.insert("robustness", Folder::Group { path: "/p/analysis/robustness".into() })
            .expect("insert");
        assert_eq!(ns.get("robustness"), Some(Path::new("/p/analysis/robustness")));
        assert_eq!(ns.get("robustness_code"), None);
    }

    #[test]
    fn duplicate_name_fails_by_default() {
        let mut ns = PathNamespace::new(DuplicatePolicy::Error);
        ns.insert("shared", Folder::Stage(StageDirs::new("/p/dgp/shared")))
            .expect("first insert");
        let err = ns
            .insert("shared", Folder::Stage(StageDirs::new("/p/analysis/shared")))
            .unwrap_err();
        match err {
            ResolveError::DuplicateName { name, existing, incoming } => {
                assert_eq!(name, "shared");
                assert_eq!(existing, PathBuf::from("/p/dgp/shared/output"));
                assert_eq!(incoming, PathBuf::from("/p/analysis/shared/output"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn derived_key_collision_is_detected() {
        let mut ns = PathNamespace::new(DuplicatePolicy::Error);
        ns.insert("a", Folder::Stage(StageDirs::new("/p/dgp/a"))).expect("insert");
        let err = ns
            .insert("a_code", Folder::Plain { path: "/p/utils/a_code".into() })
            .unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateName { ref name, .. } if name == "a_code"));
    }

    #[test]
    fn override_policy_keeps_last_registration() {
        let mut ns = PathNamespace::new(DuplicatePolicy::Override);
        ns.insert("shared", Folder::Stage(StageDirs::new("/p/dgp/shared")))
            .expect("first insert");
        ns.insert("shared", Folder::Plain { path: "/p/utils/shared".into() })
            .expect("override");
        assert_eq!(ns.get("shared"), Some(Path::new("/p/utils/shared")));
        assert_eq!(ns.get("shared_code"), Some(Path::new("/p/dgp/shared/code")));
        assert_eq!(ns.stage("shared"), None);
    }

    #[test]
    fn override_replaces_only_clashing_keys() {
        let mut ns = PathNamespace::new(DuplicatePolicy::Override);
        ns.insert("a", Folder::Stage(StageDirs::new("/p/dgp/a"))).expect("stage");
        ns.insert("a_code", Folder::Plain { path: "/p/utils/a_code".into() })
            .expect("override");

        assert_eq!(ns.get("a"), Some(Path::new("/p/dgp/a/output")));
        assert_eq!(ns.get("a_logs"), Some(Path::new("/p/dgp/a/logs")));
        assert_eq!(ns.get("a_code"), Some(Path::new("/p/utils/a_code")));
        assert_eq!(ns.stage("a").map(|dirs| dirs.base.as_path()), Some(Path::new("/p/dgp/a")));
        assert_eq!(ns.entries().len(), 3);
    }

    #[test]
    fn classifies_by_code_subfolder() {
        assert!(is_stage(&["output", "code", "logs"]));
        assert!(!is_stage(&["estimate_model", "make_tables"]));
        assert!(!is_stage::<&str>(&[]));
    }
}
