//! Flat registry of named project files.
//!
//! Files are declared as [`FileSpec`] entries (normally the `[[files]]` table of
//! `stagekit.toml`) and composed against the [`PathNamespace`]. The registry is
//! append-only: a key is never removed or replaced once registered.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::namespace::{PathNamespace, StageDirs};
use crate::error::ResolveError;

/// One declared project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileSpec {
    /// `<stage output>/<file>`
    Output {
        key: String,
        folder: String,
        file: String,
    },
    /// `<stage code>/<file>`
    Code {
        key: String,
        folder: String,
        file: String,
    },
    /// `<stage code>/<name>.<script extension>`
    Script {
        name: String,
        folder: String,
        #[serde(default)]
        key: Option<String>,
    },
    /// `<name>.md` and `<name>.pdf` next to the folder's output directory.
    Document {
        name: String,
        folder: String,
        #[serde(default)]
        key: Option<String>,
    },
    /// `<name>.tex` and `<name>.pdf` next to the folder's output directory.
    Typeset {
        name: String,
        folder: String,
        #[serde(default)]
        key: Option<String>,
    },
    /// `<namespace path>/<file>` for any registered folder (e.g. `root`, `rules`).
    Folder {
        key: String,
        folder: String,
        file: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FileRegistry {
    entries: BTreeMap<String, PathBuf>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from declared specs, in declaration order.
    pub fn build(
        namespace: &PathNamespace,
        specs: &[FileSpec],
        script_extension: &str,
    ) -> Result<Self, ResolveError> {
        let mut registry = Self::new();
        for spec in specs {
            registry.register(namespace, spec, script_extension)?;
        }
        Ok(registry)
    }

    /// Append one key. Fails if the key already exists.
    pub fn insert(&mut self, key: impl Into<String>, path: PathBuf) -> Result<(), ResolveError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(ResolveError::DuplicateFile { key });
        }
        self.entries.insert(key, path);
        Ok(())
    }

    pub fn register(
        &mut self,
        namespace: &PathNamespace,
        spec: &FileSpec,
        script_extension: &str,
    ) -> Result<(), ResolveError> {
        match spec {
            FileSpec::Output { key, folder, file } => {
                let dirs = stage_for(namespace, key, folder)?;
                self.insert(key.as_str(), dirs.output.join(file))
            }
            FileSpec::Code { key, folder, file } => {
                let dirs = stage_for(namespace, key, folder)?;
                self.insert(key.as_str(), dirs.code.join(file))
            }
            FileSpec::Script { name, folder, key } => {
                let key = key.as_deref().unwrap_or(name);
                let dirs = stage_for(namespace, key, folder)?;
                self.insert(key, dirs.code.join(format!("{name}.{script_extension}")))
            }
            FileSpec::Document { name, folder, key } => {
                self.register_pair(namespace, name, folder, key.as_deref(), ["md", "pdf"])
            }
            FileSpec::Typeset { name, folder, key } => {
                self.register_pair(namespace, name, folder, key.as_deref(), ["tex", "pdf"])
            }
            FileSpec::Folder { key, folder, file } => {
                let base = namespace.get(folder).ok_or_else(|| ResolveError::UnknownFolder {
                    key: key.clone(),
                    folder: folder.clone(),
                    reason: "no such folder in the path namespace",
                })?;
                self.insert(key.as_str(), base.join(file))
            }
        }
    }

    fn register_pair(
        &mut self,
        namespace: &PathNamespace,
        name: &str,
        folder: &str,
        key: Option<&str>,
        extensions: [&str; 2],
    ) -> Result<(), ResolveError> {
        let key = key.unwrap_or(name);
        let folder_path = namespace.get(folder).ok_or_else(|| ResolveError::UnknownFolder {
            key: key.to_string(),
            folder: folder.to_string(),
            reason: "no such folder in the path namespace",
        })?;
        let parent = folder_path.parent().unwrap_or(folder_path);
        for ext in extensions {
            self.insert(format!("{key}_{ext}"), parent.join(format!("{name}.{ext}")))?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.entries.get(key).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(key, path)| (key.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn stage_for<'a>(
    namespace: &'a PathNamespace,
    key: &str,
    folder: &str,
) -> Result<&'a StageDirs, ResolveError> {
    match namespace.folder(folder) {
        Some(found) => found.as_stage().ok_or_else(|| ResolveError::UnknownFolder {
            key: key.to_string(),
            folder: folder.to_string(),
            reason: "folder is not a stage folder",
        }),
        None => Err(ResolveError::UnknownFolder {
            key: key.to_string(),
            folder: folder.to_string(),
            reason: "no such folder in the path namespace",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::namespace::{DuplicatePolicy, Folder};

    fn namespace() -> PathNamespace {
        let mut ns = PathNamespace::new(DuplicatePolicy::Error);
        ns.insert("root", Folder::Plain { path: "/p".into() }).expect("root");
        ns.insert("rules", Folder::Plain { path: "/p/rules".into() }).expect("rules");
        ns.insert("analysis", Folder::Plain { path: "/p/analysis".into() }).expect("theme");
        ns.insert(
            "stata_analysis",
            Folder::Stage(StageDirs::new("/p/analysis/stata_analysis")),
        )
        .expect("stage");
        ns
    }

    #[test]
    fn composes_every_shape() {
        let ns = namespace();
        let specs = vec![
            FileSpec::Folder {
                key: "config".to_string(),
                folder: "root".to_string(),
                file: "config.yaml".to_string(),
            },
            FileSpec::Folder {
                key: "dgp_smk".to_string(),
                folder: "rules".to_string(),
                file: "dgp.smk".to_string(),
            },
            FileSpec::Output {
                key: "stata_results".to_string(),
                folder: "stata_analysis".to_string(),
                file: "stata_results.tex".to_string(),
            },
            FileSpec::Code {
                key: "stata_analysis".to_string(),
                folder: "stata_analysis".to_string(),
                file: "stata_analysis.do".to_string(),
            },
            FileSpec::Script {
                name: "helpers".to_string(),
                folder: "stata_analysis".to_string(),
                key: None,
            },
            FileSpec::Document {
                name: "stata_results_md".to_string(),
                folder: "stata_analysis".to_string(),
                key: None,
            },
            FileSpec::Typeset {
                name: "stata_results_tex".to_string(),
                folder: "stata_analysis".to_string(),
                key: None,
            },
        ];

        let registry = FileRegistry::build(&ns, &specs, "py").expect("build");
        let base = Path::new("/p/analysis/stata_analysis");

        assert_eq!(registry.get("config"), Some(Path::new("/p/config.yaml")));
        assert_eq!(registry.get("dgp_smk"), Some(Path::new("/p/rules/dgp.smk")));
        assert_eq!(
            registry.get("stata_results"),
            Some(base.join("output/stata_results.tex").as_path())
        );
        assert_eq!(
            registry.get("stata_analysis"),
            Some(base.join("code/stata_analysis.do").as_path())
        );
        assert_eq!(
            registry.get("helpers"),
            Some(base.join("code/helpers.py").as_path())
        );
        assert_eq!(
            registry.get("stata_results_md_md"),
            Some(base.join("stata_results_md.md").as_path())
        );
        assert_eq!(
            registry.get("stata_results_md_pdf"),
            Some(base.join("stata_results_md.pdf").as_path())
        );
        assert_eq!(
            registry.get("stata_results_tex_tex"),
            Some(base.join("stata_results_tex.tex").as_path())
        );
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn script_key_override_keeps_file_name() {
        let ns = namespace();
        let spec = FileSpec::Script {
            name: "clean".to_string(),
            folder: "stata_analysis".to_string(),
            key: Some("stata_clean".to_string()),
        };
        let registry = FileRegistry::build(&ns, &[spec], "do").expect("build");
        assert_eq!(
            registry.get("stata_clean"),
            Some(Path::new("/p/analysis/stata_analysis/code/clean.do"))
        );
        assert_eq!(registry.get("clean"), None);
    }

    #[test]
    fn registry_is_append_only() {
        let mut registry = FileRegistry::new();
        registry.insert("estimates", "/a".into()).expect("first");
        let err = registry.insert("estimates", "/b".into()).unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateFile { ref key } if key == "estimates"));
        assert_eq!(registry.get("estimates"), Some(Path::new("/a")));
    }

    #[test]
    fn output_requires_stage_folder() {
        let ns = namespace();
        let spec = FileSpec::Output {
            key: "x".to_string(),
            folder: "analysis".to_string(),
            file: "x.csv".to_string(),
        };
        let err = FileRegistry::build(&ns, &[spec], "py").unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnknownFolder { reason: "folder is not a stage folder", .. }
        ));
    }

    #[test]
    fn missing_folder_is_reported() {
        let ns = namespace();
        let spec = FileSpec::Script {
            name: "simulate".to_string(),
            folder: "simulate_baseline".to_string(),
            key: None,
        };
        let err = FileRegistry::build(&ns, &[spec], "py").unwrap_err();
        assert!(err.to_string().contains("simulate_baseline"));
    }

    #[test]
    fn file_spec_parses_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            files: Vec<FileSpec>,
        }
        let doc: Doc = toml::from_str(
            r#"
            [[files]]
            kind = "output"
            key = "sim_data"
            folder = "simulate_baseline"
            file = "sim_data.csv"

            [[files]]
            kind = "script"
            name = "simulate"
            folder = "simulate_baseline"
            "#,
        )
        .expect("parse");
        assert_eq!(
            doc.files[1],
            FileSpec::Script {
                name: "simulate".to_string(),
                folder: "simulate_baseline".to_string(),
                key: None,
            }
        );
    }
}
