//! The resolved project: root, config, path namespace and file registry.
//!
//! A [`Project`] is built once at process start and passed by reference to
//! everything that needs paths. Nothing is cached globally.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::namespace::PathNamespace;
use crate::core::registry::FileRegistry;
use crate::io::config::{CONFIG_FILE, ProjectConfig, load_config};
use crate::io::layout::build_namespace;
use crate::io::root::{default_markers, find_project_root};

#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub namespace: PathNamespace,
    pub files: FileRegistry,
}

impl Project {
    /// Find the root above `start` and open it. `markers` defaults to
    /// [`crate::io::root::DEFAULT_MARKERS`].
    pub fn discover(start: &Path, markers: Option<&[String]>) -> Result<Self> {
        let markers = match markers {
            Some(markers) => markers.to_vec(),
            None => default_markers(),
        };
        let root = find_project_root(start, &markers)?;
        Self::open(&root)
    }

    /// Open the project rooted at `root` (no marker check).
    pub fn open(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("resolve project root {}", root.display()))?;
        let config = load_config(&root.join(CONFIG_FILE))?;
        Self::with_config(root, config)
    }

    /// Build the namespace and registry for an already-loaded config.
    pub fn with_config(root: PathBuf, config: ProjectConfig) -> Result<Self> {
        let namespace = build_namespace(&root, &config)
            .with_context(|| format!("build path namespace for {}", root.display()))?;
        let files = FileRegistry::build(&namespace, &config.files, &config.script_extension)
            .with_context(|| format!("build file registry from {CONFIG_FILE}"))?;
        debug!(folders = namespace.len(), files = files.len(), "project resolved");
        info!(root = %root.display(), "project opened");
        Ok(Self {
            root,
            config,
            namespace,
            files,
        })
    }

    pub fn workflow_path(&self) -> PathBuf {
        self.root.join(&self.config.workflow_file)
    }

    /// Path for a flattened namespace key.
    pub fn path(&self, key: &str) -> Option<&Path> {
        self.namespace.get(key)
    }

    /// Path for a registered file key.
    pub fn file(&self, key: &str) -> Option<&Path> {
        self.files.get(key)
    }
}
