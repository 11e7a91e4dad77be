//! Export of the path namespace as Stata globals.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::core::namespace::PathNamespace;

pub const STATA_PATHS_FILE: &str = "create_paths.do";

/// One `global <key> "<path>"` line per flattened key, sorted by key.
pub fn stata_globals(namespace: &PathNamespace) -> String {
    let mut out = String::new();
    for (key, path) in namespace.entries() {
        let _ = writeln!(out, "global {key} \"{}\"", path.display());
    }
    out
}

/// Write [`stata_globals`] to `<root>/create_paths.do`.
pub fn write_stata_paths(root: &Path, namespace: &PathNamespace) -> Result<PathBuf> {
    let path = root.join(STATA_PATHS_FILE);
    fs::write(&path, stata_globals(namespace))
        .with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), globals = namespace.entries().len(), "stata paths written");
    Ok(path)
}
