//! Project root discovery by upward marker search.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ResolveError;

/// Markers used when the caller does not supply any.
pub const DEFAULT_MARKERS: [&str; 6] = [
    ".git",
    "pyproject.toml",
    "setup.py",
    ".project_root",
    "requirements.txt",
    "manage.py",
];

pub fn default_markers() -> Vec<String> {
    DEFAULT_MARKERS.iter().map(|marker| marker.to_string()).collect()
}

/// Walk up from `start` to the nearest directory containing any marker.
///
/// `start` may be a file (the search begins at its parent) or a directory, and
/// must exist. Symlinks are resolved before searching.
pub fn find_project_root(start: &Path, markers: &[String]) -> Result<PathBuf, ResolveError> {
    let raw = start.as_os_str();
    if raw.is_empty() {
        return Err(ResolveError::InvalidStartPath {
            start: String::new(),
            reason: "path is empty",
        });
    }
    if raw.as_encoded_bytes().contains(&0) {
        return Err(ResolveError::InvalidStartPath {
            start: start.to_string_lossy().into_owned(),
            reason: "path contains a NUL byte",
        });
    }
    if markers.is_empty() {
        return Err(ResolveError::InvalidStartPath {
            start: start.to_string_lossy().into_owned(),
            reason: "no root markers given",
        });
    }

    let search = fs::canonicalize(start).map_err(|source| ResolveError::StartPathUnresolved {
        start: start.to_path_buf(),
        source,
    })?;
    let mut current = if search.is_file() {
        search.parent().map(Path::to_path_buf).unwrap_or(search)
    } else {
        search
    };

    loop {
        if let Some(marker) = markers.iter().find(|marker| current.join(marker).exists()) {
            debug!(root = %current.display(), marker = %marker, "project root found");
            return Ok(current);
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => {
                return Err(ResolveError::RootNotFound {
                    start: start.to_path_buf(),
                    markers: markers.to_vec(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn finds_marker_in_ancestor_from_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = fs::canonicalize(temp.path()).expect("canonical");
        fs::write(root.join(".project_root"), "").expect("marker");
        let code = root.join("analysis/estimate_model/code");
        fs::create_dir_all(&code).expect("mkdir");
        let script = code.join("estimate.py");
        fs::write(&script, "").expect("script");

        let found = find_project_root(&script, &default_markers()).expect("root");
        assert_eq!(found, root);
    }

    #[test]
    fn nearest_marker_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outer = fs::canonicalize(temp.path()).expect("canonical");
        let inner = outer.join("nested");
        let deep = inner.join("a/b");
        fs::create_dir_all(&deep).expect("mkdir");
        fs::write(outer.join("pyproject.toml"), "").expect("outer marker");
        fs::write(inner.join("pyproject.toml"), "").expect("inner marker");

        let found = find_project_root(&deep, &markers(&["pyproject.toml"])).expect("root");
        assert_eq!(found, inner);
    }

    #[test]
    fn directory_with_marker_is_its_own_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = fs::canonicalize(temp.path()).expect("canonical");
        fs::create_dir(root.join(".git")).expect("git dir");
        let found = find_project_root(&root, &default_markers()).expect("root");
        assert_eq!(found, root);
    }

    #[test]
    fn missing_marker_reports_root_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let marker = "stagekit-marker-that-does-not-exist.7f3a";
        let err = find_project_root(temp.path(), &markers(&[marker])).unwrap_err();
        match err {
            ResolveError::RootNotFound { markers, .. } => assert_eq!(markers, vec![marker]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_start_path_is_unresolved() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = find_project_root(&temp.path().join("nope"), &default_markers()).unwrap_err();
        assert!(matches!(err, ResolveError::StartPathUnresolved { .. }));
    }

    #[test]
    fn empty_start_path_is_invalid() {
        let err = find_project_root(Path::new(""), &default_markers()).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidStartPath { .. }));
    }
}
