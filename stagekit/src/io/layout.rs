//! Walks the project layout into a [`PathNamespace`].

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::namespace::{Folder, OUTPUT_DIR, PathNamespace, StageDirs, is_stage};
use crate::io::config::ProjectConfig;

pub const ROOT_KEY: &str = "root";

/// Build the path namespace for `root`.
///
/// Registration order is root, each theme folder (breadth-first, siblings in
/// name order), then each utility folder and its direct subfolders. The order
/// only matters under `duplicate_names = "override"`.
pub fn build_namespace(root: &Path, config: &ProjectConfig) -> Result<PathNamespace> {
    let mut namespace = PathNamespace::new(config.duplicate_names);
    namespace.insert(
        ROOT_KEY,
        Folder::Plain {
            path: root.to_path_buf(),
        },
    )?;

    for theme in &config.theme_dirs {
        let theme_dir = root.join(theme);
        namespace.insert(theme, Folder::Plain { path: theme_dir.clone() })?;

        let mut queue: VecDeque<PathBuf> = list_dirs(&theme_dir)
            .with_context(|| format!("walk theme folder {theme}"))?
            .into();
        while let Some(folder) = queue.pop_front() {
            let name = dir_name(&folder)?;
            let children = list_dirs(&folder)?;
            let child_names: Vec<String> = children
                .iter()
                .filter_map(|child| child.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect();
            if is_stage(&child_names) {
                debug!(stage = %name, path = %folder.display(), "stage folder");
                namespace.insert(&name, Folder::Stage(StageDirs::new(folder)))?;
            } else {
                debug!(group = %name, path = %folder.display(), "grouping folder");
                namespace.insert(&name, Folder::Group { path: folder })?;
                queue.extend(children);
            }
        }
    }

    for utility in &config.utility_dirs {
        let utility_dir = root.join(utility);
        namespace.insert(utility, Folder::Plain { path: utility_dir.clone() })?;
        for folder in
            list_dirs(&utility_dir).with_context(|| format!("walk utility folder {utility}"))?
        {
            let name = dir_name(&folder)?;
            namespace.insert(&name, Folder::Plain { path: folder })?;
        }
    }

    debug!(folders = namespace.len(), "path namespace built");
    Ok(namespace)
}

/// Regular files in `<folder>/output`, as forward-slash strings in name order.
pub fn output_files(folder: &Path) -> Result<Vec<String>> {
    let output = folder.join(OUTPUT_DIR);
    let mut files = Vec::new();
    for entry in fs::read_dir(&output).with_context(|| format!("read {}", output.display()))? {
        let entry = entry.context("read entry")?;
        let path = entry.path();
        if path.is_file() {
            files.push(path.to_string_lossy().replace('\\', "/"));
        }
    }
    files.sort();
    Ok(files)
}

/// Direct subdirectories of `dir`, sorted by path.
fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.context("read entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("folder without a name {}", path.display()))
}
