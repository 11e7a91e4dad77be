//! Typed resolution failures.
//!
//! I/O-heavy functions return `anyhow::Result` like the rest of the crate; the
//! conditions a caller may want to branch on are raised as [`ResolveError`] and
//! can be recovered with `err.downcast_ref::<ResolveError>()`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(
        "project root not found: none of [{}] exists in any parent of {}",
        .markers.join(", "),
        .start.display()
    )]
    RootNotFound {
        start: PathBuf,
        markers: Vec<String>,
    },

    #[error("invalid start path {start:?}: {reason}")]
    InvalidStartPath { start: String, reason: &'static str },

    #[error("start path '{}' does not exist or could not be resolved", .start.display())]
    StartPathUnresolved {
        start: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rule '{rule}' not found in workflow file {}", .workflow.display())]
    RuleNotFound { rule: String, workflow: PathBuf },

    #[error("no rule name given and none could be derived from the caller")]
    RuleNameUnavailable,

    #[error(
        "duplicate folder name '{name}': {} collides with {}",
        .existing.display(),
        .incoming.display()
    )]
    DuplicateName {
        name: String,
        existing: PathBuf,
        incoming: PathBuf,
    },

    #[error("file '{key}' refers to folder '{folder}': {reason}")]
    UnknownFolder {
        key: String,
        folder: String,
        reason: &'static str,
    },

    #[error("file key '{key}' is already registered")]
    DuplicateFile { key: String },

    #[error("rule '{rule}' references unknown {namespace}.{name}")]
    UnresolvedReference {
        rule: String,
        namespace: &'static str,
        name: String,
    },

    #[error("{}:{line}: {message}", .path.display())]
    WorkflowSyntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("rule '{rule}' has no {field} to derive a log location from")]
    MissingScriptLocation { rule: String, field: &'static str },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Find the first [`ResolveError`] in an error chain.
pub fn find_resolve_error(err: &anyhow::Error) -> Option<&ResolveError> {
    err.chain().find_map(|cause| cause.downcast_ref::<ResolveError>())
}
