//! Rule context resolution for a running stage.
//!
//! A context passed in by the orchestration engine always wins and is returned
//! untouched. Otherwise the rule is looked up in the workflow definition file
//! and its declarations are resolved against the [`Project`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::context::{ContextOrigin, ResolvedContext, RuleContext};
use crate::error::ResolveError;
use crate::io::snakefile::{load_workflow, resolve_rule};
use crate::project::Project;

/// What the stage knows about itself when no context was injected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleRequest {
    /// Explicit rule name.
    pub rule: Option<String>,
    /// Path of the calling script; its file stem is the fallback rule name.
    pub caller: Option<PathBuf>,
}

impl RuleRequest {
    pub fn named(rule: impl Into<String>) -> Self {
        Self {
            rule: Some(rule.into()),
            caller: None,
        }
    }

    pub fn from_caller(caller: impl Into<PathBuf>) -> Self {
        Self {
            rule: None,
            caller: Some(caller.into()),
        }
    }

    /// Explicit name, else the caller's file stem, else the stem of the
    /// current executable. The last fallback is only meaningful when each
    /// stage is its own binary.
    pub fn rule_name(&self) -> Result<String, ResolveError> {
        if let Some(rule) = self.rule.as_deref().filter(|rule| !rule.is_empty()) {
            return Ok(rule.to_string());
        }
        if let Some(stem) = self.caller.as_deref().and_then(file_stem) {
            return Ok(stem);
        }
        std::env::current_exe()
            .ok()
            .as_deref()
            .and_then(file_stem)
            .ok_or(ResolveError::RuleNameUnavailable)
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

/// Resolve the rule context for the current stage.
pub fn resolve_rule_context(
    injected: Option<RuleContext>,
    request: &RuleRequest,
    project: &Project,
) -> Result<ResolvedContext> {
    if let Some(context) = injected {
        debug!(rule = %context.rule, "using injected rule context");
        return Ok(ResolvedContext {
            origin: ContextOrigin::Injected,
            context,
        });
    }

    let name = request.rule_name()?;
    let context = load_rule_context(&name, project)?;
    info!(rule = %name, "rule context loaded from workflow file");
    Ok(ResolvedContext {
        origin: ContextOrigin::StaticLoad,
        context,
    })
}

/// Load and resolve rule `name` from the project's workflow file.
pub fn load_rule_context(name: &str, project: &Project) -> Result<RuleContext> {
    let workflow_path = project.workflow_path();
    let workflow = load_workflow(&workflow_path)?;
    let decl = workflow
        .rule(name)
        .ok_or_else(|| ResolveError::RuleNotFound {
            rule: name.to_string(),
            workflow: workflow_path.clone(),
        })?;
    let context = resolve_rule(decl, &project.namespace, &project.files).with_context(|| {
        format!(
            "resolve rule '{name}' declared at {}:{}",
            decl.source.display(),
            decl.line
        )
    })?;
    Ok(context)
}

/// Rule names declared in the project's workflow file, in declaration order.
pub fn list_rules(project: &Project) -> Result<Vec<String>> {
    let workflow = load_workflow(&project.workflow_path())?;
    Ok(workflow
        .rule_names()
        .into_iter()
        .map(str::to_string)
        .collect())
}
