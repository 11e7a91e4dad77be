//! Loads the workflow definition file and resolves rule declarations.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::context::{Entry, NamedList, RuleContext, Value};
use crate::core::namespace::PathNamespace;
use crate::core::registry::FileRegistry;
use crate::core::workflow::{Expr, Item, RefNamespace, RuleDecl, parse_workflow};
use crate::error::ResolveError;

/// All rules declared in a workflow file and the files it includes.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    pub path: PathBuf,
    pub rules: Vec<RuleDecl>,
}

impl Workflow {
    /// First rule declared under `name`.
    pub fn rule(&self, name: &str) -> Option<&RuleDecl> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name.as_str()).collect()
    }
}

/// Read `path` and every file it includes, depth-first in declaration order.
///
/// Include paths are relative to the including file. A file included twice is
/// read once.
pub fn load_workflow(path: &Path) -> Result<Workflow> {
    let mut rules = Vec::new();
    let mut seen = HashSet::new();
    load_into(path, &mut rules, &mut seen)?;
    debug!(path = %path.display(), rules = rules.len(), "workflow loaded");
    Ok(Workflow {
        path: path.to_path_buf(),
        rules,
    })
}

fn load_into(path: &Path, rules: &mut Vec<RuleDecl>, seen: &mut HashSet<PathBuf>) -> Result<()> {
    let key = fs::canonicalize(path).with_context(|| format!("read {}", path.display()))?;
    if !seen.insert(key) {
        warn!(path = %path.display(), "workflow file included more than once, skipping");
        return Ok(());
    }
    let source = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let parsed = parse_workflow(path, &source)?;
    rules.extend(parsed.rules);

    let base = path.parent().unwrap_or(Path::new("."));
    for include in parsed.includes {
        let target = base.join(&include.path);
        debug!(from = %path.display(), include = %target.display(), "following include");
        load_into(&target, rules, seen)
            .with_context(|| format!("include at {}:{}", path.display(), include.line))?;
    }
    Ok(())
}

/// Turn a parsed rule into a [`RuleContext`], resolving `files.X` against the
/// registry and `paths.X` against the namespace. A relative `script` is taken
/// relative to the file the rule was declared in.
pub fn resolve_rule(
    decl: &RuleDecl,
    namespace: &PathNamespace,
    files: &FileRegistry,
) -> Result<RuleContext, ResolveError> {
    let resolver = Resolver {
        decl,
        namespace,
        files,
    };
    let mut context = RuleContext::new(decl.name.clone());
    context.input = resolver.list(&decl.input)?;
    context.output = resolver.list(&decl.output)?;
    context.params = resolver.list(&decl.params)?;
    context.log = resolver.list(&decl.log)?;
    context.script = match &decl.script {
        Some(expr) => resolver.script(expr, &decl.source)?,
        None => None,
    };
    Ok(context)
}

struct Resolver<'a> {
    decl: &'a RuleDecl,
    namespace: &'a PathNamespace,
    files: &'a FileRegistry,
}

impl Resolver<'_> {
    fn list(&self, items: &[Item]) -> Result<NamedList, ResolveError> {
        items
            .iter()
            .map(|item| {
                Ok(Entry {
                    name: item.name.clone(),
                    value: self.value(&item.expr)?,
                })
            })
            .collect()
    }

    fn value(&self, expr: &Expr) -> Result<Value, ResolveError> {
        Ok(match expr {
            Expr::Str(text) => Value::Text(text.clone()),
            Expr::Int(value) => Value::Int(*value),
            Expr::Float(value) => Value::Float(*value),
            Expr::Bool(value) => Value::Bool(*value),
            Expr::Ref { .. } | Expr::Join(_) => Value::Text(display(&self.path(expr)?)),
            Expr::Raw(text) => Value::Raw { expr: text.clone() },
        })
    }

    fn path(&self, expr: &Expr) -> Result<PathBuf, ResolveError> {
        match expr {
            Expr::Str(text) => Ok(PathBuf::from(text)),
            Expr::Ref { namespace, name } => {
                let found = match namespace {
                    RefNamespace::Files => self.files.get(name),
                    RefNamespace::Paths => self.namespace.get(name),
                };
                found
                    .map(Path::to_path_buf)
                    .ok_or_else(|| ResolveError::UnresolvedReference {
                        rule: self.decl.name.clone(),
                        namespace: namespace.as_str(),
                        name: name.clone(),
                    })
            }
            Expr::Join(parts) => {
                let mut joined = PathBuf::new();
                for part in parts {
                    joined.push(self.path(part)?);
                }
                Ok(joined)
            }
            Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Raw(_) => {
                Err(ResolveError::WorkflowSyntax {
                    path: self.decl.source.clone(),
                    line: self.decl.line,
                    message: format!("rule '{}': expression is not a path", self.decl.name),
                })
            }
        }
    }

    fn script(&self, expr: &Expr, source: &Path) -> Result<Option<PathBuf>, ResolveError> {
        if let Expr::Raw(text) = expr {
            warn!(rule = %self.decl.name, expr = %text, "script is not a static path");
            return Ok(None);
        }
        let script = self.path(expr)?;
        if script.is_absolute() {
            return Ok(Some(script));
        }
        let base = source.parent().unwrap_or(Path::new(""));
        Ok(Some(normalize(&base.join(script))))
    }
}

/// Drop `.` and fold `..` lexically, without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
