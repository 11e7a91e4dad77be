//! Rule context: the declared contract of one pipeline stage.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::namespace::LOGS_DIR;
use crate::error::ResolveError;

/// A resolved directive value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Expression kept verbatim because it could not be evaluated statically.
    Raw { expr: String },
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        self.as_str().map(Path::new)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: Value,
}

/// Ordered list of positional and named values, like a directive body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedList {
    entries: Vec<Entry>,
}

impl NamedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: Option<String>, value: Value) {
        self.entries.push(Entry { name, value });
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.push(Some(name.to_string()), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|entry| entry.name.as_deref() == Some(name))
            .map(|entry| &entry.value)
    }

    /// Path-valued entry by name.
    pub fn path(&self, name: &str) -> Option<&Path> {
        self.get(name).and_then(Value::as_path)
    }

    pub fn nth(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|entry| &entry.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Entry> for NamedList {
    fn from_iter<T: IntoIterator<Item = Entry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Declared inputs, outputs, params, logs and script location of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleContext {
    pub rule: String,
    #[serde(default)]
    pub input: NamedList,
    #[serde(default)]
    pub output: NamedList,
    #[serde(default)]
    pub params: NamedList,
    #[serde(default)]
    pub log: NamedList,
    /// Script path, set by the static loader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    /// Directory of the running script, set by the orchestration engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scriptdir: Option<PathBuf>,
}

impl RuleContext {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            input: NamedList::new(),
            output: NamedList::new(),
            params: NamedList::new(),
            log: NamedList::new(),
            script: None,
            scriptdir: None,
        }
    }
}

/// Where a rule context came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextOrigin {
    /// Passed in by the orchestration engine.
    Injected,
    /// Loaded from the workflow definition file.
    StaticLoad,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedContext {
    pub origin: ContextOrigin,
    #[serde(flatten)]
    pub context: RuleContext,
}

/// Folder and file stem for a stage's log files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLocation {
    pub dir: PathBuf,
    pub name: String,
}

impl ResolvedContext {
    /// Derive the log folder from the script location.
    ///
    /// Static loads know the script path (`<stage>/code/x.py` → `<stage>/logs`);
    /// injected contexts only carry the script directory (`<stage>/code` →
    /// `<stage>/logs`).
    pub fn log_location(&self) -> Result<LogLocation, ResolveError> {
        let rule = &self.context.rule;
        let base = match self.origin {
            ContextOrigin::StaticLoad => {
                let script = self.context.script.as_deref().ok_or_else(|| missing(rule, "script"))?;
                script
                    .parent()
                    .and_then(Path::parent)
                    .ok_or_else(|| missing(rule, "script"))?
            }
            ContextOrigin::Injected => {
                let scriptdir = self
                    .context
                    .scriptdir
                    .as_deref()
                    .ok_or_else(|| missing(rule, "scriptdir"))?;
                scriptdir.parent().ok_or_else(|| missing(rule, "scriptdir"))?
            }
        };
        Ok(LogLocation {
            dir: base.join(LOGS_DIR),
            name: rule.clone(),
        })
    }
}

fn missing(rule: &str, field: &'static str) -> ResolveError {
    ResolveError::MissingScriptLocation {
        rule: rule.to_string(),
        field,
    }
}
