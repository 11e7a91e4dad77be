//! Parser for the subset of the Snakefile language that declares rule contracts.
//!
//! Only what a stage needs to know about itself is modelled: `include:`
//! directives and, per `rule`/`checkpoint` block, the `input`, `output`,
//! `params`, `log` and `script` directives. Everything else (Python statements,
//! `shell:`/`run:` bodies, resources) is skipped. Expressions outside the small
//! supported grammar are kept verbatim as [`Expr::Raw`].
//! Anonymous `rule:` blocks are parsed and dropped.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ResolveError;

static RULE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:rule|checkpoint)(?:\s+([A-Za-z_][A-Za-z0-9_]*))?\s*:\s*$")
        .expect("valid regex")
});
static RULE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:rule|checkpoint)\b").expect("valid regex"));
static INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^include\s*:\s*(.+)$").expect("valid regex"));
static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*:(.*)$").expect("valid regex"));
static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Namespace prefix of a reference expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefNamespace {
    Files,
    Paths,
}

impl RefNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            RefNamespace::Files => "files",
            RefNamespace::Paths => "paths",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Ref { namespace: RefNamespace, name: String },
    /// `a / b / ...` path join.
    Join(Vec<Expr>),
    Raw(String),
}

/// One entry of a rule directive, positional when `name` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: Option<String>,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleDecl {
    pub name: String,
    /// File the rule was declared in.
    pub source: PathBuf,
    pub line: usize,
    pub input: Vec<Item>,
    pub output: Vec<Item>,
    pub params: Vec<Item>,
    pub log: Vec<Item>,
    pub script: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub line: usize,
    pub path: String,
}

/// Declarations found in one workflow file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowFile {
    pub rules: Vec<RuleDecl>,
    pub includes: Vec<Include>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Input,
    Output,
    Params,
    Log,
    Script,
    Skipped,
}

impl Section {
    fn from_directive(name: &str) -> Self {
        match name {
            "input" => Section::Input,
            "output" => Section::Output,
            "params" => Section::Params,
            "log" => Section::Log,
            "script" => Section::Script,
            _ => Section::Skipped,
        }
    }
}

struct OpenDirective {
    section: Section,
    lines: Vec<(usize, String)>,
}

struct OpenRule {
    decl: RuleDecl,
    /// `rule:` without a name; parsed so its body is consumed, then dropped.
    anonymous: bool,
    indent: Option<usize>,
    directive: Option<OpenDirective>,
}

/// Parse the contents of one workflow file. `path` is used for error messages
/// and recorded as each rule's source.
pub fn parse_workflow(path: &Path, source: &str) -> Result<WorkflowFile, ResolveError> {
    let mut parsed = WorkflowFile::default();
    let mut current: Option<OpenRule> = None;

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = indentation(raw_line);

        if indent == 0 {
            if let Some(open) = current.take() {
                parsed.rules.extend(finish_rule(path, open)?);
            }
            if RULE_KEYWORD.is_match(trimmed) {
                let header = strip_comment(trimmed).map_err(|msg| syntax(path, line_no, msg))?;
                let Some(caps) = RULE_HEADER.captures(header.trim_end()) else {
                    return Err(syntax(path, line_no, "malformed rule header"));
                };
                let name = caps.get(1).map(|m| m.as_str().to_string());
                current = Some(OpenRule {
                    anonymous: name.is_none(),
                    decl: RuleDecl {
                        name: name.unwrap_or_default(),
                        source: path.to_path_buf(),
                        line: line_no,
                        input: Vec::new(),
                        output: Vec::new(),
                        params: Vec::new(),
                        log: Vec::new(),
                        script: None,
                    },
                    indent: None,
                    directive: None,
                });
            } else if let Some(caps) = INCLUDE.captures(trimmed) {
                let text = strip_comment(&caps[1]).map_err(|msg| syntax(path, line_no, msg))?;
                match parse_expr(text) {
                    Expr::Str(target) => parsed.includes.push(Include {
                        line: line_no,
                        path: target,
                    }),
                    _ => return Err(syntax(path, line_no, "include expects a string literal")),
                }
            }
            continue;
        }

        let Some(open) = current.as_mut() else {
            continue;
        };
        let directive_indent = *open.indent.get_or_insert(indent);
        if indent <= directive_indent {
            if let Some(caps) = DIRECTIVE.captures(trimmed) {
                if let Some(done) = open.directive.take() {
                    apply_directive(path, &mut open.decl, done)?;
                }
                let mut lines = Vec::new();
                let rest = caps[2].trim();
                if !rest.is_empty() {
                    lines.push((line_no, rest.to_string()));
                }
                open.directive = Some(OpenDirective {
                    section: Section::from_directive(&caps[1]),
                    lines,
                });
                continue;
            }
        }
        if let Some(directive) = open.directive.as_mut() {
            directive.lines.push((line_no, trimmed.to_string()));
        }
    }

    if let Some(open) = current.take() {
        parsed.rules.extend(finish_rule(path, open)?);
    }
    Ok(parsed)
}

fn finish_rule(path: &Path, mut open: OpenRule) -> Result<Option<RuleDecl>, ResolveError> {
    if let Some(done) = open.directive.take() {
        apply_directive(path, &mut open.decl, done)?;
    }
    Ok((!open.anonymous).then_some(open.decl))
}

fn apply_directive(
    path: &Path,
    decl: &mut RuleDecl,
    directive: OpenDirective,
) -> Result<(), ResolveError> {
    if directive.section == Section::Skipped {
        return Ok(());
    }
    let mut body = String::new();
    for (line_no, text) in &directive.lines {
        let code = strip_comment(text).map_err(|msg| syntax(path, *line_no, msg))?;
        if !body.is_empty() {
            body.push(' ');
        }
        body.push_str(code.trim());
    }
    let items = parse_items(&body);
    match directive.section {
        Section::Input => decl.input = items,
        Section::Output => decl.output = items,
        Section::Params => decl.params = items,
        Section::Log => decl.log = items,
        Section::Script => decl.script = items.into_iter().next().map(|item| item.expr),
        Section::Skipped => {}
    }
    Ok(())
}

fn syntax(path: &Path, line: usize, message: &str) -> ResolveError {
    ResolveError::WorkflowSyntax {
        path: path.to_path_buf(),
        line,
        message: message.to_string(),
    }
}

fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|ch| ch.is_whitespace())
        .map(|ch| if ch == '\t' { 4 } else { 1 })
        .sum()
}

/// Drop a trailing `#` comment, respecting string literals.
fn strip_comment(line: &str) -> Result<&str, &'static str> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '#' => return Ok(&line[..idx]),
                _ => {}
            },
        }
    }
    if quote.is_some() {
        return Err("unterminated string literal");
    }
    Ok(line)
}

/// Split `text` on `sep` outside quotes and brackets.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_items(body: &str) -> Vec<Item> {
    split_top_level(body, ',')
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_item)
        .collect()
}

fn parse_item(text: &str) -> Item {
    if let Some((name, value)) = split_assignment(text) {
        return Item {
            name: Some(name.to_string()),
            expr: parse_expr(value),
        };
    }
    Item {
        name: None,
        expr: parse_expr(text),
    }
}

/// `name = value` at top level (not `==`, `<=`, `>=`, `!=`).
fn split_assignment(text: &str) -> Option<(&str, &str)> {
    let parts = split_top_level(text, '=');
    if parts.len() != 2 {
        return None;
    }
    let name = parts[0].trim();
    if !IDENT.is_match(name) {
        return None;
    }
    let value = parts[1];
    if value.starts_with('=') || parts[0].ends_with(['!', '<', '>']) {
        return None;
    }
    Some((name, value.trim()))
}

/// Parse one expression of the supported grammar.
pub fn parse_expr(text: &str) -> Expr {
    let text = text.trim();
    if text.contains("//") && !looks_like_single_string(text) {
        return Expr::Raw(text.to_string());
    }
    let parts = split_top_level(text, '/');
    if parts.len() > 1 {
        let atoms: Vec<Expr> = parts.iter().map(|part| parse_atom(part.trim())).collect();
        if atoms
            .iter()
            .all(|atom| matches!(atom, Expr::Str(_) | Expr::Ref { .. }))
        {
            return Expr::Join(atoms);
        }
        return Expr::Raw(text.to_string());
    }
    parse_atom(text)
}

fn looks_like_single_string(text: &str) -> bool {
    parse_string(text).is_some()
}

fn parse_atom(text: &str) -> Expr {
    if let Some(inner) = text.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        return parse_expr(inner);
    }
    if let Some(inner) = text.strip_prefix("str(").and_then(|rest| rest.strip_suffix(')')) {
        return parse_expr(inner);
    }
    if let Some(value) = parse_string(text) {
        return Expr::Str(value);
    }
    match text {
        "True" => return Expr::Bool(true),
        "False" => return Expr::Bool(false),
        _ => {}
    }
    let digits = text.replace('_', "");
    if let Ok(value) = digits.parse::<i64>() {
        return Expr::Int(value);
    }
    if digits.contains(['.', 'e', 'E']) {
        if let Ok(value) = digits.parse::<f64>() {
            return Expr::Float(value);
        }
    }
    if let Some((prefix, name)) = text.split_once('.') {
        let namespace = match prefix {
            "files" => Some(RefNamespace::Files),
            "paths" => Some(RefNamespace::Paths),
            _ => None,
        };
        if let Some(namespace) = namespace {
            if IDENT.is_match(name) {
                return Expr::Ref {
                    namespace,
                    name: name.to_string(),
                };
            }
        }
    }
    Expr::Raw(text.to_string())
}

/// Parse a single quoted literal (optionally `r`-prefixed). Triple quotes and
/// f-strings are not literals in this grammar.
fn parse_string(text: &str) -> Option<String> {
    let (raw, body) = match text.strip_prefix(['r', 'R']) {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let quote = body.chars().next().filter(|ch| *ch == '"' || *ch == '\'')?;
    if body.len() < 2 || !body.ends_with(quote) || body.starts_with(&quote.to_string().repeat(3)) {
        return None;
    }
    let inner = &body[1..body.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == quote {
            // Unescaped closing quote in the middle: two literals, not one.
            return None;
        }
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let next = chars.next()?;
        if raw {
            out.push('\\');
            out.push(next);
            continue;
        }
        match next {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            other => out.push(other),
        }
    }
    Some(out)
}
