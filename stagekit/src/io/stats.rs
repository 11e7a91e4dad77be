//! Running do-files through the external statistical runtime.
//!
//! Before each run a `<stem>_locals.do` file is written next to the do-file so
//! the same arguments are available when the do-file is opened by hand:
//! local `1` is the log file, locals `2..` are the positional arguments.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::namespace::LOGS_DIR;
use crate::io::config::StatsConfig;
use crate::io::process::{RuntimeOutput, run_batch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsInvocation {
    pub script: PathBuf,
    pub log_file: PathBuf,
    pub locals_file: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug)]
pub struct StatsRun {
    pub invocation: StatsInvocation,
    pub output: RuntimeOutput,
}

impl StatsInvocation {
    /// `<script dir>/../logs/<log_name or stem>.log` and
    /// `<script dir>/<stem>_locals.do`.
    pub fn new(script: &Path, args: &[String], log_name: Option<&str>) -> Result<Self> {
        let stem = script
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .with_context(|| format!("script has no file name {}", script.display()))?;
        let code_dir = script.parent().unwrap_or(Path::new(""));
        let stage_dir = code_dir.parent().unwrap_or(Path::new(""));
        let log_name = log_name.filter(|name| !name.is_empty()).unwrap_or(stem.as_str());
        Ok(Self {
            script: script.to_path_buf(),
            log_file: stage_dir.join(LOGS_DIR).join(format!("{log_name}.log")),
            locals_file: code_dir.join(format!("{stem}_locals.do")),
            args: args.to_vec(),
        })
    }

    pub fn locals(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "local 1 \"{}\"", self.log_file.display());
        for (idx, arg) in self.args.iter().enumerate() {
            let _ = writeln!(out, "local {} \"{arg}\"", idx + 2);
        }
        out
    }

    pub fn write_locals(&self) -> Result<()> {
        fs::write(&self.locals_file, self.locals())
            .with_context(|| format!("write {}", self.locals_file.display()))
    }

    /// `<command…> <script> <log file> <args…>`
    pub fn command(&self, config: &StatsConfig) -> Result<Command> {
        let (program, leading) = config
            .command
            .split_first()
            .context("stats.command is empty")?;
        let mut cmd = Command::new(program);
        cmd.args(leading)
            .arg(&self.script)
            .arg(&self.log_file)
            .args(&self.args);
        Ok(cmd)
    }
}

/// Write the locals file and run the do-file.
///
/// A failing or timed-out runtime is not an error here; check
/// [`RuntimeOutput::success`].
pub fn run_stats(
    script: &Path,
    args: &[String],
    log_name: Option<&str>,
    config: &StatsConfig,
) -> Result<StatsRun> {
    if !script.is_file() {
        anyhow::bail!("do-file not found: {}", script.display());
    }
    let invocation = StatsInvocation::new(script, args, log_name)?;
    invocation.write_locals()?;
    if let Some(dir) = invocation.log_file.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
    }

    info!(
        script = %invocation.script.display(),
        log = %invocation.log_file.display(),
        args = invocation.args.len(),
        "running statistical runtime"
    );
    let cmd = invocation.command(config)?;
    let output = run_batch(cmd, config).with_context(|| format!("run {}", invocation.script.display()))?;
    if !output.success() {
        warn!(
            exit_code = ?output.status.code(),
            timed_out = output.timed_out,
            "statistical runtime failed"
        );
    }
    Ok(StatsRun { invocation, output })
}
