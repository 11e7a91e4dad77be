//! Per-stage log files with bounded retention.
//!
//! Files are named `<name>_<YYYY-MM-DD_HH-MM>.log`; runs within the same
//! minute append to the same file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone};
use tracing::debug;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M";

pub fn log_file_name<Tz: TimeZone>(name: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{name}_{}.log", now.format(TIMESTAMP_FORMAT))
}

/// Open (append) the log file for this run, then prune older files so that at
/// most `retention` remain for `name`.
pub fn open_stage_log<Tz: TimeZone>(
    dir: &Path,
    name: &str,
    now: &DateTime<Tz>,
    retention: usize,
) -> Result<(File, PathBuf)>
where
    Tz::Offset: std::fmt::Display,
{
    fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
    let path = dir.join(log_file_name(name, now));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;
    let removed = prune_logs(dir, name, retention)?;
    debug!(path = %path.display(), removed = removed.len(), "stage log opened");
    Ok((file, path))
}

/// Delete all but the `retention` newest log files of `name` in `dir`.
///
/// Only files matching `<name>_<timestamp>.log` are considered; anything else
/// in the folder is left alone. Returns the removed paths.
pub fn prune_logs(dir: &Path, name: &str, retention: usize) -> Result<Vec<PathBuf>> {
    let mut logs = stage_logs(dir, name)?;
    if logs.len() <= retention {
        return Ok(Vec::new());
    }
    // newest first
    logs.sort_by(|a, b| b.0.cmp(&a.0));
    let mut removed = Vec::new();
    for (_, path) in logs.into_iter().skip(retention) {
        fs::remove_file(&path).with_context(|| format!("remove old log {}", path.display()))?;
        removed.push(path);
    }
    Ok(removed)
}

/// Log files of `name` in `dir`, with their parsed timestamps.
pub fn stage_logs(dir: &Path, name: &str) -> Result<Vec<(NaiveDateTime, PathBuf)>> {
    let prefix = format!("{name}_");
    let mut logs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.context("read entry")?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(stamp) = file_name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".log"))
        else {
            continue;
        };
        if let Ok(at) = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT) {
            logs.push((at, entry.path()));
        }
    }
    Ok(logs)
}
