//! Process-wide tracing setup.
//!
//! Two outputs share one subscriber:
//!
//! - **stderr**: always on, compact format.
//! - **stage log file**: plain-text copy of the same events, written to the
//!   file attached by [`attach_stage_file`]. Nothing is written while no file
//!   is attached.
//!
//! A tracing subscriber can only be installed once per process, so switching
//! stages swaps the attached file instead of rebuilding the subscriber.

use std::fs::File;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, OnceLock};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static STAGE_FILE: Mutex<Option<File>> = Mutex::new(None);
static INSTALLED: OnceLock<()> = OnceLock::new();

/// Install the subscriber if it is not installed yet.
///
/// Reads `RUST_LOG`; falls back to `default_level` when unset or invalid.
/// Later calls are no-ops, as is a call after another subscriber was set.
///
/// # Example
/// ```bash
/// RUST_LOG=stagekit=debug stagekit context estimate
/// ```
pub fn init(default_level: &str) {
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .with(
                fmt::layer()
                    .with_writer(|| StageFileWriter)
                    .with_ansi(false)
                    .with_target(false),
            )
            .try_init();
    });
}

/// Replace the stage log file, returning the previous one.
pub fn attach_stage_file(file: Option<File>) -> Option<File> {
    std::mem::replace(&mut *lock_stage_file(), file)
}

fn lock_stage_file() -> MutexGuard<'static, Option<File>> {
    // A panic while writing a log line leaves the file usable.
    STAGE_FILE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct StageFileWriter;

impl Write for StageFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match lock_stage_file().as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock_stage_file().as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
