//! Batch execution of the statistical runtime.
//!
//! The runtime never reads from stdin. Its stdout and stderr are collected on
//! their own threads while the main thread waits on the configured timeout;
//! a runtime still alive at the deadline is killed and reported as timed out.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::io::config::StatsConfig;

/// One output stream of the runtime, cut at `output_limit_bytes`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    /// Bytes read past the limit and discarded.
    pub dropped: u64,
}

impl Captured {
    pub fn lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[derive(Debug)]
pub struct RuntimeOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub timed_out: bool,
}

impl RuntimeOutput {
    /// Exited with status 0 before the timeout.
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }
}

/// Run a prepared runtime command under the limits in `config`.
///
/// Spawn and wait failures are errors; a non-zero exit or a timeout is not.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = config.timeout_secs))]
pub fn run_batch(mut cmd: Command, config: &StatsConfig) -> Result<RuntimeOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .with_context(|| format!("start runtime {}", cmd.get_program().to_string_lossy()))?;

    let limit = config.output_limit_bytes as u64;
    let stdout = collect(child.stdout.take(), limit);
    let stderr = collect(child.stderr.take(), limit);

    let (status, timed_out) = wait_or_kill(&mut child, Duration::from_secs(config.timeout_secs))?;
    let stdout = finish(stdout).context("collect runtime stdout")?;
    let stderr = finish(stderr).context("collect runtime stderr")?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "runtime output over limit"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "runtime exited");
    Ok(RuntimeOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for runtime")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = timeout.as_secs(), "runtime timed out, killing");
    child.kill().context("kill runtime")?;
    let status = child.wait().context("reap killed runtime")?;
    Ok((status, true))
}

type Collector = Option<JoinHandle<io::Result<Captured>>>;

fn collect<R: Read + Send + 'static>(stream: Option<R>, limit: u64) -> Collector {
    stream.map(|mut stream| {
        thread::spawn(move || {
            let mut captured = Captured::default();
            (&mut stream).take(limit).read_to_end(&mut captured.bytes)?;
            captured.dropped = io::copy(&mut stream, &mut io::sink())?;
            Ok(captured)
        })
    })
}

fn finish(collector: Collector) -> Result<Captured> {
    let Some(handle) = collector else {
        return Ok(Captured::default());
    };
    handle
        .join()
        .map_err(|_| anyhow!("output collector panicked"))?
        .map_err(Into::into)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    fn limits(timeout_secs: u64, output_limit_bytes: usize) -> StatsConfig {
        StatsConfig {
            timeout_secs,
            output_limit_bytes,
            ..StatsConfig::default()
        }
    }

    #[test]
    fn collects_both_streams() {
        let output = run_batch(sh("echo out; echo err >&2"), &limits(10, 1024)).expect("run");
        assert!(output.success());
        assert_eq!(output.stdout.lossy(), "out\n");
        assert_eq!(output.stderr.lossy(), "err\n");
    }

    #[test]
    fn output_over_limit_is_counted() {
        let output = run_batch(sh("printf 0123456789"), &limits(10, 4)).expect("run");
        assert_eq!(
            output.stdout,
            Captured {
                bytes: b"0123".to_vec(),
                dropped: 6,
            }
        );
    }

    #[test]
    fn runtime_past_deadline_is_killed() {
        let output = run_batch(sh("exec sleep 5"), &limits(0, 1024)).expect("run");
        assert!(output.timed_out);
        assert!(!output.success());
    }

    #[test]
    fn nonzero_exit_is_not_success() {
        let output = run_batch(sh("exit 3"), &limits(10, 1024)).expect("run");
        assert_eq!(output.status.code(), Some(3));
        assert!(!output.success());
    }

    #[test]
    fn missing_runtime_fails_to_start() {
        let cmd = Command::new("stagekit-no-such-runtime-4e1b");
        let err = run_batch(cmd, &limits(1, 16)).unwrap_err();
        assert!(format!("{err:#}").contains("start runtime stagekit-no-such-runtime-4e1b"));
    }
}
