//! Generic external command execution with timeout and guaranteed kill.
//!
//! Content checkers (`bash -n`, `systemd-analyze verify`, ...), service
//! restarts, and service state queries all go through this trait so the
//! pipeline can be tested with canned results instead of real processes.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

/// Default timeout for checker and service-manager commands.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(30);

/// Restarting a unit can legitimately take longer than a syntax check.
pub const RESTART_TIMEOUT: Duration = Duration::from_secs(60);

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a command with the default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;

    /// Run a command with a custom timeout (overrides default).
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds
    /// `timeout`. On timeout, the child process must be killed (not left
    /// orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

/// Production `CommandRunner` — tokio process execution with timeout and
/// kill on all platforms.
///
/// `tokio::time::timeout` around `.output().await` does not kill the child
/// when the timeout fires — the future is dropped but the OS process keeps
/// running. `tokio::select!` with explicit `child.kill()` guarantees
/// termination.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        // Read stdout/stderr CONCURRENTLY with wait() to avoid pipe deadlock:
        // a child writing more than the OS pipe buffer blocks on write, and
        // a bare child.wait() would then never resolve.
        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stdout_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stderr_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                );
                Ok(Output {
                    status: status.with_context(|| format!("waiting for {program}"))?,
                    stdout,
                    stderr,
                })
            } => result,
            () = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = TokioCommandRunner::default();
        let out = runner.run("echo", &["hello"]).await.expect("echo runs");
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_reports_nonzero_exit() {
        let runner = TokioCommandRunner::default();
        let out = runner.run("false", &[]).await.expect("false spawns");
        assert!(!out.status.success());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = TokioCommandRunner::default();
        let result = runner.run("confgate-no-such-binary", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let runner = TokioCommandRunner::new(Duration::from_millis(100));
        let result = runner.run("sleep", &["5"]).await;
        let err = result.expect_err("sleep must time out");
        assert!(err.to_string().contains("timed out"));
    }
}
