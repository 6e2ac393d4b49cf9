use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{Result, TrackerError};

/// Default ceiling for a single git invocation
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Scoped runner for `git` subprocesses.
///
/// Every invocation is bounded by `timeout`. The child is spawned with
/// `kill_on_drop`, so it is terminated whenever the future is dropped:
/// on timeout, on caller cancellation, or on an early return.
#[derive(Debug, Clone)]
pub struct GitCommand {
    binary: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
}

impl GitCommand {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("git"),
            working_dir: working_dir.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a different git executable (mainly for tests)
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run git and return stdout, failing on any non-zero exit
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        self.run_accepting(args, &[0]).await
    }

    /// Run git, treating every exit code in `accepted` as success.
    ///
    /// `git diff --no-index` exits with 1 when the inputs differ.
    pub async fn run_accepting(&self, args: &[&str], accepted: &[i32]) -> Result<String> {
        let command = self.describe(args);
        let start = Instant::now();

        trace!(command = %command, working_dir = %self.working_dir.display(), "Running git");

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_OPTIONAL_LOCKS", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| TrackerError::Spawn {
            command: command.clone(),
            source,
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| TrackerError::io(format!("Waiting for `{}`", command), e))?,
            Err(_) => {
                debug!(command = %command, timeout_ms = self.timeout.as_millis(), "Git command timed out");
                return Err(TrackerError::Timeout {
                    command,
                    timeout: self.timeout,
                });
            }
        };

        let code = output.status.code();
        debug!(
            command = %command,
            exit_code = code.unwrap_or(-1),
            stdout_len = output.stdout.len(),
            duration_ms = start.elapsed().as_millis(),
            "Git command completed"
        );

        match code {
            Some(c) if accepted.contains(&c) => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            _ => Err(TrackerError::CommandFailed {
                command,
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut s = self.binary.display().to_string();
        for arg in args {
            s.push(' ');
            s.push_str(arg);
        }
        s
    }
}
