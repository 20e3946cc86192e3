//! Process runner for external commands.
//!
//! Every git invocation goes through [`CommandRunner`] with an explicit working
//! directory and a bounded timeout. The real implementation spawns the process
//! with tokio; tests substitute a scripted runner.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Timeout applied to every git operation
pub const GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised when a command could not run to completion
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("`{command}` timed out after {} seconds", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("executable '{0}' is not installed or not in PATH")]
    ExecutableMissing(String),

    #[error("empty command")]
    EmptyCommand,

    #[error("failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of one external invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// True when the process exited with status 0
    pub success: bool,
    /// Exit code, absent when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    /// A successful result with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result (exit code 1) with the given stderr
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(1),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Standard output followed by standard error
    pub fn output(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len());
        combined.push_str(&self.stdout);
        combined.push_str(&self.stderr);
        combined
    }
}

/// Trait abstracting process execution for testability
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` (program followed by its arguments) inside `cwd`.
    ///
    /// The argument vector is passed to the process as-is; no shell is involved.
    async fn run(
        &self,
        command: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandResult, RunnerError>;
}

/// Real implementation spawning system processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    /// If true, log commands without executing
    dry_run: bool,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self { dry_run: false }
    }

    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    #[instrument(skip_all, fields(cwd = %cwd.display(), command = %command.join(" ")))]
    async fn run(
        &self,
        command: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandResult, RunnerError> {
        let (program, args) = command.split_first().ok_or(RunnerError::EmptyCommand)?;
        let rendered = command.join(" ");

        if self.dry_run {
            info!("[DRY RUN] {}", rendered);
            return Ok(CommandResult::ok(""));
        }

        // A missing cwd also surfaces as NotFound from spawn; keep it apart
        // from a missing executable.
        if !cwd.is_dir() {
            return Err(RunnerError::Io {
                command: rendered,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("working directory {} does not exist", cwd.display()),
                ),
            });
        }

        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RunnerError::ExecutableMissing(program.clone())
                } else {
                    RunnerError::Io {
                        command: rendered.clone(),
                        source: e,
                    }
                }
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RunnerError::Io {
                    command: rendered,
                    source: e,
                })
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Command timed out, killed");
                return Err(RunnerError::Timeout {
                    command: rendered,
                    timeout,
                });
            }
        };

        let result = CommandResult {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(success = result.success, exit_code = ?result.exit_code, "Command finished");

        Ok(result)
    }
}

/// Check that `program` resolves to an executable on PATH
pub fn ensure_executable(program: &str) -> Result<(), RunnerError> {
    which::which(program)
        .map(|_| ())
        .map_err(|_| RunnerError::ExecutableMissing(program.to_string()))
}
