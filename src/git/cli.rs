//! Typed wrappers over the git invocations gitbuddy performs.
//!
//! Uses the git CLI directly (rather than libgit2) so credential helpers,
//! hooks and the user's git configuration all apply.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument};

use super::runner::{CommandResult, CommandRunner, RunnerError, GIT_TIMEOUT};
use super::status::{self, FileChangeSet};

/// How a push treats the remote ref
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    /// Fast-forward only
    Normal,
    /// Overwrite only if the remote ref is where we last saw it
    ForceWithLease,
    /// Overwrite unconditionally
    Force,
}

/// Git command wrapper bound to one working directory
#[derive(Clone)]
pub struct GitCli {
    runner: Arc<dyn CommandRunner>,
    cwd: PathBuf,
    program: String,
}

impl GitCli {
    pub fn new(runner: Arc<dyn CommandRunner>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            cwd: cwd.into(),
            program: "git".to_string(),
        }
    }

    /// Use a different git executable (e.g. an absolute path)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Execute a git command with the standard timeout
    pub async fn run(&self, args: &[&str]) -> Result<CommandResult, RunnerError> {
        let mut command = Vec::with_capacity(args.len() + 1);
        command.push(self.program.clone());
        command.extend(args.iter().map(|a| (*a).to_string()));

        debug!(?args, cwd = ?self.cwd, "Running git command");
        self.runner.run(&command, &self.cwd, GIT_TIMEOUT).await
    }

    /// Whether the working directory already has repository metadata
    pub fn is_repository(&self) -> bool {
        self.cwd.join(".git").exists()
    }

    #[instrument(skip_all, fields(path = %self.cwd.display()))]
    pub async fn init(&self) -> Result<CommandResult, RunnerError> {
        self.run(&["init"]).await
    }

    /// Raw `git status --porcelain`
    #[instrument(skip_all, fields(path = %self.cwd.display()))]
    pub async fn status_porcelain(&self) -> Result<CommandResult, RunnerError> {
        self.run(&["status", "--porcelain"]).await
    }

    /// Query and classify the working tree status.
    ///
    /// A failed status query is returned as-is so callers can surface it.
    pub async fn changes(&self) -> Result<Result<FileChangeSet, CommandResult>, RunnerError> {
        let result = self.status_porcelain().await?;
        if result.success {
            Ok(Ok(status::classify(&result.stdout)))
        } else {
            Ok(Err(result))
        }
    }

    /// Stage the whole working tree
    #[instrument(skip_all, fields(path = %self.cwd.display()))]
    pub async fn add_all(&self) -> Result<CommandResult, RunnerError> {
        self.run(&["add", "."]).await
    }

    /// Stage specific paths
    #[instrument(skip_all, fields(path = %self.cwd.display(), count = paths.len()))]
    pub async fn add_paths(&self, paths: &[String]) -> Result<CommandResult, RunnerError> {
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).await
    }

    /// Stage the removal of paths no longer in the working tree.
    /// Paths already gone from the index are ignored.
    #[instrument(skip_all, fields(path = %self.cwd.display(), count = paths.len()))]
    pub async fn remove_cached(&self, paths: &[String]) -> Result<CommandResult, RunnerError> {
        let mut args = vec!["rm", "--cached", "--ignore-unmatch", "--quiet", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).await
    }

    #[instrument(skip_all, fields(path = %self.cwd.display()))]
    pub async fn commit(&self, message: &str) -> Result<CommandResult, RunnerError> {
        self.run(&["commit", "-m", message]).await
    }

    /// Check if the repository has at least one commit
    #[instrument(skip_all, fields(path = %self.cwd.display()))]
    pub async fn has_commits(&self) -> Result<bool, RunnerError> {
        let result = self.run(&["rev-parse", "--verify", "--quiet", "HEAD"]).await?;
        Ok(result.success)
    }

    /// Get the URL of a remote, `None` if the remote does not exist
    #[instrument(skip_all, fields(path = %self.cwd.display(), remote))]
    pub async fn remote_url(&self, remote: &str) -> Result<Option<String>, RunnerError> {
        let result = self.run(&["remote", "get-url", remote]).await?;
        if result.success {
            Ok(Some(result.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip_all, fields(path = %self.cwd.display(), remote, url))]
    pub async fn remote_add(&self, remote: &str, url: &str) -> Result<CommandResult, RunnerError> {
        self.run(&["remote", "add", remote, url]).await
    }

    #[instrument(skip_all, fields(path = %self.cwd.display(), remote, url))]
    pub async fn remote_set_url(
        &self,
        remote: &str,
        url: &str,
    ) -> Result<CommandResult, RunnerError> {
        self.run(&["remote", "set-url", remote, url]).await
    }

    /// Get the current branch name, `None` when it cannot be determined
    /// (detached HEAD or an old git without `--show-current`)
    #[instrument(skip_all, fields(path = %self.cwd.display()))]
    pub async fn current_branch(&self) -> Result<Option<String>, RunnerError> {
        let result = self.run(&["branch", "--show-current"]).await?;
        let branch = result.stdout.trim();
        if result.success && !branch.is_empty() {
            return Ok(Some(branch.to_string()));
        }

        let result = self.run(&["status", "--porcelain", "-b"]).await?;
        if result.success {
            Ok(status::branch_from_header(&result.stdout))
        } else {
            Ok(None)
        }
    }

    /// Push a branch to a remote
    #[instrument(skip_all, fields(path = %self.cwd.display(), remote, branch, ?mode))]
    pub async fn push(
        &self,
        remote: &str,
        branch: &str,
        mode: PushMode,
        set_upstream: bool,
    ) -> Result<CommandResult, RunnerError> {
        let mut args = vec!["push"];
        match mode {
            PushMode::Normal => {}
            PushMode::ForceWithLease => args.push("--force-with-lease"),
            PushMode::Force => args.push("--force"),
        }
        if set_upstream {
            args.push("-u");
        }
        args.extend([remote, branch]);
        self.run(&args).await
    }

    /// Pull with a merge, allowing histories that share no commit
    #[instrument(skip_all, fields(path = %self.cwd.display(), remote, branch))]
    pub async fn pull_merge(&self, remote: &str, branch: &str) -> Result<CommandResult, RunnerError> {
        self.run(&[
            "pull",
            "--no-rebase",
            "--no-edit",
            "--allow-unrelated-histories",
            remote,
            branch,
        ])
        .await
    }

    /// Abandon an in-progress merge
    #[instrument(skip_all, fields(path = %self.cwd.display()))]
    pub async fn merge_abort(&self) -> Result<CommandResult, RunnerError> {
        self.run(&["merge", "--abort"]).await
    }
}

impl std::fmt::Debug for GitCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCli")
            .field("cwd", &self.cwd)
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}
