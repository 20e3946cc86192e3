//! Workflow states and the pure decisions that move between them.
//!
//! Nothing in this module performs I/O: each function maps the current
//! inputs and the last [`CommandResult`] to the next state or action, so the
//! state machine can be exercised without a terminal or a repository.

use std::fmt;
use std::str::FromStr;

use crate::errors::{ErrorKind, Failure};
use crate::git::outcome::{is_identity_missing, is_nothing_to_commit};
use crate::git::{CommandResult, FileChangeSet, RepositoryReference};

/// What to stage before committing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageMode {
    /// Only the paths reported by `git status`
    ChangedOnly,
    /// The whole working tree (`git add .`)
    All,
    /// An explicit subset chosen by the user
    Selected(Vec<String>),
}

impl StageMode {
    pub fn label(&self) -> &'static str {
        match self {
            StageMode::ChangedOnly => "Changed files only",
            StageMode::All => "All files",
            StageMode::Selected(_) => "Selected files",
        }
    }
}

impl FromStr for StageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "c" | "changed" | "changed-only" | "changed_only" => Ok(StageMode::ChangedOnly),
            "a" | "all" => Ok(StageMode::All),
            other => Err(format!(
                "Unknown push mode '{other}'. Use: changed, all"
            )),
        }
    }
}

/// How the branch finally reached the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushVia {
    Direct,
    PullMerge,
    ForceWithLease,
    Force,
    /// Nothing was committed and the repository has no commits to push
    NothingToPush,
}

impl fmt::Display for PushVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PushVia::Direct => "direct push",
            PushVia::PullMerge => "pull and merge, then push",
            PushVia::ForceWithLease => "force push with lease",
            PushVia::Force => "force push",
            PushVia::NothingToPush => "nothing to push",
        };
        f.write_str(label)
    }
}

/// Position of a run in the init → stage → commit → remote → push sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Uninitialized,
    Initialized,
    Staged { staged: usize },
    Committed,
    RemoteConfigured,
    Pushed { branch: String, via: PushVia },
    Failed(Failure),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Uninitialized => "uninitialized",
            WorkflowState::Initialized => "initialized",
            WorkflowState::Staged { .. } => "staged",
            WorkflowState::Committed => "committed",
            WorkflowState::RemoteConfigured => "remote_configured",
            WorkflowState::Pushed { .. } => "pushed",
            WorkflowState::Failed(_) => "failed",
        }
    }

    /// Pushed and Failed absorb; no transition leaves them
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Pushed { .. } | WorkflowState::Failed(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowState::Pushed { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            WorkflowState::Failed(failure) => failure.exit_code(),
            _ => 0,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Staged { staged } => write!(f, "staged ({staged} paths)"),
            WorkflowState::Pushed { branch, via } => write!(f, "pushed {branch} ({via})"),
            WorkflowState::Failed(failure) => write!(f, "failed: {failure}"),
            other => f.write_str(other.name()),
        }
    }
}

/// How the index should be updated before committing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagePlan {
    /// `git add .`
    Everything { expected: usize },
    /// `git rm --cached` for `remove`, then `git add -- <add>`
    Paths { add: Vec<String>, remove: Vec<String> },
    /// Nothing changed; skip staging and committing
    Nothing,
}

impl StagePlan {
    /// Number of entries this plan is expected to stage
    pub fn staged_count(&self) -> usize {
        match self {
            StagePlan::Everything { expected } => *expected,
            StagePlan::Paths { add, remove } => add.len() + remove.len(),
            StagePlan::Nothing => 0,
        }
    }
}

/// Decide what to stage from a fresh status snapshot
pub fn plan_staging(changes: &FileChangeSet, mode: &StageMode) -> StagePlan {
    match mode {
        _ if changes.is_empty() => StagePlan::Nothing,
        StageMode::All => StagePlan::Everything {
            expected: changes.total(),
        },
        StageMode::ChangedOnly => StagePlan::Paths {
            add: changes.present_paths(),
            remove: changes.removed_paths(),
        },
        StageMode::Selected(paths) => {
            let removed = changes.removed_paths();
            let (remove, add): (Vec<String>, Vec<String>) = paths
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .partition(|p| removed.contains(p));
            if add.is_empty() && remove.is_empty() {
                StagePlan::Nothing
            } else {
                StagePlan::Paths { add, remove }
            }
        }
    }
}

/// Uninitialized → Initialized
pub fn after_init(result: &CommandResult) -> Result<WorkflowState, Failure> {
    if result.success {
        Ok(WorkflowState::Initialized)
    } else {
        Err(Failure::new(ErrorKind::UnknownGitError, result.output()))
    }
}

/// Initialized → Staged
pub fn after_stage(plan: &StagePlan, result: &CommandResult) -> Result<WorkflowState, Failure> {
    if result.success {
        Ok(WorkflowState::Staged {
            staged: plan.staged_count(),
        })
    } else {
        Err(Failure::new(ErrorKind::UnknownGitError, result.output()))
    }
}

/// Result of a commit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Git had nothing staged; not an error
    NothingToCommit,
}

/// Staged → Committed
pub fn after_commit(result: &CommandResult) -> Result<CommitOutcome, Failure> {
    if result.success {
        return Ok(CommitOutcome::Committed);
    }
    if is_nothing_to_commit(result) {
        return Ok(CommitOutcome::NothingToCommit);
    }
    let kind = if is_identity_missing(result) {
        ErrorKind::IdentityNotConfigured
    } else {
        ErrorKind::UnknownGitError
    };
    Err(Failure::new(kind, result.output()))
}

/// Change needed to point the remote at the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAction {
    /// Already correct; nothing to run
    Keep,
    Add,
    SetUrl { from: String },
}

/// Decide how to configure the remote given its current URL
pub fn remote_action(current: Option<&str>, reference: &RepositoryReference) -> RemoteAction {
    match current.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) if url == reference.canonical_url => RemoteAction::Keep,
        Some(url) => RemoteAction::SetUrl {
            from: url.to_string(),
        },
        None => RemoteAction::Add,
    }
}

/// Committed → RemoteConfigured
pub fn after_remote(result: &CommandResult) -> Result<WorkflowState, Failure> {
    if result.success {
        Ok(WorkflowState::RemoteConfigured)
    } else {
        Err(Failure::new(ErrorKind::UnknownGitError, result.output()))
    }
}
