//! Escalating recovery for pushes rejected as non-fast-forward.
//!
//! Strategies run in a fixed order and stop at the first success:
//! 1. pull with merge (unrelated histories allowed), then push again
//! 2. force push with lease
//! 3. plain force push, only after an explicit confirmation
//!
//! Failures that no strategy can fix (authentication, missing repository,
//! network, process-level errors) end the ladder immediately.

use std::fmt;

use tracing::{info, instrument, warn};

use crate::errors::{ErrorKind, Failure};
use crate::git::outcome::{classify_push_output, has_merge_conflicts, is_stale_lease, PushFailure};
use crate::git::{CommandResult, GitCli, PushMode};

use super::state::PushVia;

/// One rung of the escalation ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    PullMerge,
    ForceWithLease,
    Force,
}

impl Strategy {
    pub fn via(&self) -> PushVia {
        match self {
            Strategy::PullMerge => PushVia::PullMerge,
            Strategy::ForceWithLease => PushVia::ForceWithLease,
            Strategy::Force => PushVia::Force,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Strategy::PullMerge => "pull and merge",
            Strategy::ForceWithLease => "force push with lease",
            Strategy::Force => "force push",
        };
        f.write_str(label)
    }
}

/// How a single strategy ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Succeeded,
    /// The pull stopped on conflicts; the merge was aborted
    MergeConflicts(String),
    /// The remote moved since it was last fetched; the lease refused
    LeaseRejected(String),
    /// The user did not confirm the force push
    Declined,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    pub result: AttemptResult,
}

/// Final verdict of the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        via: Strategy,
        attempts: Vec<StrategyAttempt>,
    },
    Unresolved {
        failure: Failure,
        attempts: Vec<StrategyAttempt>,
    },
}

impl Resolution {
    pub fn attempts(&self) -> &[StrategyAttempt] {
        match self {
            Resolution::Resolved { attempts, .. } | Resolution::Unresolved { attempts, .. } => {
                attempts
            }
        }
    }
}

/// Decision hook for the unconditional force push
pub trait ForceConfirmation: Send + Sync {
    /// Return true to overwrite `remote/branch` with the local branch
    fn confirm_force(&self, remote: &str, branch: &str) -> bool;
}

/// Never allows a plain force push
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverForce;

impl ForceConfirmation for NeverForce {
    fn confirm_force(&self, _remote: &str, _branch: &str) -> bool {
        false
    }
}

/// Always allows a plain force push (`--allow-force`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysForce;

impl ForceConfirmation for AlwaysForce {
    fn confirm_force(&self, _remote: &str, _branch: &str) -> bool {
        true
    }
}

/// Internal control flow for one rung
enum Step {
    Done,
    Escalate(AttemptResult),
    Abort(Failure),
}

pub struct ConflictResolver<'a> {
    git: &'a GitCli,
    remote: &'a str,
    branch: &'a str,
    set_upstream: bool,
    confirm: &'a dyn ForceConfirmation,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(
        git: &'a GitCli,
        remote: &'a str,
        branch: &'a str,
        set_upstream: bool,
        confirm: &'a dyn ForceConfirmation,
    ) -> Self {
        Self {
            git,
            remote,
            branch,
            set_upstream,
            confirm,
        }
    }

    /// Walk the ladder after a non-fast-forward rejection
    #[instrument(skip_all, fields(remote = self.remote, branch = self.branch))]
    pub async fn resolve(&self) -> Resolution {
        let mut attempts = Vec::new();
        let mut last_output = String::new();

        for strategy in [Strategy::PullMerge, Strategy::ForceWithLease, Strategy::Force] {
            info!(%strategy, "Attempting conflict resolution");
            let step = match strategy {
                Strategy::PullMerge => self.pull_then_push().await,
                Strategy::ForceWithLease => self.force_push(PushMode::ForceWithLease).await,
                Strategy::Force => {
                    if self.confirm.confirm_force(self.remote, self.branch) {
                        self.force_push(PushMode::Force).await
                    } else {
                        info!("Force push declined");
                        Step::Escalate(AttemptResult::Declined)
                    }
                }
            };

            match step {
                Step::Done => {
                    attempts.push(StrategyAttempt {
                        strategy,
                        result: AttemptResult::Succeeded,
                    });
                    info!(%strategy, "Push conflict resolved");
                    return Resolution::Resolved {
                        via: strategy,
                        attempts,
                    };
                }
                Step::Escalate(result) => {
                    warn!(%strategy, ?result, "Strategy did not resolve the conflict");
                    match &result {
                        AttemptResult::MergeConflicts(output)
                        | AttemptResult::LeaseRejected(output)
                        | AttemptResult::Failed(output) => last_output.clone_from(output),
                        AttemptResult::Succeeded | AttemptResult::Declined => {}
                    }
                    attempts.push(StrategyAttempt { strategy, result });
                }
                Step::Abort(failure) => {
                    warn!(%strategy, kind = failure.kind.code(), "Conflict resolution aborted");
                    attempts.push(StrategyAttempt {
                        strategy,
                        result: AttemptResult::Failed(failure.output.clone()),
                    });
                    return Resolution::Unresolved { failure, attempts };
                }
            }
        }

        Resolution::Unresolved {
            failure: Failure::new(ErrorKind::PushConflictUnresolved, last_output),
            attempts,
        }
    }

    async fn pull_then_push(&self) -> Step {
        let pull = match self.git.pull_merge(self.remote, self.branch).await {
            Ok(result) => result,
            Err(e) => return Step::Abort(Failure::from(e)),
        };

        if !pull.success {
            if has_merge_conflicts(&pull) {
                // Leave the working tree as it was before the pull
                match self.git.merge_abort().await {
                    Ok(abort) if !abort.success => {
                        warn!(output = %abort.output(), "git merge --abort failed");
                    }
                    Err(e) => return Step::Abort(Failure::from(e)),
                    Ok(_) => {}
                }
                return Step::Escalate(AttemptResult::MergeConflicts(pull.output()));
            }
            return Self::escalate_or_abort(&pull);
        }

        self.push(PushMode::Normal).await
    }

    async fn force_push(&self, mode: PushMode) -> Step {
        let step = self.push(mode).await;
        if let Step::Escalate(AttemptResult::Failed(output)) = &step {
            if mode == PushMode::ForceWithLease && is_stale_lease(&CommandResult::failed(output.as_str())) {
                return Step::Escalate(AttemptResult::LeaseRejected(output.clone()));
            }
        }
        step
    }

    async fn push(&self, mode: PushMode) -> Step {
        match self
            .git
            .push(self.remote, self.branch, mode, self.set_upstream)
            .await
        {
            Ok(result) if result.success => Step::Done,
            Ok(result) => Self::escalate_or_abort(&result),
            Err(e) => Step::Abort(Failure::from(e)),
        }
    }

    /// Failures another strategy cannot fix end the ladder
    fn escalate_or_abort(result: &CommandResult) -> Step {
        let output = result.output();
        match classify_push_output(&output) {
            Some(PushFailure::RepositoryNotFound) => {
                Step::Abort(Failure::new(ErrorKind::RepositoryNotFound, output))
            }
            Some(PushFailure::AuthenticationFailure) => {
                Step::Abort(Failure::new(ErrorKind::AuthenticationFailure, output))
            }
            Some(PushFailure::NetworkError) => {
                Step::Abort(Failure::new(ErrorKind::NetworkError, output))
            }
            Some(PushFailure::RejectedNonFastForward) | None => {
                Step::Escalate(AttemptResult::Failed(output))
            }
        }
    }
}
