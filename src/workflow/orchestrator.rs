//! Async driver for one push run.
//!
//! Performs the git calls in order and feeds each result through the pure
//! decisions in [`super::state`]. The run stops at the first terminal state.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::errors::{ErrorKind, Failure};
use crate::git::{
    classify_push, CommandResult, GitCli, PushAttemptOutcome, PushMode, RepositoryReference,
};

use super::conflict::{ConflictResolver, ForceConfirmation, Resolution, StrategyAttempt};
use super::state::{
    after_commit, after_init, after_remote, after_stage, plan_staging, remote_action,
    CommitOutcome, PushVia, RemoteAction, StageMode, StagePlan, WorkflowState,
};

/// What the user asked for
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub reference: RepositoryReference,
    pub mode: StageMode,
    /// Commit message; blank or `None` uses the configured default
    pub message: Option<String>,
}

/// Settings the orchestrator takes from configuration
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub remote: String,
    pub default_branch: String,
    pub default_message: String,
    pub set_upstream: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for WorkflowOptions {
    fn from(config: &Config) -> Self {
        Self {
            remote: config.git.remote.clone(),
            default_branch: config.git.default_branch.clone(),
            default_message: config.commit.default_message.clone(),
            set_upstream: config.git.set_upstream,
        }
    }
}

/// Record of a finished run
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub final_state: WorkflowState,
    /// Every state entered, in order, ending with `final_state`
    pub history: Vec<WorkflowState>,
    /// Non-fatal events worth showing the user
    pub notes: Vec<String>,
    /// Conflict strategies tried, empty if the first push was accepted
    pub attempts: Vec<StrategyAttempt>,
    /// Message used for the commit, if one was made
    pub commit_message: Option<String>,
}

impl WorkflowReport {
    fn new() -> Self {
        Self {
            final_state: WorkflowState::Uninitialized,
            history: Vec::new(),
            notes: Vec::new(),
            attempts: Vec::new(),
            commit_message: None,
        }
    }

    fn enter(&mut self, state: WorkflowState) {
        info!(state = %state, "Workflow transition");
        self.history.push(state.clone());
        self.final_state = state;
    }

    fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        info!(note = %note);
        self.notes.push(note);
    }

    pub fn succeeded(&self) -> bool {
        self.final_state.is_success()
    }

    pub fn exit_code(&self) -> i32 {
        self.final_state.exit_code()
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.final_state {
            WorkflowState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether the run passed through `state` (compared by name)
    pub fn visited(&self, state: &str) -> bool {
        self.history.iter().any(|s| s.name() == state)
    }
}

pub struct Orchestrator {
    git: GitCli,
    options: WorkflowOptions,
    confirm: Arc<dyn ForceConfirmation>,
}

impl Orchestrator {
    pub fn new(git: GitCli, options: WorkflowOptions, confirm: Arc<dyn ForceConfirmation>) -> Self {
        Self {
            git,
            options,
            confirm,
        }
    }

    pub fn git(&self) -> &GitCli {
        &self.git
    }

    /// Run init → stage → commit → remote → push for one request
    #[instrument(skip_all, fields(path = %self.git.cwd().display(), repo = %request.reference.full_name()))]
    pub async fn run(&self, request: &PushRequest) -> WorkflowReport {
        let mut report = WorkflowReport::new();
        report.enter(WorkflowState::Uninitialized);

        let state = match self.drive(request, &mut report).await {
            Ok(state) => state,
            Err(failure) => {
                warn!(kind = failure.kind.code(), "Workflow failed");
                WorkflowState::Failed(failure)
            }
        };
        report.enter(state);
        report
    }

    async fn drive(
        &self,
        request: &PushRequest,
        report: &mut WorkflowReport,
    ) -> Result<WorkflowState, Failure> {
        let mut mode = request.mode.clone();

        if self.git.is_repository() {
            report.enter(WorkflowState::Initialized);
        } else {
            let result = self.git.init().await?;
            report.enter(after_init(&result)?);
            if mode != StageMode::All {
                report.note("New repository: staging all files");
                mode = StageMode::All;
            }
        }

        let changes = match self.git.changes().await? {
            Ok(changes) => changes,
            Err(result) => return Err(Failure::new(ErrorKind::UnknownGitError, result.output())),
        };

        let plan = plan_staging(&changes, &mode);
        let committed = self.stage_and_commit(&plan, request, report).await?;

        self.configure_remote(&request.reference, report).await?;

        let branch = match self.git.current_branch().await? {
            Some(branch) => branch,
            None => {
                report.note(format!(
                    "Could not determine the current branch; using '{}'",
                    self.options.default_branch
                ));
                self.options.default_branch.clone()
            }
        };

        if !committed && !self.git.has_commits().await? {
            report.note("Repository has no commits; nothing to push");
            return Ok(WorkflowState::Pushed {
                branch,
                via: PushVia::NothingToPush,
            });
        }

        self.push(branch, report).await
    }

    /// Returns whether a commit was created
    async fn stage_and_commit(
        &self,
        plan: &StagePlan,
        request: &PushRequest,
        report: &mut WorkflowReport,
    ) -> Result<bool, Failure> {
        let result = match plan {
            StagePlan::Nothing => {
                report.note("Nothing to commit");
                return Ok(false);
            }
            StagePlan::Everything { .. } => self.git.add_all().await?,
            StagePlan::Paths { add, remove } => {
                if !remove.is_empty() {
                    after_stage(plan, &self.git.remove_cached(remove).await?)?;
                }
                if add.is_empty() {
                    CommandResult::ok("")
                } else {
                    self.git.add_paths(add).await?
                }
            }
        };
        report.enter(after_stage(plan, &result)?);

        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.options.default_message)
            .to_string();

        let result = self.git.commit(&message).await?;
        match after_commit(&result)? {
            CommitOutcome::Committed => {
                report.commit_message = Some(message);
                report.enter(WorkflowState::Committed);
                Ok(true)
            }
            CommitOutcome::NothingToCommit => {
                report.note("Nothing to commit");
                Ok(false)
            }
        }
    }

    async fn configure_remote(
        &self,
        reference: &RepositoryReference,
        report: &mut WorkflowReport,
    ) -> Result<(), Failure> {
        let remote = &self.options.remote;
        let url = &reference.canonical_url;
        let current = self.git.remote_url(remote).await?;

        let result = match remote_action(current.as_deref(), reference) {
            RemoteAction::Keep => {
                report.note(format!("Remote '{remote}' already points to {url}"));
                report.enter(WorkflowState::RemoteConfigured);
                return Ok(());
            }
            RemoteAction::Add => self.git.remote_add(remote, url).await?,
            RemoteAction::SetUrl { from } => {
                report.note(format!("Remote '{remote}' changed from {from} to {url}"));
                self.git.remote_set_url(remote, url).await?
            }
        };
        report.enter(after_remote(&result)?);
        Ok(())
    }

    async fn push(
        &self,
        branch: String,
        report: &mut WorkflowReport,
    ) -> Result<WorkflowState, Failure> {
        let remote = &self.options.remote;
        let result = self
            .git
            .push(remote, &branch, PushMode::Normal, self.options.set_upstream)
            .await?;

        match classify_push(&result) {
            PushAttemptOutcome::Success => Ok(WorkflowState::Pushed {
                branch,
                via: PushVia::Direct,
            }),
            PushAttemptOutcome::RejectedNonFastForward => {
                report.note("Push rejected: remote has commits not present locally");
                let resolver = ConflictResolver::new(
                    &self.git,
                    remote,
                    &branch,
                    self.options.set_upstream,
                    self.confirm.as_ref(),
                );
                match resolver.resolve().await {
                    Resolution::Resolved { via, attempts } => {
                        report.attempts = attempts;
                        Ok(WorkflowState::Pushed {
                            branch,
                            via: via.via(),
                        })
                    }
                    Resolution::Unresolved { failure, attempts } => {
                        report.attempts = attempts;
                        Err(failure)
                    }
                }
            }
            outcome => {
                let kind = outcome.error_kind().unwrap_or(ErrorKind::UnknownGitError);
                Err(Failure::new(kind, result.output()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::MockRunner;
    use crate::git::{normalize, CommandResult};
    use crate::workflow::conflict::{AlwaysForce, NeverForce, Strategy};
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        mock: Arc<MockRunner>,
    }

    impl Fixture {
        /// Existing repository on `main`
        fn repo() -> Self {
            let temp = TempDir::new().unwrap();
            std::fs::create_dir(temp.path().join(".git")).unwrap();
            Self::with_dir(temp)
        }

        fn empty_dir() -> Self {
            Self::with_dir(TempDir::new().unwrap())
        }

        fn with_dir(temp: TempDir) -> Self {
            let mock = Arc::new(MockRunner::new());
            mock.respond_always(&["branch", "--show-current"], CommandResult::ok("main\n"));
            Self { temp, mock }
        }

        fn orchestrator(&self, confirm: Arc<dyn ForceConfirmation>) -> Orchestrator {
            let git = GitCli::new(self.mock.clone(), self.temp.path());
            Orchestrator::new(git, WorkflowOptions::default(), confirm)
        }

        async fn run(&self, mode: StageMode, message: Option<&str>) -> WorkflowReport {
            let request = PushRequest {
                reference: normalize("https://github.com/foo/bar").unwrap(),
                mode,
                message: message.map(String::from),
            };
            self.orchestrator(Arc::new(NeverForce)).run(&request).await
        }
    }

    const REJECTED: &str = " ! [rejected]        main -> main (fetch first)\n\
        error: failed to push some refs to 'https://github.com/foo/bar.git'\n\
        hint: Updates were rejected because the remote contains work that you do\n";

    #[tokio::test]
    async fn test_changed_only_scenario() {
        let fx = Fixture::repo();
        fx.mock
            .respond(&["status", "--porcelain"], CommandResult::ok("?? a.txt\n M b.txt\n"));

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert!(report.succeeded(), "{:?}", report.final_state);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            report.final_state,
            WorkflowState::Pushed {
                branch: "main".into(),
                via: PushVia::Direct
            }
        );
        assert!(fx.mock.was_called("add -- a.txt b.txt"));
        assert!(fx.mock.was_called("commit -m Update files via Git Buddy"));
        assert!(fx.mock.was_called("remote add origin https://github.com/foo/bar.git"));
        assert!(fx.mock.was_called("push -u origin main"));
        assert_eq!(report.commit_message.as_deref(), Some("Update files via Git Buddy"));
        let names: Vec<_> = report.history.iter().map(WorkflowState::name).collect();
        assert_eq!(
            names,
            vec![
                "uninitialized",
                "initialized",
                "staged",
                "committed",
                "remote_configured",
                "pushed"
            ]
        );
    }

    #[tokio::test]
    async fn test_changed_only_stages_removals_without_add() {
        let fx = Fixture::repo();
        fx.mock.respond(
            &["status", "--porcelain"],
            CommandResult::ok("D  c.txt\nR  d.txt -> e.txt\n"),
        );

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert!(report.succeeded(), "{:?}", report.final_state);
        assert!(fx
            .mock
            .was_called("rm --cached --ignore-unmatch --quiet -- c.txt d.txt"));
        assert!(fx.mock.was_called("add -- e.txt"));
        assert!(!fx.mock.was_called("add -- c.txt"));
        assert!(!fx.mock.was_called("add -- e.txt d.txt"));
        assert!(report.visited("staged"));
    }

    #[tokio::test]
    async fn test_removal_only_changes_skip_add() {
        let fx = Fixture::repo();
        fx.mock
            .respond(&["status", "--porcelain"], CommandResult::ok(" D c.txt\n"));

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert!(report.succeeded(), "{:?}", report.final_state);
        assert!(fx.mock.was_called("rm --cached --ignore-unmatch --quiet -- c.txt"));
        assert!(!fx.mock.was_called("add"));
    }

    #[tokio::test]
    async fn test_failed_removal_stops_before_commit() {
        let fx = Fixture::repo();
        fx.mock
            .respond(&["status", "--porcelain"], CommandResult::ok(" D c.txt\n"));
        fx.mock.respond(
            &["rm", "--cached"],
            CommandResult::failed("fatal: Unable to create '.git/index.lock': File exists.\n"),
        );

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert_eq!(
            report.failure().map(|f| f.kind),
            Some(ErrorKind::UnknownGitError)
        );
        assert!(!fx.mock.was_called("commit"));
    }

    #[tokio::test]
    async fn test_custom_message_and_all_mode() {
        let fx = Fixture::repo();
        fx.mock
            .respond(&["status", "--porcelain"], CommandResult::ok(" M b.txt\n"));

        let report = fx.run(StageMode::All, Some("  Fix typo  ")).await;

        assert!(report.succeeded());
        assert!(fx.mock.was_called("add ."));
        assert!(fx.mock.was_called("commit -m Fix typo"));
    }

    #[tokio::test]
    async fn test_new_directory_is_initialized_and_stages_all() {
        let fx = Fixture::empty_dir();
        fx.mock
            .respond(&["status", "--porcelain"], CommandResult::ok("?? a.txt\n"));

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert!(report.succeeded());
        assert_eq!(fx.mock.position("init"), Some(0));
        assert!(fx.mock.was_called("add ."));
        assert!(!fx.mock.was_called("add --"));
    }

    #[tokio::test]
    async fn test_clean_tree_skips_commit() {
        let fx = Fixture::repo();

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert!(report.succeeded());
        assert!(!fx.mock.was_called("add"));
        assert!(!fx.mock.was_called("commit"));
        assert!(report.visited("remote_configured"));
        assert!(!report.visited("committed"));
        assert!(report.notes.iter().any(|n| n == "Nothing to commit"));
    }

    #[tokio::test]
    async fn test_clean_tree_without_commits_has_nothing_to_push() {
        let fx = Fixture::repo();
        fx.mock.respond(
            &["rev-parse"],
            CommandResult::failed(""),
        );

        let report = fx.run(StageMode::All, None).await;

        assert_eq!(
            report.final_state,
            WorkflowState::Pushed {
                branch: "main".into(),
                via: PushVia::NothingToPush
            }
        );
        assert!(!fx.mock.was_called("push"));
    }

    #[tokio::test]
    async fn test_remote_already_configured_is_kept() {
        let fx = Fixture::repo();
        fx.mock.respond_always(
            &["remote", "get-url"],
            CommandResult::ok("https://github.com/foo/bar.git\n"),
        );

        let first = fx.run(StageMode::ChangedOnly, None).await;
        let second = fx.run(StageMode::ChangedOnly, None).await;

        assert!(first.succeeded());
        assert!(second.succeeded());
        assert!(!fx.mock.was_called("remote add"));
        assert!(!fx.mock.was_called("remote set-url"));
    }

    #[tokio::test]
    async fn test_remote_with_other_url_is_updated() {
        let fx = Fixture::repo();
        fx.mock.respond(
            &["remote", "get-url"],
            CommandResult::ok("git@github.com:foo/old.git\n"),
        );

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert!(report.succeeded());
        assert!(fx
            .mock
            .was_called("remote set-url origin https://github.com/foo/bar.git"));
    }

    #[tokio::test]
    async fn test_rejected_push_recovers_with_pull() {
        let fx = Fixture::repo();
        fx.mock
            .respond(&["status", "--porcelain"], CommandResult::ok(" M b.txt\n"));
        fx.mock.respond(&["push"], CommandResult::failed(REJECTED));

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert_eq!(
            report.final_state,
            WorkflowState::Pushed {
                branch: "main".into(),
                via: PushVia::PullMerge
            }
        );
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].strategy, Strategy::PullMerge);
        assert!(!fx.mock.was_called("push --force"));
    }

    #[tokio::test]
    async fn test_unresolved_conflict_fails_with_kind() {
        let fx = Fixture::repo();
        fx.mock
            .respond(&["status", "--porcelain"], CommandResult::ok(" M b.txt\n"));
        fx.mock.respond(&["push", "-u"], CommandResult::failed(REJECTED));
        fx.mock.respond(&["pull"], CommandResult::failed("fatal: refusing to merge\n"));
        fx.mock
            .respond(&["push", "--force-with-lease"], CommandResult::failed(REJECTED));

        let report = fx.run(StageMode::ChangedOnly, None).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::PushConflictUnresolved);
        assert_eq!(report.exit_code(), 7);
        assert_eq!(report.attempts.len(), 3);
    }

    #[tokio::test]
    async fn test_confirmed_force_push() {
        let fx = Fixture::repo();
        fx.mock.respond(&["push", "-u"], CommandResult::failed(REJECTED));
        fx.mock.respond(&["pull"], CommandResult::failed("fatal: refusing to merge\n"));
        fx.mock
            .respond(&["push", "--force-with-lease"], CommandResult::failed(REJECTED));
        let request = PushRequest {
            reference: normalize("foo/bar").unwrap(),
            mode: StageMode::ChangedOnly,
            message: None,
        };

        let report = fx.orchestrator(Arc::new(AlwaysForce)).run(&request).await;

        assert_eq!(
            report.final_state,
            WorkflowState::Pushed {
                branch: "main".into(),
                via: PushVia::Force
            }
        );
    }

    #[tokio::test]
    async fn test_authentication_failure() {
        let fx = Fixture::repo();
        fx.mock.respond(
            &["push"],
            CommandResult::failed(
                "remote: Invalid username or password.\n\
                 fatal: Authentication failed for 'https://github.com/foo/bar.git/'\n",
            ),
        );

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert_eq!(report.failure().unwrap().kind, ErrorKind::AuthenticationFailure);
        assert!(!fx.mock.was_called("pull"));
    }

    #[tokio::test]
    async fn test_identity_not_configured() {
        let fx = Fixture::repo();
        fx.mock
            .respond(&["status", "--porcelain"], CommandResult::ok("?? a.txt\n"));
        fx.mock.respond(
            &["commit"],
            CommandResult::failed("Author identity unknown\n\n*** Please tell me who you are.\n"),
        );

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert_eq!(report.failure().unwrap().kind, ErrorKind::IdentityNotConfigured);
        assert!(!fx.mock.was_called("remote"));
        assert!(!fx.mock.was_called("push"));
    }

    #[tokio::test]
    async fn test_timeout_is_terminal() {
        let fx = Fixture::repo();
        fx.mock.time_out(&["status", "--porcelain"]);

        let report = fx.run(StageMode::ChangedOnly, None).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::ProcessTimeout);
        assert_eq!(report.exit_code(), 3);
        assert_eq!(fx.mock.call_args(), vec!["status --porcelain"]);
    }

    #[tokio::test]
    async fn test_missing_git() {
        let fx = Fixture::repo();
        fx.mock.missing_executable();

        let report = fx.run(StageMode::ChangedOnly, None).await;

        assert_eq!(report.failure().unwrap().kind, ErrorKind::ExecutableMissing);
    }

    #[tokio::test]
    async fn test_unknown_push_failure_carries_output() {
        let fx = Fixture::repo();
        fx.mock
            .respond(&["push"], CommandResult::failed("error: src refspec main does not match any\n"));

        let report = fx.run(StageMode::ChangedOnly, None).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::UnknownGitError);
        assert!(failure.output.contains("src refspec"));
    }
}
