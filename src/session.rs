//! Interactive mode: the guided URL → status → mode → message → push loop.

use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::display::{render_changes, render_report, render_selection};
use crate::errors::EXIT_CANCELLED;
use crate::git::{normalize, FileChangeSet, GitCli, RepositoryReference};
use crate::prompt::Prompter;
use crate::workflow::{
    AlwaysForce, ForceConfirmation, NeverForce, Orchestrator, PushRequest, StageMode,
    WorkflowOptions, WorkflowReport,
};

/// Answer to the push mode question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChoice {
    Changed,
    All,
    Select,
    Quit,
}

impl ModeChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "c" | "changed" => Some(ModeChoice::Changed),
            "a" | "all" => Some(ModeChoice::All),
            "s" | "select" => Some(ModeChoice::Select),
            "q" | "quit" => Some(ModeChoice::Quit),
            _ => None,
        }
    }

    fn key(mode: &StageMode) -> &'static str {
        match mode {
            StageMode::All => "a",
            StageMode::ChangedOnly | StageMode::Selected(_) => "c",
        }
    }
}

/// Resolve a selection like `1 3` or `1,2 src/main.rs` against listed paths.
///
/// Numbers are 1-based indices into `paths`; anything else is taken as a
/// path and must be one of `paths`. Order follows `paths`, duplicates drop.
pub fn parse_selection(input: &str, paths: &[String]) -> Result<Vec<String>, String> {
    let mut chosen = BTreeSet::new();
    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let index = match token.parse::<usize>() {
            Ok(n) if (1..=paths.len()).contains(&n) => n - 1,
            Ok(n) => return Err(format!("No file numbered {n}")),
            Err(_) => paths
                .iter()
                .position(|p| p == token)
                .ok_or_else(|| format!("'{token}' is not a changed file"))?,
        };
        chosen.insert(index);
    }
    if chosen.is_empty() {
        return Err("No files selected".to_string());
    }
    Ok(chosen.into_iter().map(|i| paths[i].clone()).collect())
}

/// How one pass through the loop ended
#[derive(Debug)]
pub enum PassOutcome {
    Quit,
    Cancelled,
    Finished(Box<WorkflowReport>),
}

/// Options of a one-shot `gitbuddy push`
#[derive(Debug, Clone, Copy, Default)]
pub struct PushFlags {
    /// Skip the summary confirmation
    pub yes: bool,
    /// Force push without asking if safer strategies fail
    pub allow_force: bool,
}

/// Run one push without the guided questions.
///
/// Unless `yes` is set the target is shown and must be confirmed; declining
/// returns [`EXIT_CANCELLED`]. Otherwise the run's exit code is returned.
/// With `yes` alone the ladder never force pushes.
pub async fn push_once<R, W>(
    prompter: Prompter<R, W>,
    config: &Config,
    git: GitCli,
    request: PushRequest,
    flags: PushFlags,
) -> Result<i32>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    if !flags.yes {
        prompter.say(format!(
            "Push to {} ({})",
            request.reference.canonical_url,
            request.mode.label()
        ))?;
        if !prompter.confirm("Proceed?", false)? {
            prompter.say("Cancelled")?;
            return Ok(EXIT_CANCELLED);
        }
    }

    let confirm: Arc<dyn ForceConfirmation> = if flags.allow_force {
        Arc::new(AlwaysForce)
    } else if flags.yes {
        Arc::new(NeverForce)
    } else {
        Arc::new(prompter.clone())
    };

    let orchestrator = Orchestrator::new(git, WorkflowOptions::from(config), confirm);
    let report = orchestrator.run(&request).await;

    let mut buffer = Vec::new();
    render_report(&mut buffer, &report).context("Failed to render report")?;
    prompter.say(String::from_utf8_lossy(&buffer).trim_end())?;

    Ok(report.exit_code())
}

pub struct Session<R, W> {
    prompter: Prompter<R, W>,
    config: Config,
    git: GitCli,
}

impl<R, W> Session<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    pub fn new(prompter: Prompter<R, W>, config: Config, git: GitCli) -> Self {
        Self {
            prompter,
            config,
            git,
        }
    }

    /// Run passes until the user quits; returns the exit code of the last
    /// run, or [`EXIT_CANCELLED`] when its summary was declined
    pub async fn run(&self) -> Result<i32> {
        self.prompter
            .say(format!("{} {}", "Git Buddy".bold().cyan(), env!("CARGO_PKG_VERSION")))?;
        self.prompter
            .say(format!("Working directory: {}", self.git.cwd().display()))?;

        let mut exit_code = 0;
        loop {
            match self.pass().await? {
                PassOutcome::Quit => break,
                PassOutcome::Cancelled => {
                    self.prompter.say("Cancelled")?;
                    exit_code = EXIT_CANCELLED;
                }
                PassOutcome::Finished(report) => exit_code = report.exit_code(),
            }
            if !self.prompter.confirm("Push to another repository?", false)? {
                break;
            }
        }
        self.prompter.say("Bye")?;
        Ok(exit_code)
    }

    /// One guided push
    pub async fn pass(&self) -> Result<PassOutcome> {
        let Some(reference) = self.ask_reference()? else {
            return Ok(PassOutcome::Quit);
        };

        let fresh = !self.git.is_repository();
        let changes = if fresh {
            self.prompter
                .say("No git repository here yet; one will be initialized and all files staged.")?;
            FileChangeSet::default()
        } else {
            self.show_status().await?
        };

        let default_mode = if fresh {
            StageMode::All
        } else {
            self.config.session.stage_mode()
        };
        let Some(mode) = self.ask_mode(&changes, &default_mode)? else {
            return Ok(PassOutcome::Quit);
        };

        let Some(message) = self
            .prompter
            .ask("Commit message", Some(self.config.commit.default_message.as_str()))?
        else {
            return Ok(PassOutcome::Quit);
        };

        self.prompter.say("")?;
        self.prompter.say("Summary".bold())?;
        self.prompter
            .say(format!("  Repository: {}", reference.canonical_url))?;
        self.prompter.say(format!("  Mode:       {}", mode.label()))?;
        if let StageMode::Selected(paths) = &mode {
            self.prompter.say(format!("  Files:      {}", paths.join(", ")))?;
        }
        self.prompter.say(format!("  Message:    {message}"))?;
        if !self.prompter.confirm("Proceed?", true)? {
            return Ok(PassOutcome::Cancelled);
        }

        let orchestrator = Orchestrator::new(
            self.git.clone(),
            WorkflowOptions::from(&self.config),
            Arc::new(self.prompter.clone()),
        );
        let request = PushRequest {
            reference,
            mode,
            message: Some(message),
        };
        let report = orchestrator.run(&request).await;

        let mut buffer = Vec::new();
        render_report(&mut buffer, &report).context("Failed to render report")?;
        self.prompter.say(String::from_utf8_lossy(&buffer).trim_end())?;

        Ok(PassOutcome::Finished(Box::new(report)))
    }

    /// Ask until a valid reference is given; `None` on quit
    fn ask_reference(&self) -> Result<Option<RepositoryReference>> {
        loop {
            let Some(input) = self
                .prompter
                .ask("GitHub repository URL (or 'quit')", None)?
            else {
                return Ok(None);
            };
            if matches!(input.to_lowercase().as_str(), "q" | "quit" | "exit") {
                return Ok(None);
            }
            match normalize(&input) {
                Ok(reference) => {
                    debug!(url = %reference.canonical_url, "Repository selected");
                    return Ok(Some(reference));
                }
                Err(e) => self.prompter.say(format!("{} {}", "✗".red(), e))?,
            }
        }
    }

    async fn show_status(&self) -> Result<FileChangeSet> {
        let changes = match self.git.changes().await {
            Ok(Ok(changes)) => changes,
            Ok(Err(result)) => {
                warn!(output = %result.output(), "git status failed");
                self.prompter
                    .say(format!("{} could not read status: {}", "⚠".yellow(), result.output().trim()))?;
                FileChangeSet::default()
            }
            Err(e) => {
                warn!(error = %e, "git status failed");
                self.prompter
                    .say(format!("{} could not read status: {e}", "⚠".yellow()))?;
                FileChangeSet::default()
            }
        };

        let mut buffer = Vec::new();
        render_changes(&mut buffer, &changes).context("Failed to render status")?;
        self.prompter.say(String::from_utf8_lossy(&buffer).trim_end())?;
        Ok(changes)
    }

    /// Ask for the push mode; `None` on quit
    fn ask_mode(&self, changes: &FileChangeSet, default: &StageMode) -> Result<Option<StageMode>> {
        loop {
            let Some(answer) = self.prompter.ask(
                "Push mode: (c)hanged files, (a)ll files, (s)elect files, (q)uit",
                Some(ModeChoice::key(default)),
            )?
            else {
                return Ok(None);
            };

            match ModeChoice::parse(&answer) {
                Some(ModeChoice::Changed) => return Ok(Some(StageMode::ChangedOnly)),
                Some(ModeChoice::All) => return Ok(Some(StageMode::All)),
                Some(ModeChoice::Quit) => return Ok(None),
                Some(ModeChoice::Select) => {
                    let paths = changes.paths_to_stage();
                    if paths.is_empty() {
                        self.prompter.say("There are no changed files to select")?;
                        continue;
                    }
                    if let Some(selected) = self.ask_selection(&paths)? {
                        return Ok(Some(StageMode::Selected(selected)));
                    }
                }
                None => self.prompter.say("Please answer c, a, s or q")?,
            }
        }
    }

    /// `None` sends the user back to the mode question
    fn ask_selection(&self, paths: &[String]) -> Result<Option<Vec<String>>> {
        let mut buffer = Vec::new();
        render_selection(&mut buffer, paths).context("Failed to render file list")?;
        self.prompter.say(String::from_utf8_lossy(&buffer).trim_end())?;

        loop {
            let Some(answer) = self
                .prompter
                .ask("Files to push (numbers or paths, blank to go back)", None)?
            else {
                return Ok(None);
            };
            if answer.is_empty() {
                return Ok(None);
            }
            match parse_selection(&answer, paths) {
                Ok(selected) => return Ok(Some(selected)),
                Err(e) => self.prompter.say(e)?,
            }
        }
    }
}
