//! Human-readable rendering of status snapshots and run reports.

use std::io::{self, Write};

use crossterm::style::Stylize;

use crate::git::FileChangeSet;
use crate::workflow::{AttemptResult, WorkflowReport, WorkflowState};

const LABEL_WIDTH: usize = 10;

fn label(text: &str) -> String {
    format!("{text:<LABEL_WIDTH$}")
}

/// Print the classified working tree, one path per line
pub fn render_changes(out: &mut impl Write, changes: &FileChangeSet) -> io::Result<()> {
    if changes.is_empty() {
        return writeln!(out, "{}", "No changes detected".dim());
    }

    writeln!(out, "{} ({} files)", "Changes".bold(), changes.total())?;
    for path in &changes.new_files {
        writeln!(out, "  {}{}", label("new:").green(), path)?;
    }
    for path in &changes.modified_files {
        writeln!(out, "  {}{}", label("modified:").yellow(), path)?;
    }
    for path in &changes.deleted_files {
        writeln!(out, "  {}{}", label("deleted:").red(), path)?;
    }
    for (old, new) in &changes.renamed_files {
        writeln!(out, "  {}{} -> {}", label("renamed:").cyan(), old, new)?;
    }
    Ok(())
}

/// Paths listed with 1-based indices for selection
pub fn render_selection(out: &mut impl Write, paths: &[String]) -> io::Result<()> {
    for (i, path) in paths.iter().enumerate() {
        writeln!(out, "  {:>3}) {}", i + 1, path)?;
    }
    Ok(())
}

/// Print the outcome of a run with notes, recovery attempts and any remedy
pub fn render_report(out: &mut impl Write, report: &WorkflowReport) -> io::Result<()> {
    for note in &report.notes {
        writeln!(out, "{} {}", "ℹ".blue().bold(), note)?;
    }

    for attempt in &report.attempts {
        let detail = match &attempt.result {
            AttemptResult::Succeeded => "succeeded".green().to_string(),
            AttemptResult::MergeConflicts(_) => "merge conflicts, merge aborted".red().to_string(),
            AttemptResult::LeaseRejected(_) => "remote moved since last fetch".red().to_string(),
            AttemptResult::Declined => "declined".yellow().to_string(),
            AttemptResult::Failed(_) => "failed".red().to_string(),
        };
        writeln!(out, "  {}: {}", attempt.strategy, detail)?;
    }

    match &report.final_state {
        WorkflowState::Pushed { branch, via } => {
            writeln!(out, "{} Pushed {} ({})", "✓".green().bold(), branch, via)
        }
        WorkflowState::Failed(failure) => {
            writeln!(out, "{} {}", "✗".red().bold(), failure.kind)?;
            let output = failure.output.trim();
            if !output.is_empty() {
                for line in output.lines() {
                    writeln!(out, "    {line}")?;
                }
            }
            writeln!(out, "{} {}", "→".yellow().bold(), failure.remedy())
        }
        other => writeln!(out, "Stopped at {other}"),
    }
}
