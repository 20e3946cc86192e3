//! Git boundary: process execution, output parsing and reference parsing.
//!
//! Everything that talks to the git binary or interprets its text output
//! lives here; the workflow module only sees typed results.

mod cli;
#[cfg(test)]
pub mod mock;
pub mod outcome;
mod runner;
pub mod status;
pub mod url;

pub use cli::{GitCli, PushMode};
pub use outcome::{classify_push, PushAttemptOutcome};
pub use runner::{ensure_executable, CommandResult, CommandRunner, RunnerError, SystemRunner, GIT_TIMEOUT};
pub use status::{classify, FileChangeSet};
pub use url::{normalize, RepositoryReference, UrlError};
