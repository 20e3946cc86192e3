//! Failure taxonomy for gitbuddy runs.
//!
//! Every unsuccessful git invocation either triggers a recovery strategy or
//! ends the run as a [`Failure`] carrying one of these kinds. Each kind maps to
//! a stable process exit code and a one-line remedy shown to the user.

use std::fmt;

use thiserror::Error;

use crate::git::{RunnerError, UrlError};

/// Exit code for configuration, I/O and other non-git errors
pub const EXIT_GENERAL: i32 = 1;

/// Exit code when the user declines the push summary
pub const EXIT_CANCELLED: i32 = 11;

/// Classified failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidUrl,
    ProcessTimeout,
    ExecutableMissing,
    AuthenticationFailure,
    RepositoryNotFound,
    PushConflictUnresolved,
    NetworkError,
    UnknownGitError,
    IdentityNotConfigured,
}

impl ErrorKind {
    /// Machine-readable code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "INVALID_URL",
            ErrorKind::ProcessTimeout => "PROCESS_TIMEOUT",
            ErrorKind::ExecutableMissing => "EXECUTABLE_MISSING",
            ErrorKind::AuthenticationFailure => "AUTHENTICATION_FAILURE",
            ErrorKind::RepositoryNotFound => "REPOSITORY_NOT_FOUND",
            ErrorKind::PushConflictUnresolved => "PUSH_CONFLICT_UNRESOLVED",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::UnknownGitError => "UNKNOWN_GIT_ERROR",
            ErrorKind::IdentityNotConfigured => "IDENTITY_NOT_CONFIGURED",
        }
    }

    /// Process exit code for a run that ends with this kind
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::InvalidUrl => 2,
            ErrorKind::ProcessTimeout => 3,
            ErrorKind::ExecutableMissing => 4,
            ErrorKind::AuthenticationFailure => 5,
            ErrorKind::RepositoryNotFound => 6,
            ErrorKind::PushConflictUnresolved => 7,
            ErrorKind::NetworkError => 8,
            ErrorKind::UnknownGitError => 9,
            ErrorKind::IdentityNotConfigured => 10,
        }
    }

    /// Suggested next step for the user
    pub fn remedy(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => {
                "Use https://github.com/owner/repo, git@github.com:owner/repo.git or owner/repo"
            }
            ErrorKind::ProcessTimeout => {
                "Check your network connection and any pending credential prompt, then retry"
            }
            ErrorKind::ExecutableMissing => {
                "Install git and make sure it is on your PATH (https://git-scm.com/downloads)"
            }
            ErrorKind::AuthenticationFailure => {
                "Create a personal access token at https://github.com/settings/tokens and use it as your password"
            }
            ErrorKind::RepositoryNotFound => {
                "Make sure the repository exists on GitHub and your account has access to it"
            }
            ErrorKind::PushConflictUnresolved => {
                "Pull and merge the remote changes manually, then run gitbuddy again"
            }
            ErrorKind::NetworkError => "Check your network connection and proxy settings, then retry",
            ErrorKind::UnknownGitError => "Inspect the git output above and fix the reported problem",
            ErrorKind::IdentityNotConfigured => {
                "Run: git config --global user.email 'you@example.com' && git config --global user.name 'Your Name'"
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::InvalidUrl => "invalid repository URL",
            ErrorKind::ProcessTimeout => "git command timed out",
            ErrorKind::ExecutableMissing => "git executable not found",
            ErrorKind::AuthenticationFailure => "authentication failed",
            ErrorKind::RepositoryNotFound => "repository not found",
            ErrorKind::PushConflictUnresolved => "push conflict could not be resolved",
            ErrorKind::NetworkError => "network error",
            ErrorKind::UnknownGitError => "git command failed",
            ErrorKind::IdentityNotConfigured => "git user identity is not configured",
        };
        f.write_str(label)
    }
}

/// A terminal failure of a workflow run, with the raw git output attached
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {}", summary_line(.output))]
pub struct Failure {
    pub kind: ErrorKind,
    /// Raw command output (or runner error text) that caused the failure
    pub output: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, output: impl Into<String>) -> Self {
        Self {
            kind,
            output: output.into(),
        }
    }

    pub fn remedy(&self) -> &'static str {
        self.kind.remedy()
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl From<&RunnerError> for Failure {
    fn from(err: &RunnerError) -> Self {
        let kind = match err {
            RunnerError::Timeout { .. } => ErrorKind::ProcessTimeout,
            RunnerError::ExecutableMissing(_) => ErrorKind::ExecutableMissing,
            RunnerError::EmptyCommand | RunnerError::Io { .. } => ErrorKind::UnknownGitError,
        };
        Failure::new(kind, err.to_string())
    }
}

impl From<RunnerError> for Failure {
    fn from(err: RunnerError) -> Self {
        Failure::from(&err)
    }
}

impl From<&UrlError> for Failure {
    fn from(err: &UrlError) -> Self {
        Failure::new(ErrorKind::InvalidUrl, err.to_string())
    }
}

/// First non-empty line of command output, used in one-line summaries
fn summary_line(output: &str) -> &str {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("(no output)")
}

/// Convert an error bubbled up to `main` into an exit code
pub fn to_exit_code(error: &anyhow::Error) -> i32 {
    if let Some(failure) = error.downcast_ref::<Failure>() {
        return failure.exit_code();
    }
    if error.downcast_ref::<UrlError>().is_some() {
        return ErrorKind::InvalidUrl.exit_code();
    }
    if let Some(runner) = error.downcast_ref::<RunnerError>() {
        return Failure::from(runner).exit_code();
    }
    EXIT_GENERAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    const ALL_KINDS: [ErrorKind; 9] = [
        ErrorKind::InvalidUrl,
        ErrorKind::ProcessTimeout,
        ErrorKind::ExecutableMissing,
        ErrorKind::AuthenticationFailure,
        ErrorKind::RepositoryNotFound,
        ErrorKind::PushConflictUnresolved,
        ErrorKind::NetworkError,
        ErrorKind::UnknownGitError,
        ErrorKind::IdentityNotConfigured,
    ];

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        let codes: HashSet<i32> = ALL_KINDS.iter().map(ErrorKind::exit_code).collect();
        assert_eq!(codes.len(), ALL_KINDS.len());
        assert!(!codes.contains(&0));
        assert!(!codes.contains(&EXIT_GENERAL));
        assert!(!codes.contains(&EXIT_CANCELLED));
        assert_ne!(EXIT_CANCELLED, EXIT_GENERAL);
        assert_ne!(EXIT_CANCELLED, 0);
        // 130 is left to the shell for SIGINT
        assert!(!codes.contains(&130));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorKind::InvalidUrl.code(), "INVALID_URL");
        assert_eq!(
            ErrorKind::PushConflictUnresolved.code(),
            "PUSH_CONFLICT_UNRESOLVED"
        );
        assert_eq!(ErrorKind::UnknownGitError.code(), "UNKNOWN_GIT_ERROR");
    }

    #[test]
    fn test_failure_display_uses_first_output_line() {
        let failure = Failure::new(
            ErrorKind::RepositoryNotFound,
            "\nremote: Repository not found.\nfatal: repository not found\n",
        );
        assert_eq!(
            failure.to_string(),
            "repository not found: remote: Repository not found."
        );
    }

    #[test]
    fn test_failure_display_without_output() {
        let failure = Failure::new(ErrorKind::UnknownGitError, "");
        assert!(failure.to_string().ends_with("(no output)"));
    }

    #[test]
    fn test_runner_errors_map_to_kinds() {
        let timeout = RunnerError::Timeout {
            command: "git push".into(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(Failure::from(&timeout).kind, ErrorKind::ProcessTimeout);

        let missing = RunnerError::ExecutableMissing("git".into());
        assert_eq!(Failure::from(&missing).kind, ErrorKind::ExecutableMissing);
    }

    #[test]
    fn test_to_exit_code_downcasts() {
        let err = anyhow::Error::new(Failure::new(ErrorKind::NetworkError, "boom"));
        assert_eq!(to_exit_code(&err), 8);

        let err = anyhow::Error::new(UrlError::Empty);
        assert_eq!(to_exit_code(&err), 2);

        let err = anyhow::anyhow!("config file broken");
        assert_eq!(to_exit_code(&err), EXIT_GENERAL);
    }
}
