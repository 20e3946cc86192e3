//! Classification of `git push` results.
//!
//! Git reports push failures only as human-readable text, so the outcome is
//! derived from an ordered table of substring rules. The phrasing belongs to
//! the installed git version and is not a stable contract; anything the table
//! does not recognise is reported as [`PushAttemptOutcome::Unknown`].

use crate::errors::ErrorKind;

use super::runner::CommandResult;

/// Classified result of one push attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushAttemptOutcome {
    Success,
    RejectedNonFastForward,
    AuthenticationFailure,
    RepositoryNotFound,
    NetworkError,
    /// Unrecognised failure, carrying the raw output
    Unknown(String),
}

impl PushAttemptOutcome {
    /// Failure kind for a terminal outcome (`None` for success)
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            PushAttemptOutcome::Success => None,
            PushAttemptOutcome::RejectedNonFastForward => Some(ErrorKind::PushConflictUnresolved),
            PushAttemptOutcome::AuthenticationFailure => Some(ErrorKind::AuthenticationFailure),
            PushAttemptOutcome::RepositoryNotFound => Some(ErrorKind::RepositoryNotFound),
            PushAttemptOutcome::NetworkError => Some(ErrorKind::NetworkError),
            PushAttemptOutcome::Unknown(_) => Some(ErrorKind::UnknownGitError),
        }
    }
}

/// Failure category a rule assigns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushFailure {
    RepositoryNotFound,
    AuthenticationFailure,
    NetworkError,
    RejectedNonFastForward,
}

impl From<PushFailure> for PushAttemptOutcome {
    fn from(failure: PushFailure) -> Self {
        match failure {
            PushFailure::RepositoryNotFound => PushAttemptOutcome::RepositoryNotFound,
            PushFailure::AuthenticationFailure => PushAttemptOutcome::AuthenticationFailure,
            PushFailure::NetworkError => PushAttemptOutcome::NetworkError,
            PushFailure::RejectedNonFastForward => PushAttemptOutcome::RejectedNonFastForward,
        }
    }
}

/// Ordered (pattern, failure) rules; first match wins.
///
/// Patterns are lowercase and matched against lowercased output. Specific
/// causes come before the generic rejection markers because a rejected push
/// caused by missing access also prints "failed to push some refs".
pub const PUSH_FAILURE_RULES: &[(&str, PushFailure)] = &[
    ("repository not found", PushFailure::RepositoryNotFound),
    ("repository does not exist", PushFailure::RepositoryNotFound),
    ("does not appear to be a git repository", PushFailure::RepositoryNotFound),
    ("authentication failed", PushFailure::AuthenticationFailure),
    ("permission denied", PushFailure::AuthenticationFailure),
    ("support for password authentication was removed", PushFailure::AuthenticationFailure),
    ("could not read username", PushFailure::AuthenticationFailure),
    ("could not read password", PushFailure::AuthenticationFailure),
    ("invalid username or password", PushFailure::AuthenticationFailure),
    ("the requested url returned error: 403", PushFailure::AuthenticationFailure),
    ("the requested url returned error: 401", PushFailure::AuthenticationFailure),
    ("could not resolve host", PushFailure::NetworkError),
    ("failed to connect", PushFailure::NetworkError),
    ("connection timed out", PushFailure::NetworkError),
    ("connection refused", PushFailure::NetworkError),
    ("network is unreachable", PushFailure::NetworkError),
    ("operation timed out", PushFailure::NetworkError),
    ("the remote end hung up unexpectedly", PushFailure::NetworkError),
    ("non-fast-forward", PushFailure::RejectedNonFastForward),
    ("(fetch first)", PushFailure::RejectedNonFastForward),
    ("updates were rejected", PushFailure::RejectedNonFastForward),
    ("[rejected]", PushFailure::RejectedNonFastForward),
];

/// Marker git prints when `--force-with-lease` refuses because the remote moved
const STALE_LEASE_MARKER: &str = "(stale info)";

/// Classify raw push output against [`PUSH_FAILURE_RULES`]
pub fn classify_push_output(output: &str) -> Option<PushFailure> {
    let lowered = output.to_lowercase();
    PUSH_FAILURE_RULES
        .iter()
        .find(|(pattern, _)| lowered.contains(pattern))
        .map(|(_, failure)| *failure)
}

/// Classify a completed push invocation
pub fn classify_push(result: &CommandResult) -> PushAttemptOutcome {
    if result.success {
        return PushAttemptOutcome::Success;
    }
    let output = result.output();
    match classify_push_output(&output) {
        Some(failure) => failure.into(),
        None => PushAttemptOutcome::Unknown(output),
    }
}

/// True when a `--force-with-lease` push was refused because the remote ref moved
pub fn is_stale_lease(result: &CommandResult) -> bool {
    !result.success && result.output().to_lowercase().contains(STALE_LEASE_MARKER)
}

/// True when a pull stopped with merge conflicts in the working tree
pub fn has_merge_conflicts(result: &CommandResult) -> bool {
    result.output().contains("CONFLICT")
        || result
            .output()
            .contains("Automatic merge failed; fix conflicts")
}

/// True when `git commit` refused because nothing was staged
pub fn is_nothing_to_commit(result: &CommandResult) -> bool {
    let lowered = result.output().to_lowercase();
    lowered.contains("nothing to commit") || lowered.contains("no changes added to commit")
}

/// True when `git commit` refused because user.name / user.email are unset
pub fn is_identity_missing(result: &CommandResult) -> bool {
    let output = result.output();
    output.contains("Please tell me who you are")
        || output.contains("unable to auto-detect email address")
}
