//! GitHub repository reference parsing.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Formats accepted by [`normalize`], in matching priority order
pub const ACCEPTED_FORMATS: [&str; 3] = [
    "https://github.com/owner/repo",
    "git@github.com:owner/repo.git",
    "owner/repo",
];

static HTTPS_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://github\.com/(?P<owner>[^/\s]+)/(?P<name>[^/\s]+?)(?:\.git)?/?$")
        .expect("https pattern is valid")
});

static SSH_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^git@github\.com:(?P<owner>[^/\s]+)/(?P<name>[^/\s]+?)\.git$")
        .expect("ssh pattern is valid")
});

static SHORTHAND_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<owner>[^/\s:]+)/(?P<name>[^/\s:]+)$").expect("shorthand pattern is valid")
});

/// Error normalizing a repository reference
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("URL cannot be empty")]
    Empty,

    #[error(
        "invalid GitHub repository reference '{0}'. Use: {formats}",
        formats = ACCEPTED_FORMATS.join(", ")
    )]
    Unrecognized(String),

    #[error("invalid {part} '{value}': only letters, digits, '-', '_' and '.' are allowed")]
    InvalidSegment { part: &'static str, value: String },
}

/// A GitHub repository identified by owner and name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReference {
    pub owner: String,
    pub name: String,
    /// Always `https://github.com/<owner>/<name>.git`
    pub canonical_url: String,
}

impl RepositoryReference {
    fn new(owner: &str, name: &str) -> Result<Self, UrlError> {
        validate_segment("owner", owner)?;
        validate_segment("repository name", name)?;
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            canonical_url: format!("https://github.com/{owner}/{name}.git"),
        })
    }

    /// The `owner/name` identifier
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_url)
    }
}

impl std::str::FromStr for RepositoryReference {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Parse a user-supplied repository reference into its canonical HTTPS form.
///
/// The SSH form is also rendered as an HTTPS URL; callers that need SSH
/// remotes have to build them from `owner` and `name` themselves.
pub fn normalize(input: &str) -> Result<RepositoryReference, UrlError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UrlError::Empty);
    }

    for form in [&*HTTPS_FORM, &*SSH_FORM, &*SHORTHAND_FORM] {
        if let Some(caps) = form.captures(input) {
            let owner = &caps["owner"];
            let name = caps["name"].strip_suffix(".git").unwrap_or(&caps["name"]);
            return RepositoryReference::new(owner, name);
        }
    }

    Err(UrlError::Unrecognized(input.to_string()))
}

fn validate_segment(part: &'static str, value: &str) -> Result<(), UrlError> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(UrlError::InvalidSegment {
            part,
            value: value.to_string(),
        })
    }
}
