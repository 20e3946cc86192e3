//! Scripted [`CommandRunner`] for unit tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::runner::{CommandResult, CommandRunner, RunnerError};

/// A recorded invocation
#[derive(Debug, Clone)]
pub struct MockCall {
    pub command: Vec<String>,
    pub cwd: PathBuf,
}

impl MockCall {
    /// Arguments after the program, space-joined
    pub fn args(&self) -> String {
        self.command
            .get(1..)
            .map(|args| args.join(" "))
            .unwrap_or_default()
    }
}

/// Canned reply for a matching invocation
#[derive(Debug, Clone)]
pub enum MockReply {
    Result(CommandResult),
    Timeout,
    Missing,
}

#[derive(Debug)]
struct Expectation {
    prefix: Vec<String>,
    reply: MockReply,
    once: bool,
}

/// Runner that replays scripted replies and records every call.
///
/// Replies are matched on an argument prefix (program excluded). The longest
/// matching prefix wins; among equally long prefixes, one-shot replies are
/// consumed in the order they were queued before any persistent reply is
/// used. Unmatched calls succeed with empty output.
#[derive(Debug, Default)]
pub struct MockRunner {
    expectations: Mutex<Vec<Expectation>>,
    log: Mutex<Vec<MockCall>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot reply for commands starting with `prefix`
    pub fn respond(&self, prefix: &[&str], result: CommandResult) {
        self.push(prefix, MockReply::Result(result), true);
    }

    /// Reply to every command starting with `prefix`
    pub fn respond_always(&self, prefix: &[&str], result: CommandResult) {
        self.push(prefix, MockReply::Result(result), false);
    }

    /// Queue a one-shot timeout for commands starting with `prefix`
    pub fn time_out(&self, prefix: &[&str]) {
        self.push(prefix, MockReply::Timeout, true);
    }

    /// Make every command fail as if the executable were missing
    pub fn missing_executable(&self) {
        self.push(&[], MockReply::Missing, false);
    }

    fn push(&self, prefix: &[&str], reply: MockReply, once: bool) {
        self.expectations.lock().unwrap().push(Expectation {
            prefix: prefix.iter().map(|s| (*s).to_string()).collect(),
            reply,
            once,
        });
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.log.lock().unwrap().clone()
    }

    /// Arguments of every call, in order
    pub fn call_args(&self) -> Vec<String> {
        self.calls().iter().map(MockCall::args).collect()
    }

    /// Index of the first call whose arguments start with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.call_args().iter().position(|args| args.starts_with(prefix))
    }

    pub fn was_called(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }

    fn next_reply(&self, args: &[String]) -> Option<MockReply> {
        let mut expectations = self.expectations.lock().unwrap();

        let best = expectations
            .iter()
            .enumerate()
            .filter(|(_, e)| args.starts_with(&e.prefix))
            .max_by_key(|(i, e)| {
                // Longest prefix, then one-shot before persistent, then FIFO
                (e.prefix.len(), e.once, std::cmp::Reverse(*i))
            })
            .map(|(i, _)| i)?;

        if expectations[best].once {
            Some(expectations.remove(best).reply)
        } else {
            Some(expectations[best].reply.clone())
        }
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        command: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandResult, RunnerError> {
        let (program, args) = command.split_first().ok_or(RunnerError::EmptyCommand)?;
        self.log.lock().unwrap().push(MockCall {
            command: command.to_vec(),
            cwd: cwd.to_path_buf(),
        });

        match self.next_reply(args) {
            Some(MockReply::Result(result)) => Ok(result),
            Some(MockReply::Timeout) => Err(RunnerError::Timeout {
                command: command.join(" "),
                timeout,
            }),
            Some(MockReply::Missing) => Err(RunnerError::ExecutableMissing(program.clone())),
            None => Ok(CommandResult::ok("")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GIT_TIMEOUT;

    async fn run(mock: &MockRunner, args: &[&str]) -> Result<CommandResult, RunnerError> {
        let mut command = vec!["git".to_string()];
        command.extend(args.iter().map(|s| (*s).to_string()));
        mock.run(&command, Path::new("/tmp"), GIT_TIMEOUT).await
    }

    #[tokio::test]
    async fn test_one_shot_replies_are_fifo() {
        let mock = MockRunner::new();
        mock.respond(&["push"], CommandResult::failed("first"));
        mock.respond(&["push"], CommandResult::failed("second"));

        assert_eq!(run(&mock, &["push"]).await.unwrap().stderr, "first");
        assert_eq!(run(&mock, &["push"]).await.unwrap().stderr, "second");
        assert!(run(&mock, &["push"]).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_longest_prefix_wins() {
        let mock = MockRunner::new();
        mock.respond_always(&["status", "--porcelain"], CommandResult::ok("?? a\n"));
        mock.respond_always(&["status", "--porcelain", "-b"], CommandResult::ok("## main\n"));

        assert_eq!(
            run(&mock, &["status", "--porcelain", "-b"]).await.unwrap().stdout,
            "## main\n"
        );
        assert_eq!(
            run(&mock, &["status", "--porcelain"]).await.unwrap().stdout,
            "?? a\n"
        );
    }

    #[tokio::test]
    async fn test_records_calls() {
        let mock = MockRunner::new();
        mock.time_out(&["pull"]);

        assert!(run(&mock, &["init"]).await.is_ok());
        assert!(matches!(
            run(&mock, &["pull", "origin", "main"]).await,
            Err(RunnerError::Timeout { .. })
        ));

        assert_eq!(mock.call_args(), vec!["init", "pull origin main"]);
        assert_eq!(mock.position("pull"), Some(1));
        assert!(!mock.was_called("push"));
    }
}
