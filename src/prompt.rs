//! Line-based terminal prompts.
//!
//! [`Prompter`] is generic over its input and output so the interactive flow
//! can be driven from in-memory buffers in tests. Clones share the same
//! streams, which lets the force-push confirmation reuse the session's
//! terminal.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossterm::style::Stylize;

use crate::workflow::ForceConfirmation;

struct PromptIo<R, W> {
    input: R,
    output: W,
}

pub struct Prompter<R, W> {
    io: Arc<Mutex<PromptIo<R, W>>>,
}

impl<R, W> Clone for Prompter<R, W> {
    fn clone(&self) -> Self {
        Self {
            io: Arc::clone(&self.io),
        }
    }
}

impl Prompter<io::BufReader<io::Stdin>, io::Stdout> {
    /// Prompter bound to the process terminal
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Arc::new(Mutex::new(PromptIo { input, output })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PromptIo<R, W>> {
        self.io.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write one line of output
    pub fn say(&self, text: impl Display) -> io::Result<()> {
        let mut io = self.lock();
        writeln!(io.output, "{text}")
    }

    /// Ask a question and return the trimmed answer.
    ///
    /// A blank answer yields `default` (or an empty string). `None` means the
    /// input was closed.
    pub fn ask(&self, question: &str, default: Option<&str>) -> io::Result<Option<String>> {
        let mut io = self.lock();
        match default {
            Some(default) if !default.is_empty() => {
                write!(io.output, "{} [{}]: ", question.bold(), default)?
            }
            _ => write!(io.output, "{}: ", question.bold())?,
        }
        io.output.flush()?;

        let mut line = String::new();
        if io.input.read_line(&mut line)? == 0 {
            writeln!(io.output)?;
            return Ok(None);
        }

        let answer = line.trim();
        if answer.is_empty() {
            Ok(Some(default.unwrap_or_default().to_string()))
        } else {
            Ok(Some(answer.to_string()))
        }
    }

    /// Yes/no question; blank input picks `default`, closed input answers no
    pub fn confirm(&self, question: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.ask(&format!("{question} {hint}"), None)? else {
                return Ok(false);
            };
            match answer.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer y or n")?,
            }
        }
    }
}

impl<R, W> ForceConfirmation for Prompter<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn confirm_force(&self, remote: &str, branch: &str) -> bool {
        let warning = format!(
            "Safe strategies failed. A force push overwrites {remote}/{branch} and discards commits that exist only on the remote."
        );
        if self.say(warning.yellow()).is_err() {
            return false;
        }
        self.confirm("Force push anyway?", false).unwrap_or(false)
    }
}

#[cfg(test)]
impl<R: BufRead> Prompter<R, Vec<u8>> {
    /// Everything written so far
    pub(crate) fn written(&self) -> String {
        String::from_utf8_lossy(&self.lock().output).into_owned()
    }
}
