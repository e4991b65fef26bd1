use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// User interaction surfaces the split pipeline relies on.
pub trait Prompter {
    /// Free-form answer; `None` when the user gave no answer.
    fn prompt(&mut self, message: &str) -> Result<Option<String>>;

    fn confirm(&mut self, message: &str) -> Result<bool>;

    fn alert(&mut self, message: &str);
}

/// Answers prompts from command-line flags, falling back to the terminal
/// when `interactive` is set.
pub struct TerminalPrompter {
    preset_answer: Option<String>,
    assume_yes: bool,
    interactive: bool,
}

impl TerminalPrompter {
    pub fn new(preset_answer: Option<String>, assume_yes: bool, interactive: bool) -> Self {
        Self {
            preset_answer,
            assume_yes,
            interactive,
        }
    }

    fn read_line(&self, message: &str) -> Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{message} ").context("failed to write prompt")?;
        stderr.flush().context("failed to flush prompt")?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read answer from stdin")?;
        Ok(line.trim().to_string())
    }
}

impl Prompter for TerminalPrompter {
    fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        if let Some(answer) = &self.preset_answer {
            info!(prompt = message, answer = %answer, "answered from flags");
            return Ok(Some(answer.clone()));
        }

        if !self.interactive {
            warn!(prompt = message, "no answer given; rerun with a flag or --interactive");
            return Ok(None);
        }

        let answer = self.read_line(message)?;
        Ok((!answer.is_empty()).then_some(answer))
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        if self.assume_yes {
            info!(prompt = %message.replace('\n', " "), "confirmed from flags");
            return Ok(true);
        }

        if !self.interactive {
            warn!(prompt = %message.replace('\n', " "), "not confirmed; rerun with --yes or --interactive");
            return Ok(false);
        }

        let answer = self.read_line(&format!("{message} [y/N]"))?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    fn alert(&mut self, message: &str) {
        warn!(notice = %message.replace('\n', " "), "user notice");
    }
}
