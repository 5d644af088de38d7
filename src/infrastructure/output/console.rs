//! Console output sink
//!
//! Informational messages go to stdout, warnings and errors to stderr.
//! Questions are asked with `dialoguer` when stdin is a terminal; otherwise
//! the prompt's default answer is used.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use crossterm::style::Stylize;
use dialoguer::{Confirm, Input};
use is_terminal::IsTerminal;

use crate::domain::ports::{Answer, OutputSink, Prompt, PromptKind, SinkError, SinkResult};

type Writer = Mutex<Box<dyn Write + Send>>;

pub struct ConsoleSink {
    out: Writer,
    err: Writer,
    color: bool,
    interactive: bool,
}

impl ConsoleSink {
    /// Sink bound to the process stdout/stderr
    pub fn stdio() -> Self {
        let color = io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self {
            out: Mutex::new(Box::new(io::stdout())),
            err: Mutex::new(Box::new(io::stderr())),
            color,
            interactive: io::stdin().is_terminal(),
        }
    }

    /// Sink writing to custom writers; never colored, never interactive
    pub fn with_writers<O, E>(out: O, err: E) -> Self
    where
        O: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        Self {
            out: Mutex::new(Box::new(out)),
            err: Mutex::new(Box::new(err)),
            color: false,
            interactive: false,
        }
    }

    fn write_line(writer: &Writer, line: &str) -> SinkResult<()> {
        let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    fn prompt_error(err: dialoguer::Error) -> SinkError {
        SinkError::Prompt {
            message: err.to_string(),
        }
    }

    fn ask_terminal(&self, prompt: &Prompt) -> SinkResult<Answer> {
        match prompt.kind {
            PromptKind::YesNo => {
                let mut confirm = Confirm::new().with_prompt(prompt.query.as_str());
                if let Some(default) = &prompt.default {
                    confirm = confirm.default(default.is_yes());
                }
                let yes = confirm.interact().map_err(Self::prompt_error)?;
                Ok(if yes { Answer::Yes } else { Answer::No })
            }
            PromptKind::Text => {
                let mut input = Input::<String>::new().with_prompt(prompt.query.as_str());
                if let Some(default) = &prompt.default {
                    input = input.default(default.as_display().to_string());
                }
                let text = input.interact_text().map_err(Self::prompt_error)?;
                Ok(Answer::Text(text))
            }
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::stdio()
    }
}

impl OutputSink for ConsoleSink {
    fn info(&self, msg: &str) -> SinkResult<()> {
        Self::write_line(&self.out, msg)
    }

    fn warn(&self, msg: &str) -> SinkResult<()> {
        let line = if self.color {
            format!("{} {}", "warning:".yellow().bold(), msg)
        } else {
            format!("warning: {}", msg)
        };
        Self::write_line(&self.err, &line)
    }

    fn error(&self, msg: &str) -> SinkResult<()> {
        let line = if self.color {
            format!("{} {}", "error:".red().bold(), msg)
        } else {
            format!("error: {}", msg)
        };
        Self::write_line(&self.err, &line)
    }

    fn ask(&self, prompt: &Prompt) -> SinkResult<Answer> {
        if self.interactive {
            return self.ask_terminal(prompt);
        }
        prompt.default.clone().ok_or_else(|| SinkError::NonInteractive {
            query: prompt.query.clone(),
        })
    }
}
