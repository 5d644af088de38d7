//! OutputSink port - progress reporting and simple user interaction
//!
//! Sinks can be stacked: a layer performs its own effect (logging,
//! transcript recording) and forwards the call unchanged to the sink it
//! wraps. See `infrastructure::output::Layered`.

use thiserror::Error;

pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Debug, Error)]
pub enum SinkError {
    /// A question needs an answer but nobody can give one
    #[error("cannot ask '{query}': no interactive terminal and no default answer")]
    NonInteractive { query: String },

    #[error("output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt failed: {message}")]
    Prompt { message: String },
}

/// What kind of answer a prompt expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    YesNo,
    Text,
}

/// A question for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub query: String,
    /// Answer used when the sink cannot interact
    pub default: Option<Answer>,
}

impl Prompt {
    pub fn confirm(query: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::YesNo,
            query: query.into(),
            default: None,
        }
    }

    pub fn text(query: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Text,
            query: query.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: Answer) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Text(String),
}

impl Answer {
    pub fn is_yes(&self) -> bool {
        matches!(self, Answer::Yes)
    }

    /// Render for transcripts and logs
    pub fn as_display(&self) -> &str {
        match self {
            Answer::Yes => "yes",
            Answer::No => "no",
            Answer::Text(text) => text,
        }
    }
}

/// A single sink call, as seen by layers
#[derive(Debug, Clone, Copy)]
pub enum SinkCall<'a> {
    Info(&'a str),
    Warn(&'a str),
    Error(&'a str),
    Ask(&'a Prompt),
}

impl SinkCall<'_> {
    pub fn level(&self) -> &'static str {
        match self {
            SinkCall::Info(_) => "info",
            SinkCall::Warn(_) => "warn",
            SinkCall::Error(_) => "error",
            SinkCall::Ask(_) => "ask",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            SinkCall::Info(msg) | SinkCall::Warn(msg) | SinkCall::Error(msg) => msg,
            SinkCall::Ask(prompt) => &prompt.query,
        }
    }
}

/// Human-facing output channel
///
/// Implementations:
/// - `ConsoleSink` - stdout/stderr, interactive prompts on a TTY
/// - `NoopSink` - discards everything, answers defaults
/// - `Layered` - adds a side effect in front of another sink
/// - `MockSink` - records calls, for tests
pub trait OutputSink: Send + Sync {
    fn info(&self, msg: &str) -> SinkResult<()>;

    fn warn(&self, msg: &str) -> SinkResult<()>;

    fn error(&self, msg: &str) -> SinkResult<()>;

    fn ask(&self, prompt: &Prompt) -> SinkResult<Answer>;
}

impl<T: OutputSink + ?Sized> OutputSink for std::sync::Arc<T> {
    fn info(&self, msg: &str) -> SinkResult<()> {
        (**self).info(msg)
    }

    fn warn(&self, msg: &str) -> SinkResult<()> {
        (**self).warn(msg)
    }

    fn error(&self, msg: &str) -> SinkResult<()> {
        (**self).error(msg)
    }

    fn ask(&self, prompt: &Prompt) -> SinkResult<Answer> {
        (**self).ask(prompt)
    }
}

impl<T: OutputSink + ?Sized> OutputSink for Box<T> {
    fn info(&self, msg: &str) -> SinkResult<()> {
        (**self).info(msg)
    }

    fn warn(&self, msg: &str) -> SinkResult<()> {
        (**self).warn(msg)
    }

    fn error(&self, msg: &str) -> SinkResult<()> {
        (**self).error(msg)
    }

    fn ask(&self, prompt: &Prompt) -> SinkResult<Answer> {
        (**self).ask(prompt)
    }
}
