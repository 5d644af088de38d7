use crate::domain::ports::{Answer, OutputSink, Prompt, SinkError, SinkResult};

/// Sink that discards every message
///
/// Questions are answered with the prompt's default; without one the
/// question cannot be answered.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl OutputSink for NoopSink {
    fn info(&self, _msg: &str) -> SinkResult<()> {
        Ok(())
    }

    fn warn(&self, _msg: &str) -> SinkResult<()> {
        Ok(())
    }

    fn error(&self, _msg: &str) -> SinkResult<()> {
        Ok(())
    }

    fn ask(&self, prompt: &Prompt) -> SinkResult<Answer> {
        prompt.default.clone().ok_or_else(|| SinkError::NonInteractive {
            query: prompt.query.clone(),
        })
    }
}
