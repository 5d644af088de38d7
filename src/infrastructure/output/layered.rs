//! Layered output sinks
//!
//! `Layered` is the one place that forwards calls to an inner sink. A
//! `SinkLayer` only decides what to do on the side; it cannot alter what the
//! inner sink returns. Stacks nest naturally:
//!
//! ```
//! use deckhand::infrastructure::output::{Layered, LogLayer, NoopSink};
//! use deckhand::domain::ports::OutputSink;
//!
//! let sink = Layered::new(LogLayer::new("deploy"), NoopSink);
//! sink.info("provisioning").unwrap();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::ports::{Answer, DirectoryStore, OutputSink, Prompt, SinkCall, SinkResult};

/// Side effect attached to a sink
pub trait SinkLayer: Send + Sync {
    /// Runs before the call reaches the inner sink
    fn before(&self, call: &SinkCall<'_>);

    /// Observes the inner sink's answer to a prompt
    fn after_ask(&self, _prompt: &Prompt, _answer: &SinkResult<Answer>) {}
}

/// A sink with one layer in front of it
pub struct Layered<L, S> {
    layer: L,
    inner: S,
}

impl<L: SinkLayer, S: OutputSink> Layered<L, S> {
    pub fn new(layer: L, inner: S) -> Self {
        Self { layer, inner }
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<L: SinkLayer, S: OutputSink> OutputSink for Layered<L, S> {
    fn info(&self, msg: &str) -> SinkResult<()> {
        self.layer.before(&SinkCall::Info(msg));
        self.inner.info(msg)
    }

    fn warn(&self, msg: &str) -> SinkResult<()> {
        self.layer.before(&SinkCall::Warn(msg));
        self.inner.warn(msg)
    }

    fn error(&self, msg: &str) -> SinkResult<()> {
        self.layer.before(&SinkCall::Error(msg));
        self.inner.error(msg)
    }

    fn ask(&self, prompt: &Prompt) -> SinkResult<Answer> {
        self.layer.before(&SinkCall::Ask(prompt));
        let answer = self.inner.ask(prompt);
        self.layer.after_ask(prompt, &answer);
        answer
    }
}

/// Layer that calls a closure for every sink call
pub struct HookLayer<F>(F);

impl<F> HookLayer<F>
where
    F: Fn(&SinkCall<'_>) + Send + Sync,
{
    pub fn new(hook: F) -> Self {
        Self(hook)
    }
}

impl<F> SinkLayer for HookLayer<F>
where
    F: Fn(&SinkCall<'_>) + Send + Sync,
{
    fn before(&self, call: &SinkCall<'_>) {
        (self.0)(call)
    }
}

/// Mirrors every message into `tracing` at the matching level
pub struct LogLayer {
    scope: String,
}

impl LogLayer {
    /// `scope` is attached to every event as the `scope` field
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

impl SinkLayer for LogLayer {
    fn before(&self, call: &SinkCall<'_>) {
        match call {
            SinkCall::Info(msg) => info!(scope = %self.scope, "{}", msg),
            SinkCall::Warn(msg) => warn!(scope = %self.scope, "{}", msg),
            SinkCall::Error(msg) => error!(scope = %self.scope, "{}", msg),
            SinkCall::Ask(prompt) => {
                info!(scope = %self.scope, query = %prompt.query, "Asking user")
            }
        }
    }

    fn after_ask(&self, prompt: &Prompt, answer: &SinkResult<Answer>) {
        match answer {
            Ok(answer) => info!(
                scope = %self.scope,
                query = %prompt.query,
                answer = answer.as_display(),
                "User answered"
            ),
            Err(err) => warn!(
                scope = %self.scope,
                query = %prompt.query,
                error = %err,
                "Prompt failed"
            ),
        }
    }
}

#[derive(Serialize)]
struct TranscriptEntry<'a> {
    level: &'a str,
    text: &'a str,
    at: String,
}

/// Records a transcript of every sink call in a directory store
///
/// Entries land in the `output` namespace under `<session>/<seq>`, one per
/// call, plus one per answer. On a `FileDirectory` each entry is a single
/// journal append. A failed write is logged and otherwise ignored: the
/// transcript must never change what the user sees.
pub struct StoreLayer {
    store: Arc<dyn DirectoryStore>,
    namespace: String,
    session: String,
    seq: AtomicU64,
}

impl StoreLayer {
    pub const NAMESPACE: &'static str = "output";

    /// Transcript for a new session named after the current time, the pid
    /// and a per-process counter
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        static SESSIONS: AtomicU64 = AtomicU64::new(0);

        let session = format!(
            "{}-{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
            std::process::id(),
            SESSIONS.fetch_add(1, Ordering::Relaxed)
        );
        Self::with_session(store, session)
    }

    pub fn with_session(store: Arc<dyn DirectoryStore>, session: impl Into<String>) -> Self {
        Self {
            store,
            namespace: Self::NAMESPACE.to_string(),
            session: session.into(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    fn append(&self, level: &str, text: &str) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let key = format!("{}/{:06}", self.session, seq);
        let entry = TranscriptEntry {
            level,
            text,
            at: Utc::now().to_rfc3339(),
        };

        let result = serde_json::to_vec(&entry)
            .map_err(|e| e.to_string())
            .and_then(|payload| {
                self.store
                    .put(&self.namespace, &key, &payload, 0)
                    .map_err(|e| e.to_string())
            });
        if let Err(err) = result {
            warn!(key = %key, error = %err, "Failed to record output transcript entry");
        }
    }
}

impl SinkLayer for StoreLayer {
    fn before(&self, call: &SinkCall<'_>) {
        self.append(call.level(), call.text());
    }

    fn after_ask(&self, _prompt: &Prompt, answer: &SinkResult<Answer>) {
        if let Ok(answer) = answer {
            self.append("answer", answer.as_display());
        }
    }
}
