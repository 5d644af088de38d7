//! Test harness
//!
//! Builds a ready `Core` over a throwaway directory with stub plugins
//! registered for the test tuple, so tests only set up what they care
//! about. Also home to the recording doubles used across the test suite.

use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};

use tempfile::TempDir;

use crate::config::CoreConfig;
use crate::core::Core;
use crate::domain::entities::{Descriptor, InfrastructureDecl, Record};
use crate::domain::ports::{
    Answer, App, Infrastructure, OutputSink, PhaseContext, PluginMeta, Prompt, SinkError,
    SinkResult,
};
use crate::domain::value_objects::{AppTuple, Phase};
use crate::infrastructure::directory::FileDirectory;
use crate::infrastructure::output::{Layered, LogLayer};
use crate::registry::{AppRegistry, InfraRegistry};

/// Name used for every component of the test tuple and the test infra
pub const TEST: &str = "test";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `("test", "test", "test")`
pub fn test_app_tuple() -> AppTuple {
    AppTuple::from_static(TEST, TEST, TEST)
}

/// Application `test` deployed on a single infrastructure named, typed and
/// flavored `test`
pub fn test_descriptor() -> Descriptor {
    Descriptor::single(TEST, TEST, InfrastructureDecl::new(TEST, TEST, TEST))
}

/// Overrides applied by `test_core`
#[derive(Default)]
pub struct TestCoreOpts {
    pub descriptor: Option<Descriptor>,
    /// Registered as the fixed result for the test tuple
    pub app: Option<Arc<dyn App>>,
    /// Registered as the fixed result for the `test` infrastructure type
    pub infra: Option<Arc<dyn Infrastructure>>,
    pub sink: Option<Arc<dyn OutputSink>>,
}

/// A valid configuration over a fresh temp dir.
///
/// Working directories are `compile`, `local` and `data` under the temp
/// dir, the store is a `FileDirectory` in `directory`, and the sink is a
/// logged `MockSink`. Stub plugins are registered for the test tuple and
/// the `test` infrastructure; both can still be replaced.
pub fn test_core_config() -> anyhow::Result<(CoreConfig, TempDir)> {
    let dir = tempfile::Builder::new().prefix("deckhand").tempdir()?;
    let root = dir.path();

    let apps = AppRegistry::default();
    apps.register(test_app_tuple(), || Ok(Arc::new(StubApp::new(TEST)) as Arc<dyn App>))?;
    let infrastructures = InfraRegistry::default();
    infrastructures.register(TEST.to_string(), || {
        Ok(Arc::new(StubInfra::new(TEST)) as Arc<dyn Infrastructure>)
    })?;

    let config = CoreConfig::new()
        .with_descriptor(test_descriptor())
        .with_compile_dir(root.join("compile"))
        .with_local_dir(root.join("local"))
        .with_data_dir(root.join("data"))
        .with_directory(Arc::new(FileDirectory::open(root.join("directory"))?))
        .with_sink(Arc::new(Layered::new(LogLayer::new(TEST), MockSink::new())))
        .with_apps(apps)
        .with_infrastructures(infrastructures);

    Ok((config, dir))
}

/// A `Core` built from `test_core_config` with `opts` applied.
///
/// Keep the returned `TempDir` alive for as long as the core is used.
pub fn test_core(opts: Option<TestCoreOpts>) -> anyhow::Result<(Core, TempDir)> {
    let (mut config, dir) = test_core_config()?;

    if let Some(opts) = opts {
        if let Some(descriptor) = opts.descriptor {
            config = config.with_descriptor(descriptor);
        }
        if let Some(app) = opts.app {
            config.apps.register_instance(test_app_tuple(), app)?;
        }
        if let Some(infra) = opts.infra {
            config.infrastructures.register_instance(TEST.to_string(), infra)?;
        }
        if let Some(sink) = opts.sink {
            config = config.with_sink(sink);
        }
    }

    let core = Core::new(config)?;
    Ok((core, dir))
}

/// Output sink that records every call as `mock:<level>:<text>`
#[derive(Default)]
pub struct MockSink {
    journal: Arc<Mutex<Vec<String>>>,
    answers: Mutex<VecDeque<Answer>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record into a journal shared with the caller
    pub fn with_journal(journal: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            journal,
            answers: Mutex::default(),
        }
    }

    /// Answers handed out by `ask`, in order. When they run out the
    /// prompt's default is used.
    pub fn with_answers(self, answers: impl IntoIterator<Item = Answer>) -> Self {
        *lock(&self.answers) = answers.into_iter().collect();
        self
    }

    pub fn journal(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.journal)
    }

    /// Snapshot of everything recorded so far
    pub fn messages(&self) -> Vec<String> {
        lock(&self.journal).clone()
    }

    fn record(&self, level: &str, text: &str) {
        lock(&self.journal).push(format!("mock:{}:{}", level, text));
    }
}

impl OutputSink for MockSink {
    fn info(&self, msg: &str) -> SinkResult<()> {
        self.record("info", msg);
        Ok(())
    }

    fn warn(&self, msg: &str) -> SinkResult<()> {
        self.record("warn", msg);
        Ok(())
    }

    fn error(&self, msg: &str) -> SinkResult<()> {
        self.record("error", msg);
        Ok(())
    }

    fn ask(&self, prompt: &Prompt) -> SinkResult<Answer> {
        self.record("ask", &prompt.query);
        lock(&self.answers)
            .pop_front()
            .or_else(|| prompt.default.clone())
            .ok_or_else(|| SinkError::NonInteractive {
                query: prompt.query.clone(),
            })
    }
}

/// Application plugin that records the phases it ran.
///
/// Each phase leaves a `<phase>.done` marker in the directory it was given
/// and its name under the key `last` in its scoped store.
pub struct StubApp {
    name: String,
    fail_on: Option<Phase>,
    calls: Mutex<Vec<Phase>>,
}

impl StubApp {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail_on: None,
            calls: Mutex::default(),
        }
    }

    /// Fail whenever `phase` runs
    pub fn failing_on(mut self, phase: Phase) -> Self {
        self.fail_on = Some(phase);
        self
    }

    pub fn calls(&self) -> Vec<Phase> {
        lock(&self.calls).clone()
    }

    fn step(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()> {
        lock(&self.calls).push(ctx.phase);
        if self.fail_on == Some(ctx.phase) {
            anyhow::bail!("{} refused to {}", self.name, ctx.phase);
        }

        fs::write(ctx.dir().join(format!("{}.done", ctx.phase)), &self.name)?;
        let version = match ctx.store.get("last") {
            Ok(record) => record.version,
            Err(err) if err.is_not_found() => Record::ABSENT,
            Err(err) => return Err(err.into()),
        };
        ctx.store.put("last", ctx.phase.as_str().as_bytes(), version)?;
        Ok(())
    }
}

impl App for StubApp {
    fn meta(&self) -> PluginMeta {
        PluginMeta::new(&self.name, env!("CARGO_PKG_VERSION"))
    }

    fn compile(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()> {
        self.step(ctx)
    }

    fn build(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()> {
        self.step(ctx)
    }

    fn deploy(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()> {
        self.step(ctx)
    }
}

/// Infrastructure plugin that records `(infra name, step)` per call
pub struct StubInfra {
    name: String,
    flavors: Vec<String>,
    failing: Vec<String>,
    rendezvous: Option<Arc<Barrier>>,
    calls: Mutex<Vec<(String, &'static str)>>,
}

impl StubInfra {
    /// Supports the `test`, `small` and `large` flavors
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flavors: vec![TEST.to_string(), "small".to_string(), "large".to_string()],
            failing: Vec::new(),
            rendezvous: None,
            calls: Mutex::default(),
        }
    }

    pub fn with_flavors(mut self, flavors: &[&str]) -> Self {
        self.flavors = flavors.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Fail every step for the declared infrastructure `infra_name`
    pub fn failing_for(mut self, infra_name: impl Into<String>) -> Self {
        self.failing.push(infra_name.into());
        self
    }

    /// Make `execute` wait on `barrier`; only returns if enough
    /// infrastructures are provisioned at the same time
    pub fn with_rendezvous(mut self, barrier: Arc<Barrier>) -> Self {
        self.rendezvous = Some(barrier);
        self
    }

    pub fn calls(&self) -> Vec<(String, &'static str)> {
        lock(&self.calls).clone()
    }

    fn step(&self, ctx: &PhaseContext<'_>, step: &'static str) -> anyhow::Result<()> {
        let infra_name = ctx.infra_name.unwrap_or(self.name.as_str()).to_string();
        lock(&self.calls).push((infra_name.clone(), step));
        if self.failing.contains(&infra_name) {
            anyhow::bail!("{} could not {}", infra_name, step);
        }
        fs::write(ctx.dir().join(format!("{}.done", step)), &infra_name)?;
        Ok(())
    }
}

impl Infrastructure for StubInfra {
    fn meta(&self) -> PluginMeta {
        PluginMeta::new(&self.name, env!("CARGO_PKG_VERSION"))
    }

    fn flavors(&self) -> Vec<String> {
        self.flavors.clone()
    }

    fn compile(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()> {
        self.step(ctx, "compile")
    }

    fn execute(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()> {
        if let Some(barrier) = &self.rendezvous {
            barrier.wait();
        }
        self.step(ctx, "execute")
    }

    fn destroy(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()> {
        self.step(ctx, "destroy")
    }
}
