//! Plugin ports - application and infrastructure capability sets
//!
//! Concrete plugins live outside this crate. The core only resolves them,
//! hands each one a `PhaseContext`, and records what happened.

use std::path::{Path, PathBuf};

use super::{OutputSink, ScopedStore};
use crate::domain::value_objects::{AppTuple, Phase};

/// Identifying information a plugin reports about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMeta {
    pub name: String,
    pub version: String,
}

impl PluginMeta {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Everything a plugin may touch while running one phase
pub struct PhaseContext<'a> {
    pub phase: Phase,
    pub tuple: &'a AppTuple,
    /// For infrastructure plugins, the declared infrastructure name
    pub infra_name: Option<&'a str>,
    dir: PathBuf,
    pub sink: &'a dyn OutputSink,
    pub store: ScopedStore<'a>,
}

impl<'a> PhaseContext<'a> {
    pub fn new(
        phase: Phase,
        tuple: &'a AppTuple,
        dir: PathBuf,
        sink: &'a dyn OutputSink,
        store: ScopedStore<'a>,
    ) -> Self {
        Self {
            phase,
            tuple,
            infra_name: None,
            dir,
            sink,
            store,
        }
    }

    pub fn for_infra(mut self, name: &'a str) -> Self {
        self.infra_name = Some(name);
        self
    }

    /// Directory reserved for this plugin in this phase; it exists already
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Application plugin
pub trait App: Send + Sync {
    fn meta(&self) -> PluginMeta;

    /// Write whatever the later phases need into `ctx.dir()`
    fn compile(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()>;

    fn build(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()>;

    fn deploy(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()>;
}

/// Infrastructure plugin
pub trait Infrastructure: Send + Sync {
    fn meta(&self) -> PluginMeta;

    /// Flavors this infrastructure type supports
    fn flavors(&self) -> Vec<String>;

    fn compile(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()>;

    /// Provision the infrastructure
    fn execute(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()>;

    /// Tear the infrastructure down
    fn destroy(&self, ctx: &PhaseContext<'_>) -> anyhow::Result<()>;
}
