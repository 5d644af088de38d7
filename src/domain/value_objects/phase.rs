//! Pipeline phases and the working directories they use

use std::fmt;

use serde::{Deserialize, Serialize};

/// A stage of the deployment pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Generate plugin-specific artifacts into the compiled-artifact directory
    Compile,
    /// Provision every declared infrastructure
    Infra,
    /// Build the application
    Build,
    /// Deploy the built application onto the infrastructure
    Deploy,
}

impl Phase {
    /// All phases in pipeline order
    pub const ALL: [Phase; 4] = [Phase::Compile, Phase::Infra, Phase::Build, Phase::Deploy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Compile => "compile",
            Phase::Infra => "infra",
            Phase::Build => "build",
            Phase::Deploy => "deploy",
        }
    }

    /// Which working directory plugins write into during this phase
    pub fn work_dir(&self) -> WorkDir {
        match self {
            Phase::Compile => WorkDir::Compile,
            Phase::Infra | Phase::Build | Phase::Deploy => WorkDir::Local,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selector for one of the three configured working directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkDir {
    /// Compiled artifacts shared between phases
    Compile,
    /// Local runtime state (not meant to be shared)
    Local,
    /// Durable data that outlives a run
    Data,
}

impl WorkDir {
    pub const ALL: [WorkDir; 3] = [WorkDir::Compile, WorkDir::Local, WorkDir::Data];

    /// Name of the configuration option that sets this directory
    pub fn option_name(&self) -> &'static str {
        match self {
            WorkDir::Compile => "compile_dir",
            WorkDir::Local => "local_dir",
            WorkDir::Data => "data_dir",
        }
    }
}
