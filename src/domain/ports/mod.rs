//! Domain Ports (Interfaces)
//!
//! These traits define the boundaries of the domain layer.
//! Infrastructure layer and external plugins provide implementations.

pub mod directory_store;
pub mod output_sink;
pub mod plugin;

pub use directory_store::{check_names, DirectoryStore, ScopedStore, StoreError, StoreResult};
pub use output_sink::{Answer, OutputSink, Prompt, PromptKind, SinkCall, SinkError, SinkResult};
pub use plugin::{App, Infrastructure, PhaseContext, PluginMeta};
