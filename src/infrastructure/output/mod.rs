//! Output Sink Implementations
//!
//! Concrete implementations of the OutputSink port and the layers that can
//! be stacked on top of them.

mod console;
mod layered;
mod noop;

pub use console::ConsoleSink;
pub use layered::{HookLayer, Layered, LogLayer, SinkLayer, StoreLayer};
pub use noop::NoopSink;
