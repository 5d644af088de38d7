//! Application Layer
//!
//! Services built on the domain ports. They hold no state of their own;
//! everything durable goes through a `DirectoryStore`.
//!
//! - `RunLedger` - per-tuple run records with optimistic retry

pub mod ledger;

pub use ledger::{LedgerError, RunLedger};
