//! Domain Entities
//!
//! - `Descriptor` - The parsed deployment descriptor
//! - `Record` - A versioned directory store entry
//! - `RunRecord` - Per-tuple pipeline history kept in the run ledger

mod descriptor;
mod record;
mod run;

pub use descriptor::{ApplicationDecl, Descriptor, InfrastructureDecl};
pub use record::Record;
pub use run::{PhaseState, PhaseStatus, RunRecord};
