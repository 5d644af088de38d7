//! Directory store record

/// A versioned payload read from a directory store
///
/// Versions start at 1 on the first write and increase by one with every
/// successful update, across deletes: a recreated key never reuses a
/// version. Version 0 is reserved for "does not exist".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub payload: Vec<u8>,
    pub version: u64,
}

impl Record {
    /// Version callers pass to `put` when creating a key
    pub const ABSENT: u64 = 0;

    pub fn new(payload: Vec<u8>, version: u64) -> Self {
        Self { payload, version }
    }
}
