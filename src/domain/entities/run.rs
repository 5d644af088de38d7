//! Run ledger entities
//!
//! One `RunRecord` is kept per app tuple. It remembers what the last run of
//! every phase did, which is what makes a pipeline resumable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Descriptor;
use crate::domain::value_objects::{AppTuple, Phase};

/// Outcome of the latest attempt at a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseState {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub state: PhaseState,
    /// How many times the phase has been started
    pub attempts: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub tuple: AppTuple,
    pub descriptor: Descriptor,
    #[serde(default)]
    pub phases: BTreeMap<Phase, PhaseStatus>,
}

impl RunRecord {
    pub fn new(tuple: AppTuple, descriptor: Descriptor) -> Self {
        Self {
            tuple,
            descriptor,
            phases: BTreeMap::new(),
        }
    }

    pub fn status(&self, phase: Phase) -> Option<&PhaseStatus> {
        self.phases.get(&phase)
    }

    pub fn succeeded(&self, phase: Phase) -> bool {
        matches!(
            self.status(phase),
            Some(PhaseStatus {
                state: PhaseState::Succeeded,
                ..
            })
        )
    }

    /// Mark a new attempt of `phase` as started
    pub fn start(&mut self, phase: Phase, now: DateTime<Utc>) {
        let attempts = self.status(phase).map(|s| s.attempts).unwrap_or(0) + 1;
        self.phases.insert(
            phase,
            PhaseStatus {
                state: PhaseState::Running,
                attempts,
                updated_at: now,
                error: None,
            },
        );
    }

    /// Record the end of the current attempt of `phase`
    pub fn finish(&mut self, phase: Phase, error: Option<String>, now: DateTime<Utc>) {
        let attempts = self.status(phase).map(|s| s.attempts).unwrap_or(1);
        let state = if error.is_some() {
            PhaseState::Failed
        } else {
            PhaseState::Succeeded
        };
        self.phases.insert(
            phase,
            PhaseStatus {
                state,
                attempts,
                updated_at: now,
                error,
            },
        );
    }
}
