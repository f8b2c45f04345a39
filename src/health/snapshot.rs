//! Point-in-time environment snapshots.
//!
//! A snapshot is built once per committed update and published
//! atomically. Readers only ever hold a fully formed snapshot.

use serde::{Deserialize, Serialize};

use crate::circuit::{CircuitEntity, Timestamp};
use crate::health::aggregate::{EnvironmentHealth, StateTotals};
use crate::health::history::StateTransition;

/// Read-only view of one environment as of `taken_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub environment: String,
    /// Incremented on every committed change to the environment.
    pub version: u64,
    pub taken_at: Timestamp,
    pub entities: Vec<CircuitEntity>,
    pub totals: StateTotals,
    pub health: EnvironmentHealth,
    /// Newest first.
    pub recent_transitions: Vec<StateTransition>,
}

impl EnvironmentSnapshot {
    pub fn entity(&self, id: &str) -> Option<&CircuitEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// HalfOpen entities that have outlived their cool-down as of `now`.
    pub fn stale_entities(&self, now: Timestamp) -> Vec<&str> {
        self.entities
            .iter()
            .filter(|e| e.is_stale(now))
            .map(|e| e.id.as_str())
            .collect()
    }

    /// At most `limit` of the carried transitions, newest first.
    pub fn recent(&self, limit: usize) -> &[StateTransition] {
        let end = limit.min(self.recent_transitions.len());
        &self.recent_transitions[..end]
    }
}
