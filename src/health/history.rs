//! Transition history log.
//!
//! # Responsibilities
//! - Record every circuit state change with its cause
//! - Serve recent transitions per environment and per entity
//!
//! # Design Decisions
//! - Append-only: there is no update or delete; corrections are new records
//! - Insertion order is canonical; listings are newest first

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::circuit::{CircuitState, EntityKind, Timestamp};

/// One recorded state change. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Service-wide insertion sequence.
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub environment: String,
    pub entity_id: String,
    pub kind: EntityKind,
    pub from_state: CircuitState,
    pub to_state: CircuitState,
    pub reason: String,
}

/// Append-only log for one environment.
#[derive(Debug, Clone, Default)]
pub struct TransitionLog {
    records: Vec<StateTransition>,
    by_entity: HashMap<String, Vec<usize>>,
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transition.
    pub fn append(&mut self, transition: StateTransition) {
        debug_assert!(
            self.records.last().map_or(true, |last| last.sequence < transition.sequence),
            "transition sequence must increase"
        );
        let index = self.records.len();
        self.by_entity
            .entry(transition.entity_id.clone())
            .or_default()
            .push(index);
        self.records.push(transition);
    }

    /// Most recent transitions, newest first.
    pub fn list_recent(&self, limit: usize) -> Vec<StateTransition> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    /// Most recent transitions of one entity, newest first.
    pub fn list_for_entity(&self, entity_id: &str, limit: usize) -> Vec<StateTransition> {
        let Some(indices) = self.by_entity.get(entity_id) else {
            return Vec::new();
        };
        indices
            .iter()
            .rev()
            .take(limit)
            .map(|&i| self.records[i].clone())
            .collect()
    }

    /// All records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &StateTransition> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.records.last().map(|r| r.sequence)
    }
}
