//! Environment aggregation.
//!
//! # Responsibilities
//! - Count entities per circuit state
//! - Classify overall environment health
//!
//! # Health Classification
//! ```text
//! Healthy:   every entity Closed (an empty environment is Healthy)
//! Degraded:  at least one HalfOpen, none Open
//! Unhealthy: at least one Open
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::circuit::{CircuitEntity, CircuitState};

/// Entity counts per circuit state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTotals {
    pub open: usize,
    pub closed: usize,
    pub half_open: usize,
}

impl StateTotals {
    pub fn total(&self) -> usize {
        self.open + self.closed + self.half_open
    }

    pub fn count(&self, state: CircuitState) -> usize {
        match state {
            CircuitState::Open => self.open,
            CircuitState::Closed => self.closed,
            CircuitState::HalfOpen => self.half_open,
        }
    }

    fn add(&mut self, state: CircuitState) {
        match state {
            CircuitState::Open => self.open += 1,
            CircuitState::Closed => self.closed += 1,
            CircuitState::HalfOpen => self.half_open += 1,
        }
    }
}

/// Overall environment health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl EnvironmentHealth {
    pub fn classify(totals: &StateTotals) -> Self {
        if totals.open > 0 {
            EnvironmentHealth::Unhealthy
        } else if totals.half_open > 0 {
            EnvironmentHealth::Degraded
        } else {
            EnvironmentHealth::Healthy
        }
    }
}

impl fmt::Display for EnvironmentHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnvironmentHealth::Healthy => "healthy",
            EnvironmentHealth::Degraded => "degraded",
            EnvironmentHealth::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Derived rollup of an environment's entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub totals: StateTotals,
    pub health: EnvironmentHealth,
}

impl Aggregate {
    /// Recompute from scratch over the given entities.
    pub fn compute<'a>(entities: impl IntoIterator<Item = &'a CircuitEntity>) -> Self {
        let mut totals = StateTotals::default();
        for entity in entities {
            totals.add(entity.state);
        }
        Self {
            totals,
            health: EnvironmentHealth::classify(&totals),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{BreakerSettings, EntityKind, Timestamp};

    fn entities(states: &[CircuitState]) -> Vec<CircuitEntity> {
        states
            .iter()
            .enumerate()
            .map(|(i, state)| {
                let mut e = CircuitEntity::new(
                    format!("svc-{}", i),
                    EntityKind::ModuleHealth,
                    BreakerSettings::default(),
                    Timestamp::from_millis(0),
                );
                e.state = *state;
                e
            })
            .collect()
    }

    #[test]
    fn test_totals_sum_to_entity_count() {
        use CircuitState::*;
        let list = entities(&[Closed, Open, HalfOpen, Closed, Open]);
        let aggregate = Aggregate::compute(&list);

        assert_eq!(aggregate.totals.open, 2);
        assert_eq!(aggregate.totals.closed, 2);
        assert_eq!(aggregate.totals.half_open, 1);
        assert_eq!(aggregate.totals.total(), list.len());
        assert_eq!(aggregate.totals.count(HalfOpen), 1);
    }

    #[test]
    fn test_health_classification() {
        use CircuitState::*;
        assert_eq!(Aggregate::compute(&entities(&[Closed, Closed])).health, EnvironmentHealth::Healthy);
        assert_eq!(Aggregate::compute(&entities(&[Closed, HalfOpen])).health, EnvironmentHealth::Degraded);
        assert_eq!(Aggregate::compute(&entities(&[HalfOpen, Open])).health, EnvironmentHealth::Unhealthy);
        assert_eq!(Aggregate::compute(&entities(&[])).health, EnvironmentHealth::Healthy);
    }
}
