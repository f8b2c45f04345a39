//! Transition engine.
//!
//! # Responsibilities
//! - Decide the next circuit state from the current entity, a fresh
//!   observation and the current time
//! - Produce the human-readable reason for every transition
//!
//! # Design Decisions
//! - Pure and deterministic: no clock reads, no I/O, no mutation
//! - Only a strictly greater error rate opens a circuit
//! - Observations are validated by the caller before evaluation

use crate::circuit::clock::Timestamp;
use crate::circuit::state::{CircuitEntity, CircuitState, EntityKind, Observation};

pub const REASON_COOL_DOWN: &str = "cool-down period elapsed, testing recovery";
pub const REASON_TRIAL_SUCCEEDED: &str = "trial request succeeded";
pub const REASON_TRIAL_FAILED: &str = "trial request failed, reopening";
pub const REASON_DEPENDENCIES_READY: &str = "all dependencies closed";
pub const REASON_MANUAL_RESET: &str = "manual reset";

/// Readiness of a ModuleStart entity's dependencies, resolved by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// Dependencies that are missing or not Closed, in id order.
    pub not_closed: Vec<String>,
}

impl Dependencies {
    pub fn ready() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.not_closed.is_empty()
    }
}

/// Outcome of evaluating one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub next_state: CircuitState,
    pub transitioned: bool,
    pub reason: Option<String>,
    /// Healthy HalfOpen trials after this evaluation.
    pub trial_successes: u32,
}

impl Evaluation {
    fn unchanged(entity: &CircuitEntity, trial_successes: u32) -> Self {
        Self {
            next_state: entity.state,
            transitioned: false,
            reason: None,
            trial_successes,
        }
    }

    fn to(next_state: CircuitState, reason: impl Into<String>) -> Self {
        Self {
            next_state,
            transitioned: true,
            reason: Some(reason.into()),
            trial_successes: 0,
        }
    }
}

/// Evaluate an entity against an observation at `now`.
pub fn evaluate(
    entity: &CircuitEntity,
    observation: &Observation,
    dependencies: &Dependencies,
    now: Timestamp,
) -> Evaluation {
    if entity.kind == EntityKind::ModuleStart {
        return evaluate_readiness(entity, dependencies);
    }

    match entity.state {
        CircuitState::Closed => match breach(entity, observation) {
            Some(reason) => Evaluation::to(CircuitState::Open, reason),
            None => Evaluation::unchanged(entity, 0),
        },
        CircuitState::Open => expire_cool_down(entity, now),
        CircuitState::HalfOpen => {
            if breach(entity, observation).is_some() {
                return Evaluation::to(CircuitState::Open, REASON_TRIAL_FAILED);
            }
            let trials = entity.trial_successes.saturating_add(1);
            if trials >= entity.settings.half_open_success_threshold {
                Evaluation::to(CircuitState::Closed, REASON_TRIAL_SUCCEEDED)
            } else {
                Evaluation::unchanged(entity, trials)
            }
        }
    }
}

/// Time-gated Open → HalfOpen step, independent of any observation.
pub fn expire_cool_down(entity: &CircuitEntity, now: Timestamp) -> Evaluation {
    let elapsed = now.saturating_since(entity.last_state_change);
    if entity.kind.is_rate_based()
        && entity.state == CircuitState::Open
        && elapsed >= entity.settings.cool_down()
    {
        Evaluation::to(CircuitState::HalfOpen, REASON_COOL_DOWN)
    } else {
        Evaluation::unchanged(entity, entity.trial_successes)
    }
}

fn evaluate_readiness(entity: &CircuitEntity, dependencies: &Dependencies) -> Evaluation {
    if dependencies.is_ready() {
        if entity.state == CircuitState::Closed {
            return Evaluation::unchanged(entity, 0);
        }
        return Evaluation::to(CircuitState::Closed, REASON_DEPENDENCIES_READY);
    }

    if entity.state == CircuitState::Open {
        return Evaluation::unchanged(entity, 0);
    }
    Evaluation::to(CircuitState::Open, blocked_reason(&dependencies.not_closed))
}

/// Reason a ModuleStart entity is held Open.
pub fn blocked_reason(not_closed: &[String]) -> String {
    match not_closed {
        [single] => format!("dependency {} is not closed", single),
        many => format!("dependencies {} are not closed", many.join(", ")),
    }
}

/// Breach description if the observation violates the entity's thresholds.
fn breach(entity: &CircuitEntity, observation: &Observation) -> Option<String> {
    let settings = &entity.settings;

    if let Some(rate) = observation.effective_error_rate() {
        if rate > settings.failure_threshold {
            let (rate, threshold) = percents(rate, settings.failure_threshold);
            return Some(format!("error rate exceeded threshold ({}% > {}%)", rate, threshold));
        }
    }

    if let (Some(latency), Some(limit)) = (observation.latency_ms, settings.slow_call_threshold_ms) {
        if latency > limit {
            return Some(format!("latency exceeded threshold ({}ms > {}ms)", latency, limit));
        }
    }

    None
}

/// Format two percentages with just enough decimals to tell them apart.
fn percents(a: f64, b: f64) -> (String, String) {
    for precision in 1..=6 {
        let (x, y) = (fixed(a, precision), fixed(b, precision));
        if x != y {
            return (x, y);
        }
    }
    (a.to_string(), b.to_string())
}

fn fixed(value: f64, precision: usize) -> String {
    let text = format!("{:.*}", precision, value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
