//! Circuit entity state.
//!
//! # Responsibilities
//! - Represent one monitored unit (module, resource, module-start sequence)
//! - Carry per-entity breaker settings
//! - Apply evaluations and observations to the entity's fields

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::circuit::clock::Timestamp;
use crate::circuit::engine::Evaluation;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const ALL: [CircuitState; 3] = [CircuitState::Closed, CircuitState::Open, CircuitState::HalfOpen];

    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of unit an entity monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A service module tracked by call error rate.
    ModuleHealth,
    /// A backing resource (database, cache, policy engine).
    Resource,
    /// A readiness gate over other entities.
    ModuleStart,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::ModuleHealth => "module_health",
            EntityKind::Resource => "resource",
            EntityKind::ModuleStart => "module_start",
        }
    }

    /// Whether the entity follows the failure-rate circuit (with HalfOpen).
    pub fn is_rate_based(self) -> bool {
        !matches!(self, EntityKind::ModuleStart)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-entity breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Error rate percentage that must be strictly exceeded to open.
    pub failure_threshold: f64,

    /// Seconds an Open circuit waits before probing recovery.
    pub cool_down_secs: u64,

    /// Consecutive healthy trials required to close from HalfOpen.
    pub half_open_success_threshold: u32,

    /// Latency above this counts as a breach.
    pub slow_call_threshold_ms: Option<u64>,

    /// Entities that must be Closed before a ModuleStart entity closes.
    pub dependencies: BTreeSet<String>,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 10.0,
            cool_down_secs: 30,
            half_open_success_threshold: 1,
            slow_call_threshold_ms: None,
            dependencies: BTreeSet::new(),
        }
    }
}

/// Breaker settings that cannot drive a circuit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("failure threshold {0} is outside 0-100")]
    ThresholdOutOfRange(f64),

    #[error("cool-down must be at least one second")]
    ZeroCoolDown,

    #[error("half-open success threshold must be at least 1")]
    ZeroTrialThreshold,

    #[error("{0} entities cannot have dependencies")]
    UnexpectedDependencies(EntityKind),

    #[error("entity cannot depend on itself")]
    SelfDependency,

    #[error("dependency on {0} would form a cycle")]
    DependencyCycle(String),
}

impl BreakerSettings {
    pub fn cool_down(&self) -> Duration {
        Duration::from_secs(self.cool_down_secs)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(0.0..=100.0).contains(&self.failure_threshold) {
            return Err(SettingsError::ThresholdOutOfRange(self.failure_threshold));
        }
        if self.cool_down_secs == 0 {
            return Err(SettingsError::ZeroCoolDown);
        }
        if self.half_open_success_threshold == 0 {
            return Err(SettingsError::ZeroTrialThreshold);
        }
        Ok(())
    }

    /// Validate settings for a specific entity, including its dependency list.
    pub fn validate_for(&self, id: &str, kind: EntityKind) -> Result<(), SettingsError> {
        self.validate()?;
        if kind != EntityKind::ModuleStart && !self.dependencies.is_empty() {
            return Err(SettingsError::UnexpectedDependencies(kind));
        }
        if self.dependencies.contains(id) {
            return Err(SettingsError::SelfDependency);
        }
        Ok(())
    }
}

/// One health observation for an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Observation {
    /// Failed call percentage over the observation window.
    pub error_rate: Option<f64>,
    /// Failed calls in the window.
    pub failures: u64,
    /// Successful calls in the window.
    pub successes: u64,
    pub latency_ms: Option<u64>,
    /// Open connections (resources).
    pub connection_count: Option<u64>,
    /// Most recent error description, if any.
    pub error: Option<String>,
}

/// Reasons an observation is rejected before evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("error rate {0} is outside 0-100")]
    ErrorRateOutOfRange(f64),

    #[error("observation carries neither an error rate nor call counts")]
    MissingHealthData,
}

impl Observation {
    /// Observation with an explicit error rate.
    pub fn with_error_rate(error_rate: f64) -> Self {
        Self {
            error_rate: Some(error_rate),
            ..Self::default()
        }
    }

    /// Observation built from call counts.
    pub fn with_counts(failures: u64, successes: u64) -> Self {
        Self {
            failures,
            successes,
            ..Self::default()
        }
    }

    /// Error rate to evaluate: explicit if given, otherwise derived from counts.
    pub fn effective_error_rate(&self) -> Option<f64> {
        if let Some(rate) = self.error_rate {
            return Some(rate);
        }
        if self.failures == 0 && self.successes == 0 {
            return None;
        }
        let failures = self.failures as f64;
        Some(failures / (failures + self.successes as f64) * 100.0)
    }

    /// Check basic constraints for an entity of the given kind.
    pub fn validate(&self, kind: EntityKind) -> Result<(), ObservationError> {
        match self.effective_error_rate() {
            Some(rate) if !(0.0..=100.0).contains(&rate) => Err(ObservationError::ErrorRateOutOfRange(rate)),
            None if kind.is_rate_based() => Err(ObservationError::MissingHealthData),
            _ => Ok(()),
        }
    }
}

/// A monitored unit with its own circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitEntity {
    pub id: String,
    pub kind: EntityKind,
    pub state: CircuitState,
    pub error_rate: f64,
    pub failure_count: u64,
    pub success_count: u64,
    pub connection_count: u64,
    pub latency_ms: Option<u64>,
    pub last_state_change: Timestamp,
    pub last_observed: Option<Timestamp>,
    pub last_error: Option<String>,
    /// Healthy trials seen since entering HalfOpen.
    pub trial_successes: u32,
    pub settings: BreakerSettings,
}

impl CircuitEntity {
    /// Create a Closed entity with zeroed counters.
    pub fn new(id: impl Into<String>, kind: EntityKind, settings: BreakerSettings, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            kind,
            state: CircuitState::Closed,
            error_rate: 0.0,
            failure_count: 0,
            success_count: 0,
            connection_count: 0,
            latency_ms: None,
            last_state_change: now,
            last_observed: None,
            last_error: None,
            trial_successes: 0,
            settings,
        }
    }

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.settings.dependencies
    }

    /// A HalfOpen entity older than its cool-down is due for re-evaluation.
    pub fn is_stale(&self, now: Timestamp) -> bool {
        self.state == CircuitState::HalfOpen
            && now.saturating_since(self.last_state_change) > self.settings.cool_down()
    }

    /// Record the measured fields of an observation.
    pub fn record_observation(&mut self, observation: &Observation, now: Timestamp) {
        if let Some(rate) = observation.effective_error_rate() {
            self.error_rate = rate;
        }
        self.failure_count = self.failure_count.saturating_add(observation.failures);
        self.success_count = self.success_count.saturating_add(observation.successes);
        if let Some(connections) = observation.connection_count {
            self.connection_count = connections;
        }
        if observation.latency_ms.is_some() {
            self.latency_ms = observation.latency_ms;
        }
        if observation.error.is_some() {
            self.last_error = observation.error.clone();
        }
        self.last_observed = Some(now);
    }

    /// Apply an engine evaluation. Returns the previous state when it changed.
    pub fn apply(&mut self, evaluation: &Evaluation, now: Timestamp) -> Option<CircuitState> {
        self.trial_successes = evaluation.trial_successes;
        if !evaluation.transitioned {
            return None;
        }
        let previous = self.state;
        self.state = evaluation.next_state;
        self.last_state_change = now;
        Some(previous)
    }

    /// Zero counters and force Closed. Returns the previous state when it changed.
    pub fn reset(&mut self, now: Timestamp) -> Option<CircuitState> {
        self.error_rate = 0.0;
        self.failure_count = 0;
        self.success_count = 0;
        self.trial_successes = 0;
        self.last_error = None;
        if self.state == CircuitState::Closed {
            return None;
        }
        let previous = self.state;
        self.state = CircuitState::Closed;
        self.last_state_change = now;
        Some(previous)
    }
}
