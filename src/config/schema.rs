//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! health service. All types derive Serde traits for deserialization
//! from TOML files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::circuit::{BreakerSettings, EntityKind};

/// Root configuration for the health service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HealthConfig {
    /// HTTP API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Breaker settings applied where an entity does not override them.
    pub defaults: BreakerDefaults,

    /// Snapshot and maintenance settings.
    pub snapshot: SnapshotConfig,

    /// Journal settings.
    pub persistence: PersistenceConfig,

    /// Simulated telemetry feed.
    pub simulation: SimulationConfig,

    /// Provisioned environments and their entities.
    pub environments: Vec<EnvironmentConfig>,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the HTTP API.
    pub enabled: bool,

    /// API key for mutating endpoints (Bearer token).
    pub api_key: String,

    /// API bind address.
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format (pretty, compact).
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Default breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerDefaults {
    /// Error rate percentage that must be exceeded to open a circuit.
    pub failure_threshold: f64,

    /// Seconds before an Open circuit admits trial observations.
    pub cool_down_secs: u64,

    /// Consecutive healthy trials needed to close from HalfOpen.
    pub half_open_success_threshold: u32,

    /// Latency in milliseconds above which a call counts as a breach.
    pub slow_call_threshold_ms: Option<u64>,
}

impl Default for BreakerDefaults {
    fn default() -> Self {
        let settings = BreakerSettings::default();
        Self {
            failure_threshold: settings.failure_threshold,
            cool_down_secs: settings.cool_down_secs,
            half_open_success_threshold: settings.half_open_success_threshold,
            slow_call_threshold_ms: settings.slow_call_threshold_ms,
        }
    }
}

impl BreakerDefaults {
    /// Settings of an entity that overrides nothing.
    pub fn settings(&self) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.failure_threshold,
            cool_down_secs: self.cool_down_secs,
            half_open_success_threshold: self.half_open_success_threshold,
            slow_call_threshold_ms: self.slow_call_threshold_ms,
            dependencies: BTreeSet::new(),
        }
    }
}

/// Snapshot and maintenance configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Transitions included in each snapshot.
    pub recent_transitions: usize,

    /// Interval of the cool-down sweeper in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            recent_transitions: 20,
            sweep_interval_secs: 5,
        }
    }
}

/// Journal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Load the journal at startup and write it on shutdown.
    pub enabled: bool,

    /// Journal file path.
    pub path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "circuit-journal.json".to_string(),
        }
    }
}

/// Simulated telemetry feed configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Generate random observations for every entity.
    pub enabled: bool,

    /// Seconds between rounds of observations.
    pub interval_secs: u64,

    /// Probability (0.0-1.0) that an observation breaches.
    pub failure_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 20,
            failure_probability: 0.2,
        }
    }
}

/// One environment and its entities.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvironmentConfig {
    /// Environment name (e.g., "PRODVIR").
    pub name: String,

    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

/// One provisioned entity. Unset fields fall back to `[defaults]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntityConfig {
    /// Entity identifier, unique within the environment.
    pub id: String,

    pub kind: EntityKind,

    pub failure_threshold: Option<f64>,

    pub cool_down_secs: Option<u64>,

    pub half_open_success_threshold: Option<u32>,

    pub slow_call_threshold_ms: Option<u64>,

    /// Entities that must be Closed first (module_start only).
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

impl EntityConfig {
    /// Resolve effective settings against the defaults.
    pub fn settings(&self, defaults: &BreakerDefaults) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.failure_threshold.unwrap_or(defaults.failure_threshold),
            cool_down_secs: self.cool_down_secs.unwrap_or(defaults.cool_down_secs),
            half_open_success_threshold: self
                .half_open_success_threshold
                .unwrap_or(defaults.half_open_success_threshold),
            slow_call_threshold_ms: self.slow_call_threshold_ms.or(defaults.slow_call_threshold_ms),
            dependencies: self.dependencies.clone(),
        }
    }
}
