//! Health service error definitions.

use thiserror::Error;

use crate::circuit::{EntityKind, ObservationError, SettingsError};

/// Errors returned by the health service. None of them are fatal.
#[derive(Debug, Error)]
pub enum HealthError {
    /// Environment has never been provisioned.
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    /// Entity is not registered; observations never create entities.
    #[error("unknown entity {entity} in environment {environment}")]
    UnknownEntity { environment: String, entity: String },

    /// Observation violates basic constraints and was dropped.
    #[error("invalid observation for {entity} in {environment}: {source}")]
    InvalidObservation {
        environment: String,
        entity: String,
        #[source]
        source: ObservationError,
    },

    /// Registration carries settings that cannot drive a circuit.
    #[error("invalid settings for {entity} in {environment}: {source}")]
    InvalidSettings {
        environment: String,
        entity: String,
        #[source]
        source: SettingsError,
    },

    /// Entity id already registered under a different kind.
    #[error("entity {entity} in {environment} is already registered as {existing}, not {requested}")]
    EntityConflict {
        environment: String,
        entity: String,
        existing: EntityKind,
        requested: EntityKind,
    },

    /// Lost an optimistic update race. The locking service never returns
    /// this; callers that receive it should retry the ingestion once.
    #[error("concurrent update conflict on {entity} in {environment}")]
    ConcurrentUpdateConflict { environment: String, entity: String },
}

impl HealthError {
    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            HealthError::UnknownEnvironment(_) => "unknown_environment",
            HealthError::UnknownEntity { .. } => "unknown_entity",
            HealthError::InvalidObservation { .. } => "invalid_observation",
            HealthError::InvalidSettings { .. } => "invalid_settings",
            HealthError::EntityConflict { .. } => "entity_conflict",
            HealthError::ConcurrentUpdateConflict { .. } => "concurrent_update_conflict",
        }
    }
}

/// Result type for health service operations.
pub type HealthResult<T> = Result<T, HealthError>;
