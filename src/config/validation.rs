//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (dependencies reference entities in the
//!   same environment)
//! - Validate value ranges (thresholds within 0-100, cool-downs > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HealthConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::circuit::{CircuitEntity, EntityKind, EntityStore, SettingsError, Timestamp};
use crate::config::schema::HealthConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid defaults: {0}")]
    InvalidDefaults(SettingsError),

    #[error("environment name must not be empty")]
    EmptyEnvironmentName,

    #[error("duplicate environment {0}")]
    DuplicateEnvironment(String),

    #[error("duplicate entity {entity} in {environment}")]
    DuplicateEntity { environment: String, entity: String },

    #[error("entity {entity} in {environment}: {source}")]
    InvalidSettings {
        environment: String,
        entity: String,
        source: SettingsError,
    },

    #[error("entity {entity} in {environment} is {kind} and cannot have dependencies")]
    UnexpectedDependencies {
        environment: String,
        entity: String,
        kind: EntityKind,
    },

    #[error("entity {entity} in {environment} depends on itself")]
    SelfDependency { environment: String, entity: String },

    #[error("entity {entity} in {environment} depends on unknown entity {dependency}")]
    UnknownDependency {
        environment: String,
        entity: String,
        dependency: String,
    },

    #[error("entity {entity} in {environment} is part of a dependency cycle")]
    DependencyCycle { environment: String, entity: String },

    #[error("simulation failure probability {0} is outside 0-1")]
    InvalidProbability(f64),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &HealthConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if let Err(e) = config.defaults.settings().validate() {
        errors.push(ValidationError::InvalidDefaults(e));
    }

    if config.snapshot.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval("snapshot.sweep_interval_secs"));
    }
    if config.simulation.enabled && config.simulation.interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval("simulation.interval_secs"));
    }
    if !(0.0..=1.0).contains(&config.simulation.failure_probability) {
        errors.push(ValidationError::InvalidProbability(config.simulation.failure_probability));
    }

    let mut environment_names = HashSet::new();
    for env in &config.environments {
        if env.name.trim().is_empty() {
            errors.push(ValidationError::EmptyEnvironmentName);
        }
        if !environment_names.insert(env.name.as_str()) {
            errors.push(ValidationError::DuplicateEnvironment(env.name.clone()));
        }

        let ids: HashSet<&str> = env.entities.iter().map(|e| e.id.as_str()).collect();
        let mut seen = HashSet::new();
        for entity in &env.entities {
            if !seen.insert(entity.id.as_str()) {
                errors.push(ValidationError::DuplicateEntity {
                    environment: env.name.clone(),
                    entity: entity.id.clone(),
                });
            }

            if let Err(source) = entity.settings(&config.defaults).validate() {
                errors.push(ValidationError::InvalidSettings {
                    environment: env.name.clone(),
                    entity: entity.id.clone(),
                    source,
                });
            }

            if entity.kind != EntityKind::ModuleStart && !entity.dependencies.is_empty() {
                errors.push(ValidationError::UnexpectedDependencies {
                    environment: env.name.clone(),
                    entity: entity.id.clone(),
                    kind: entity.kind,
                });
            }

            for dependency in &entity.dependencies {
                if dependency == &entity.id {
                    errors.push(ValidationError::SelfDependency {
                        environment: env.name.clone(),
                        entity: entity.id.clone(),
                    });
                } else if !ids.contains(dependency.as_str()) {
                    errors.push(ValidationError::UnknownDependency {
                        environment: env.name.clone(),
                        entity: entity.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        let mut graph = EntityStore::new();
        for entity in &env.entities {
            graph.upsert(CircuitEntity::new(
                entity.id.clone(),
                entity.kind,
                entity.settings(&config.defaults),
                Timestamp::from_millis(0),
            ));
        }
        for entity in env.entities.iter().filter(|e| e.kind == EntityKind::ModuleStart) {
            let cyclic = entity
                .dependencies
                .iter()
                .filter(|dep| *dep != &entity.id)
                .any(|dep| graph.depends_on(dep, &entity.id));
            if cyclic {
                errors.push(ValidationError::DependencyCycle {
                    environment: env.name.clone(),
                    entity: entity.id.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
