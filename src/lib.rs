//! Circuit health service library.
//!
//! Tracks circuit-breaker state for modules and shared resources across
//! deployment environments and serves consistent health snapshots.

pub mod circuit;
pub mod config;
pub mod health;

pub mod admin;
pub mod feed;
pub mod lifecycle;
pub mod observability;

pub use circuit::{CircuitState, EntityKind, Observation};
pub use config::HealthConfig;
pub use health::{HealthService, IngestOutcome};
pub use lifecycle::Shutdown;
