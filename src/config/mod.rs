//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HealthConfig (validated, immutable)
//!     → provision.rs (register environments and entities)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → provision.rs adds or updates entities
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Reload never removes entities; circuit state survives edits

pub mod loader;
pub mod provision;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use provision::provision;
pub use schema::{
    AdminConfig, BreakerDefaults, EntityConfig, EnvironmentConfig, HealthConfig,
    ObservabilityConfig, PersistenceConfig, SimulationConfig, SnapshotConfig,
};
pub use validation::{validate_config, ValidationError};
