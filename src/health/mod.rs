//! Health snapshot subsystem.
//!
//! # Data Flow
//! ```text
//! ingest_observation(env, entity, observation)
//!     → service.rs (validate, lock environment)
//!     → circuit::engine (evaluate)
//!     → entity update
//!     → aggregate.rs (recompute totals + health)
//!     → history.rs (append transition)
//!     → snapshot.rs (publish immutable snapshot)
//!
//! Background (sweeper.rs):
//!     Periodic timer
//!     → expire cool-downs (Open → HalfOpen)
//!
//! Startup / shutdown (persistence.rs):
//!     journal file ↔ entities + transitions
//! ```
//!
//! # Design Decisions
//! - Entity, aggregate and history change together or not at all
//! - Snapshots are copy-on-write; readers never take the writer lock
//! - Every error is non-fatal; the last published snapshot stays available

pub mod aggregate;
pub mod error;
pub mod history;
pub mod persistence;
pub mod service;
pub mod snapshot;
pub mod sweeper;

pub use aggregate::{Aggregate, EnvironmentHealth, StateTotals};
pub use error::{HealthError, HealthResult};
pub use history::{StateTransition, TransitionLog};
pub use service::{HealthService, IngestOutcome};
pub use snapshot::EnvironmentSnapshot;
