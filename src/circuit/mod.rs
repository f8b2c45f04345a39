//! Circuit entity subsystem.
//!
//! # Data Flow
//! ```text
//! Observation (validated by the health service)
//!     → engine.rs (pure evaluation: state + observation + now → next state)
//!     → state.rs (entity fields updated from the evaluation)
//!     → store.rs (per-environment keyed storage)
//! ```
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     error rate > failure threshold
//! Open     → HalfOpen: cool-down elapsed since last state change
//! HalfOpen → Closed:   trial observation healthy
//! HalfOpen → Open:     trial observation breaches again
//!
//! ModuleStart entities skip HalfOpen:
//! Open → Closed when every dependency is Closed, Closed → Open otherwise
//! ```
//!
//! # Design Decisions
//! - The engine never reads a clock; `now` is always passed in
//! - Entity ids are unique within an environment regardless of kind
//! - Entities are never removed, only reset

pub mod clock;
pub mod engine;
pub mod state;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use engine::{evaluate, Dependencies, Evaluation};
pub use state::{
    BreakerSettings, CircuitEntity, CircuitState, EntityKind, Observation, ObservationError, SettingsError,
};
pub use store::EntityStore;
