//! Telemetry feeds.
//!
//! Real deployments push observations through the HTTP API. The
//! simulated feed stands in for those agents during demos and local
//! runs by generating random observations for every registered entity.

pub mod simulated;

pub use simulated::SimulatedFeed;
