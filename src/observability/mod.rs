//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Health service and background tasks produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every transition is logged with environment, entity, from, to, reason
//! - Metrics are cheap and safe to record without an exporter

pub mod logging;
pub mod metrics;
