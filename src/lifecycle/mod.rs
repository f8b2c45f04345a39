//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Init logging/metrics → Load journal → Provision
//!     → Spawn watcher, sweeper, feed, API
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → Background tasks exit → Save journal
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::{save_journal, Shutdown};
pub use signals::wait_for_shutdown_signal;
