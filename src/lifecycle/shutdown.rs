//! Shutdown coordination.

use std::path::Path;
use tokio::sync::broadcast;

use crate::config::PersistenceConfig;
use crate::health::persistence::{Journal, PersistenceError};
use crate::health::HealthService;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every subscriber. Subscribing afterwards never sees it.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Write the journal if persistence is enabled.
pub fn save_journal(service: &HealthService, config: &PersistenceConfig) -> Result<(), PersistenceError> {
    if !config.enabled {
        return Ok(());
    }
    Journal::capture(service).save_to_file(Path::new(&config.path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_all_subscribers() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[test]
    fn test_save_journal_disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.json");
        let config = PersistenceConfig {
            enabled: false,
            path: path.display().to_string(),
        };
        save_journal(&HealthService::with_system_clock(), &config).unwrap();
        assert!(!path.exists());
    }
}
