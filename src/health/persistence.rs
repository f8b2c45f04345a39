//! Journal of entities and transition history.
//!
//! Written on graceful shutdown and read back on startup so a restarted
//! service keeps its circuit states and audit trail. Aggregates are not
//! stored; they are recomputed on restore.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::circuit::CircuitEntity;
use crate::health::history::StateTransition;
use crate::health::service::HealthService;

/// Errors reading or writing the journal.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Stored state of one environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub name: String,
    pub entities: Vec<CircuitEntity>,
    /// Insertion order.
    pub transitions: Vec<StateTransition>,
}

/// Everything needed to rebuild the service state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Journal {
    pub environments: Vec<EnvironmentRecord>,
}

impl Journal {
    /// Capture the current state of every environment.
    pub fn capture(service: &HealthService) -> Self {
        let environments = service
            .list_environments()
            .into_iter()
            .filter_map(|name| {
                let (entities, transitions) = service.export_environment(&name).ok()?;
                Some(EnvironmentRecord {
                    name,
                    entities,
                    transitions,
                })
            })
            .collect();
        Self { environments }
    }

    /// Load all environments into the service.
    pub fn restore_into(self, service: &HealthService) {
        for record in self.environments {
            service.restore_environment(&record.name, record.entities, record.transitions);
        }
    }

    /// Read a journal; a missing file yields an empty journal.
    pub fn load_from_file(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No journal found, starting empty");
            return Ok(Self::default());
        }
        let reader = BufReader::new(File::open(path)?);
        let journal: Journal = serde_json::from_reader(reader)?;
        tracing::info!(
            path = %path.display(),
            environments = journal.environments.len(),
            "Loaded journal"
        );
        Ok(journal)
    }

    /// Write the journal next to `path` and rename it into place, so an
    /// interrupted save leaves the previous journal intact.
    pub fn save_to_file(&self, path: &Path) -> Result<(), PersistenceError> {
        let staging = staging_path(path);
        if let Err(e) = self.write_synced(&staging) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        fs::rename(&staging, path)?;
        tracing::info!(
            path = %path.display(),
            environments = self.environments.len(),
            "Saved journal"
        );
        Ok(())
    }

    fn write_synced(&self, path: &Path) -> Result<(), PersistenceError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{BreakerSettings, CircuitState, EntityKind, Observation};

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::load_from_file(&dir.path().join("absent.json")).unwrap();
        assert!(journal.environments.is_empty());
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.json");

        let service = HealthService::with_system_clock();
        service
            .register_entity("PRODVIR", EntityKind::Resource, "TLDB", BreakerSettings::default())
            .unwrap();
        service
            .ingest_observation("PRODVIR", "TLDB", Observation::with_error_rate(35.0))
            .unwrap();
        Journal::capture(&service).save_to_file(&path).unwrap();

        let restored = HealthService::with_system_clock();
        Journal::load_from_file(&path).unwrap().restore_into(&restored);

        let snapshot = restored.snapshot("PRODVIR").unwrap();
        assert_eq!(snapshot.entity("TLDB").unwrap().state, CircuitState::Open);
        assert_eq!(snapshot.totals.open, 1);
        assert_eq!(snapshot.recent_transitions.len(), 1);
    }

    #[test]
    fn test_save_replaces_existing_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.json");
        fs::write(&path, "stale contents from an interrupted run").unwrap();

        let service = HealthService::with_system_clock();
        service
            .register_entity("VALVIR", EntityKind::Resource, "REDIS", BreakerSettings::default())
            .unwrap();
        Journal::capture(&service).save_to_file(&path).unwrap();

        let journal = Journal::load_from_file(&path).unwrap();
        assert_eq!(journal.environments[0].name, "VALVIR");
        assert!(!staging_path(&path).exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_failed_save_keeps_previous_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.json");
        Journal::default().save_to_file(&path).unwrap();

        // A directory in the staging slot makes the write fail.
        fs::create_dir(staging_path(&path)).unwrap();
        let service = HealthService::with_system_clock();
        service
            .register_entity("VALVIR", EntityKind::Resource, "REDIS", BreakerSettings::default())
            .unwrap();
        assert!(matches!(
            Journal::capture(&service).save_to_file(&path),
            Err(PersistenceError::Io(_))
        ));

        assert!(Journal::load_from_file(&path).unwrap().environments.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Journal::load_from_file(&path), Err(PersistenceError::Format(_))));
    }
}
