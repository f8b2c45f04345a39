//! Health snapshot service.
//!
//! # Responsibilities
//! - Provision entities per environment
//! - Ingest observations: validate, evaluate, update entity, aggregate
//!   and history as one unit
//! - Publish consistent snapshots for readers
//! - Administrative reset and cool-down expiry
//!
//! # Concurrency
//! ```text
//! environments: DashMap<name, Arc<EnvironmentCell>>
//!
//! EnvironmentCell
//!     state:     Mutex<EnvironmentState>   writers, one environment at a time
//!     published: ArcSwap<EnvironmentSnapshot>  readers, lock-free
//! ```
//! Every write runs under the environment mutex and ends by publishing
//! a new snapshot while still holding it, so readers see either the
//! previous or the next fully applied state. Different environments
//! never share a lock.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::circuit::engine::{self, REASON_MANUAL_RESET};
use crate::circuit::{
    BreakerSettings, CircuitEntity, CircuitState, Clock, Dependencies, EntityKind, EntityStore, Evaluation,
    Observation, SettingsError, SystemClock, Timestamp,
};
use crate::health::aggregate::Aggregate;
use crate::health::error::{HealthError, HealthResult};
use crate::health::history::{StateTransition, TransitionLog};
use crate::health::snapshot::EnvironmentSnapshot;
use crate::observability::metrics;

/// Default number of transitions carried in a snapshot.
pub const DEFAULT_RECENT_TRANSITIONS: usize = 20;

/// Result of an ingestion or reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The entity changed state. `cascaded` lists dependent ModuleStart
    /// entities that changed as a consequence.
    Transitioned {
        transition: StateTransition,
        cascaded: Vec<StateTransition>,
    },
    Unchanged { state: CircuitState },
}

impl IngestOutcome {
    pub fn is_transitioned(&self) -> bool {
        matches!(self, IngestOutcome::Transitioned { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Transitioned { .. } => "transitioned",
            IngestOutcome::Unchanged { .. } => "unchanged",
        }
    }
}

/// Mutable state of one environment. Only touched under its cell's mutex.
struct EnvironmentState {
    name: String,
    entities: EntityStore,
    history: TransitionLog,
    aggregate: Aggregate,
    version: u64,
}

struct EnvironmentCell {
    state: Mutex<EnvironmentState>,
    published: ArcSwap<EnvironmentSnapshot>,
}

impl EnvironmentCell {
    fn new(name: &str, now: Timestamp, recent_limit: usize) -> Self {
        let state = EnvironmentState {
            name: name.to_string(),
            entities: EntityStore::new(),
            history: TransitionLog::new(),
            aggregate: Aggregate::compute(std::iter::empty::<&CircuitEntity>()),
            version: 0,
        };
        let snapshot = state.build_snapshot(now, recent_limit);
        Self {
            state: Mutex::new(state),
            published: ArcSwap::from_pointee(snapshot),
        }
    }
}

impl EnvironmentState {
    /// Apply an evaluation to an entity and record the transition, if any.
    fn apply(
        &mut self,
        id: &str,
        evaluation: &Evaluation,
        now: Timestamp,
        sequence: &AtomicU64,
    ) -> Option<StateTransition> {
        let entity = self.entities.get_mut(id)?;
        let from_state = entity.apply(evaluation, now)?;
        let transition = StateTransition {
            sequence: sequence.fetch_add(1, Ordering::SeqCst),
            timestamp: now,
            environment: self.name.clone(),
            entity_id: entity.id.clone(),
            kind: entity.kind,
            from_state,
            to_state: entity.state,
            reason: evaluation.reason.clone().unwrap_or_default(),
        };
        self.record(&transition);
        Some(transition)
    }

    /// Append to history, log and count a transition.
    fn record(&mut self, transition: &StateTransition) {
        tracing::info!(
            environment = %transition.environment,
            entity = %transition.entity_id,
            kind = %transition.kind,
            from = %transition.from_state,
            to = %transition.to_state,
            reason = %transition.reason,
            "Circuit transition"
        );
        metrics::record_transition(transition);
        self.history.append(transition.clone());
    }

    /// Re-evaluate ModuleStart entities downstream of `changed`.
    fn cascade(&mut self, changed: &str, now: Timestamp, sequence: &AtomicU64) -> Vec<StateTransition> {
        let mut transitions = Vec::new();
        let mut queue: VecDeque<String> = self.entities.dependents_of(changed).into();
        let mut visited = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(evaluation) = self.evaluate_readiness(&id, now) else {
                continue;
            };
            if let Some(transition) = self.apply(&id, &evaluation, now, sequence) {
                queue.extend(self.entities.dependents_of(&id));
                transitions.push(transition);
            }
        }
        transitions
    }

    fn evaluate_readiness(&self, id: &str, now: Timestamp) -> Option<Evaluation> {
        let entity = self.entities.get(id)?;
        let dependencies = self.entities.resolve_dependencies(entity);
        Some(engine::evaluate(entity, &Observation::default(), &dependencies, now))
    }

    fn build_snapshot(&self, now: Timestamp, recent_limit: usize) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            environment: self.name.clone(),
            version: self.version,
            taken_at: now,
            entities: self.entities.list().cloned().collect(),
            totals: self.aggregate.totals,
            health: self.aggregate.health,
            recent_transitions: self.history.list_recent(recent_limit),
        }
    }
}

/// Owns all circuit state and serves snapshots.
pub struct HealthService {
    environments: DashMap<String, Arc<EnvironmentCell>>,
    clock: Arc<dyn Clock>,
    next_sequence: AtomicU64,
    recent_limit: usize,
}

impl HealthService {
    pub fn new(clock: Arc<dyn Clock>, recent_limit: usize) -> Self {
        Self {
            environments: DashMap::new(),
            clock,
            next_sequence: AtomicU64::new(1),
            recent_limit,
        }
    }

    /// Service on the wall clock with default snapshot depth.
    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock), DEFAULT_RECENT_TRANSITIONS)
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn recent_limit(&self) -> usize {
        self.recent_limit
    }

    /// Register an entity, or update the settings of an existing one.
    ///
    /// New ModuleStart entities start Open while any dependency is not
    /// Closed; every other entity starts Closed. Returns transitions of
    /// entities affected by the registration.
    pub fn register_entity(
        &self,
        environment: &str,
        kind: EntityKind,
        id: &str,
        settings: BreakerSettings,
    ) -> HealthResult<Vec<StateTransition>> {
        let invalid = |source| HealthError::InvalidSettings {
            environment: environment.to_string(),
            entity: id.to_string(),
            source,
        };
        settings.validate_for(id, kind).map_err(invalid)?;

        let now = self.clock.now();
        let cell = self.ensure_environment(environment, now);
        let mut state = cell.state.lock();

        if let Some(dependency) = settings
            .dependencies
            .iter()
            .find(|dep| state.entities.depends_on(dep, id))
        {
            return Err(invalid(SettingsError::DependencyCycle(dependency.clone())));
        }

        let mut transitions = Vec::new();
        match state.entities.get_mut(id) {
            Some(existing) if existing.kind != kind => {
                return Err(HealthError::EntityConflict {
                    environment: environment.to_string(),
                    entity: id.to_string(),
                    existing: existing.kind,
                    requested: kind,
                });
            }
            Some(existing) => {
                existing.settings = settings;
                tracing::debug!(environment, entity = id, "Entity settings updated");
                if kind == EntityKind::ModuleStart {
                    if let Some(evaluation) = state.evaluate_readiness(id, now) {
                        if let Some(t) = state.apply(id, &evaluation, now, &self.next_sequence) {
                            transitions.push(t);
                            transitions.extend(state.cascade(id, now, &self.next_sequence));
                        }
                    }
                }
            }
            None => {
                let mut entity = CircuitEntity::new(id, kind, settings, now);
                if kind == EntityKind::ModuleStart && !state.entities.resolve_dependencies(&entity).is_ready() {
                    entity.state = CircuitState::Open;
                }
                tracing::info!(environment, entity = id, kind = %kind, state = %entity.state, "Entity registered");
                state.entities.upsert(entity);
                transitions.extend(state.cascade(id, now, &self.next_sequence));
            }
        }

        self.commit(&cell, &mut state, now);
        Ok(transitions)
    }

    /// Ingest one observation for an entity.
    pub fn ingest_observation(
        &self,
        environment: &str,
        entity_id: &str,
        observation: Observation,
    ) -> HealthResult<IngestOutcome> {
        let cell = self.cell(environment).inspect_err(|e| metrics::record_rejected(e.label()))?;
        let mut state = cell.state.lock();
        let now = self.clock.now();

        let entity = state.entities.get(entity_id).ok_or_else(|| {
            metrics::record_rejected("unknown_entity");
            HealthError::UnknownEntity {
                environment: environment.to_string(),
                entity: entity_id.to_string(),
            }
        })?;

        if let Err(source) = observation.validate(entity.kind) {
            tracing::warn!(environment, entity = entity_id, error = %source, "Dropping invalid observation");
            metrics::record_rejected("invalid_observation");
            return Err(HealthError::InvalidObservation {
                environment: environment.to_string(),
                entity: entity_id.to_string(),
                source,
            });
        }

        let dependencies = if entity.kind == EntityKind::ModuleStart {
            state.entities.resolve_dependencies(entity)
        } else {
            Dependencies::ready()
        };
        let evaluation = engine::evaluate(entity, &observation, &dependencies, now);

        if let Some(entity) = state.entities.get_mut(entity_id) {
            entity.record_observation(&observation, now);
        }

        let outcome = match state.apply(entity_id, &evaluation, now, &self.next_sequence) {
            Some(transition) => {
                let cascaded = state.cascade(entity_id, now, &self.next_sequence);
                IngestOutcome::Transitioned { transition, cascaded }
            }
            None => IngestOutcome::Unchanged {
                state: evaluation.next_state,
            },
        };

        metrics::record_observation(environment, outcome.label());
        self.commit(&cell, &mut state, now);
        Ok(outcome)
    }

    /// Zero an entity's counters and force it Closed.
    pub fn reset_entity(&self, environment: &str, entity_id: &str) -> HealthResult<IngestOutcome> {
        let cell = self.cell(environment)?;
        let mut state = cell.state.lock();
        let now = self.clock.now();

        let entity = state.entities.get_mut(entity_id).ok_or_else(|| HealthError::UnknownEntity {
            environment: environment.to_string(),
            entity: entity_id.to_string(),
        })?;
        let kind = entity.kind;
        let previous = entity.reset(now);
        tracing::info!(environment, entity = entity_id, "Entity reset");

        let outcome = match previous {
            Some(from_state) => {
                let transition = StateTransition {
                    sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
                    timestamp: now,
                    environment: environment.to_string(),
                    entity_id: entity_id.to_string(),
                    kind,
                    from_state,
                    to_state: CircuitState::Closed,
                    reason: REASON_MANUAL_RESET.to_string(),
                };
                state.record(&transition);
                let cascaded = state.cascade(entity_id, now, &self.next_sequence);
                IngestOutcome::Transitioned { transition, cascaded }
            }
            None => IngestOutcome::Unchanged {
                state: CircuitState::Closed,
            },
        };

        self.commit(&cell, &mut state, now);
        Ok(outcome)
    }

    /// Move every Open circuit whose cool-down elapsed to HalfOpen.
    pub fn expire_cool_downs(&self) -> Vec<StateTransition> {
        let mut transitions = Vec::new();
        for cell in self.cells() {
            let mut state = cell.state.lock();
            let now = self.clock.now();

            let due: Vec<(String, Evaluation)> = state
                .entities
                .list()
                .map(|e| (e.id.clone(), engine::expire_cool_down(e, now)))
                .filter(|(_, evaluation)| evaluation.transitioned)
                .collect();
            if due.is_empty() {
                continue;
            }

            for (id, evaluation) in due {
                if let Some(t) = state.apply(&id, &evaluation, now, &self.next_sequence) {
                    transitions.push(t);
                    transitions.extend(state.cascade(&id, now, &self.next_sequence));
                }
            }
            self.commit(&cell, &mut state, now);
        }
        transitions
    }

    /// Latest published snapshot of an environment.
    pub fn snapshot(&self, environment: &str) -> HealthResult<Arc<EnvironmentSnapshot>> {
        Ok(self.cell(environment)?.published.load_full())
    }

    /// All known environment names, sorted.
    pub fn list_environments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.environments.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Most recent transitions of an environment, newest first.
    pub fn recent_transitions(&self, environment: &str, limit: usize) -> HealthResult<Vec<StateTransition>> {
        let cell = self.cell(environment)?;
        let state = cell.state.lock();
        Ok(state.history.list_recent(limit))
    }

    /// Most recent transitions of one entity, newest first.
    pub fn transitions_for_entity(
        &self,
        environment: &str,
        entity_id: &str,
        limit: usize,
    ) -> HealthResult<Vec<StateTransition>> {
        let cell = self.cell(environment)?;
        let state = cell.state.lock();
        if state.entities.get(entity_id).is_none() {
            return Err(HealthError::UnknownEntity {
                environment: environment.to_string(),
                entity: entity_id.to_string(),
            });
        }
        Ok(state.history.list_for_entity(entity_id, limit))
    }

    /// Entities and full history of an environment, history in insertion order.
    pub fn export_environment(&self, environment: &str) -> HealthResult<(Vec<CircuitEntity>, Vec<StateTransition>)> {
        let cell = self.cell(environment)?;
        let state = cell.state.lock();
        let entities = state.entities.list().cloned().collect();
        let history = state.history.iter().cloned().collect();
        Ok((entities, history))
    }

    /// Load previously exported entities and history into an environment.
    ///
    /// Restored entities replace registered ones with the same id;
    /// restored history is appended in sequence order.
    pub fn restore_environment(
        &self,
        environment: &str,
        entities: Vec<CircuitEntity>,
        mut history: Vec<StateTransition>,
    ) {
        let now = self.clock.now();
        let cell = self.ensure_environment(environment, now);
        let mut state = cell.state.lock();

        for entity in entities {
            state.entities.upsert(entity);
        }

        history.sort_by_key(|t| t.sequence);
        let after = state.history.last_sequence().unwrap_or(0);
        for transition in history.into_iter().filter(|t| t.sequence > after) {
            self.next_sequence.fetch_max(transition.sequence + 1, Ordering::SeqCst);
            state.history.append(transition);
        }

        tracing::info!(
            environment,
            entities = state.entities.len(),
            transitions = state.history.len(),
            "Environment restored"
        );
        self.commit(&cell, &mut state, now);
    }

    /// Recompute the aggregate and publish a new snapshot. Caller holds the lock.
    fn commit(&self, cell: &EnvironmentCell, state: &mut EnvironmentState, now: Timestamp) {
        state.aggregate = Aggregate::compute(state.entities.list());
        state.version += 1;
        debug_assert_eq!(state.aggregate.totals.total(), state.entities.len());
        metrics::record_entity_states(&state.name, &state.aggregate.totals);
        cell.published.store(Arc::new(state.build_snapshot(now, self.recent_limit)));
    }

    fn cell(&self, environment: &str) -> HealthResult<Arc<EnvironmentCell>> {
        self.environments
            .get(environment)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HealthError::UnknownEnvironment(environment.to_string()))
    }

    fn ensure_environment(&self, environment: &str, now: Timestamp) -> Arc<EnvironmentCell> {
        self.environments
            .entry(environment.to_string())
            .or_insert_with(|| {
                tracing::info!(environment, "Environment created");
                Arc::new(EnvironmentCell::new(environment, now, self.recent_limit))
            })
            .value()
            .clone()
    }

    fn cells(&self) -> Vec<Arc<EnvironmentCell>> {
        self.environments.iter().map(|e| e.value().clone()).collect()
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::with_system_clock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::ManualClock;
    use std::time::Duration;

    fn service() -> (HealthService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000_000)));
        let service = HealthService::new(clock.clone(), DEFAULT_RECENT_TRANSITIONS);
        (service, clock)
    }

    fn gate(deps: &[&str]) -> BreakerSettings {
        BreakerSettings {
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            ..BreakerSettings::default()
        }
    }

    #[test]
    fn test_register_then_snapshot() {
        let (service, _) = service();
        let cascaded = service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "auth-service", BreakerSettings::default())
            .unwrap();
        assert!(cascaded.is_empty());

        let snapshot = service.snapshot("PRODVIR").unwrap();
        let entity = snapshot.entity("auth-service").unwrap();
        assert_eq!(entity.state, CircuitState::Closed);
        assert_eq!(entity.failure_count, 0);
        assert_eq!(entity.success_count, 0);
        assert_eq!(snapshot.totals.closed, 1);
        assert!(snapshot.recent_transitions.is_empty());
    }

    #[test]
    fn test_unknown_entity_and_environment() {
        let (service, _) = service();
        let err = service
            .ingest_observation("PRODVIR", "ghost", Observation::with_error_rate(50.0))
            .unwrap_err();
        assert!(matches!(err, HealthError::UnknownEnvironment(_)));

        service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "auth-service", BreakerSettings::default())
            .unwrap();
        let err = service
            .ingest_observation("PRODVIR", "ghost", Observation::with_error_rate(50.0))
            .unwrap_err();
        assert!(matches!(err, HealthError::UnknownEntity { .. }));

        // Observations never create entities
        assert_eq!(service.snapshot("PRODVIR").unwrap().entities.len(), 1);
    }

    #[test]
    fn test_invalid_observation_changes_nothing() {
        let (service, _) = service();
        service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "auth-service", BreakerSettings::default())
            .unwrap();
        let before = service.snapshot("PRODVIR").unwrap();

        let err = service
            .ingest_observation("PRODVIR", "auth-service", Observation::with_error_rate(-5.0))
            .unwrap_err();
        assert!(matches!(err, HealthError::InvalidObservation { .. }));
        assert_eq!(service.snapshot("PRODVIR").unwrap().version, before.version);
    }

    #[test]
    fn test_entity_conflict() {
        let (service, _) = service();
        service
            .register_entity("PRODVIR", EntityKind::Resource, "TLDB", BreakerSettings::default())
            .unwrap();
        let err = service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "TLDB", BreakerSettings::default())
            .unwrap_err();
        assert!(matches!(err, HealthError::EntityConflict { .. }));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let (service, _) = service();
        let settings = BreakerSettings {
            failure_threshold: 150.0,
            ..BreakerSettings::default()
        };
        let err = service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "svc", settings)
            .unwrap_err();
        assert!(matches!(err, HealthError::InvalidSettings { .. }));
        assert!(service.list_environments().is_empty());
    }

    fn with_dependencies(deps: &[&str]) -> BreakerSettings {
        BreakerSettings {
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            ..BreakerSettings::default()
        }
    }

    #[test]
    fn test_dependency_rules_enforced_on_registration() {
        let (service, _) = service();
        service
            .register_entity("PRODVIR", EntityKind::Resource, "TLDB", BreakerSettings::default())
            .unwrap();

        let err = service
            .register_entity("PRODVIR", EntityKind::ModuleStart, "gate", with_dependencies(&["gate"]))
            .unwrap_err();
        assert!(matches!(
            err,
            HealthError::InvalidSettings { source: SettingsError::SelfDependency, .. }
        ));

        let err = service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "svc", with_dependencies(&["TLDB"]))
            .unwrap_err();
        assert!(matches!(
            err,
            HealthError::InvalidSettings { source: SettingsError::UnexpectedDependencies(EntityKind::ModuleHealth), .. }
        ));

        let snapshot = service.snapshot("PRODVIR").unwrap();
        assert!(snapshot.entity("gate").is_none());
        assert!(snapshot.entity("svc").is_none());
    }

    #[test]
    fn test_dependency_cycle_rejected() {
        let (service, _) = service();
        service
            .register_entity("PRODVIR", EntityKind::ModuleStart, "gate-a", with_dependencies(&["gate-b"]))
            .unwrap();
        service
            .register_entity("PRODVIR", EntityKind::ModuleStart, "gate-c", with_dependencies(&["gate-a"]))
            .unwrap();
        let version = service.snapshot("PRODVIR").unwrap().version;

        let err = service
            .register_entity("PRODVIR", EntityKind::ModuleStart, "gate-b", with_dependencies(&["gate-c"]))
            .unwrap_err();
        assert!(matches!(
            err,
            HealthError::InvalidSettings { source: SettingsError::DependencyCycle(ref dep), .. } if dep == "gate-c"
        ));
        assert_eq!(service.snapshot("PRODVIR").unwrap().version, version);

        // Re-registering an existing gate into a cycle is rejected too
        let err = service
            .register_entity("PRODVIR", EntityKind::ModuleStart, "gate-a", with_dependencies(&["gate-c"]))
            .unwrap_err();
        assert!(matches!(err, HealthError::InvalidSettings { .. }));
    }

    #[test]
    fn test_huge_counts_do_not_panic() {
        let (service, _) = service();
        service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "svc", BreakerSettings::default())
            .unwrap();
        let outcome = service
            .ingest_observation("PRODVIR", "svc", Observation::with_counts(u64::MAX, 2))
            .unwrap();
        assert!(outcome.is_transitioned());

        let snapshot = service.snapshot("PRODVIR").unwrap();
        let entity = snapshot.entity("svc").unwrap();
        assert_eq!(entity.state, CircuitState::Open);
        assert!((0.0..=100.0).contains(&entity.error_rate));
    }

    #[test]
    fn test_reregistration_keeps_state() {
        let (service, _) = service();
        service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "svc", BreakerSettings::default())
            .unwrap();
        service
            .ingest_observation("PRODVIR", "svc", Observation::with_error_rate(50.0))
            .unwrap();

        let settings = BreakerSettings {
            failure_threshold: 60.0,
            ..BreakerSettings::default()
        };
        service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "svc", settings)
            .unwrap();

        let snapshot = service.snapshot("PRODVIR").unwrap();
        let entity = snapshot.entity("svc").unwrap();
        assert_eq!(entity.state, CircuitState::Open);
        assert_eq!(entity.settings.failure_threshold, 60.0);
    }

    #[test]
    fn test_module_start_initial_state_and_cascade() {
        let (service, _) = service();
        service
            .register_entity("PRODVIR", EntityKind::ModuleStart, "AuthService", gate(&["TLDB"]))
            .unwrap();
        // Dependency not registered yet: gate starts Open without a history record
        let snapshot = service.snapshot("PRODVIR").unwrap();
        assert_eq!(snapshot.entity("AuthService").unwrap().state, CircuitState::Open);
        assert!(snapshot.recent_transitions.is_empty());

        // Registering the Closed dependency releases the gate
        let cascaded = service
            .register_entity("PRODVIR", EntityKind::Resource, "TLDB", BreakerSettings::default())
            .unwrap();
        assert_eq!(cascaded.len(), 1);
        assert_eq!(cascaded[0].entity_id, "AuthService");
        assert_eq!(cascaded[0].to_state, CircuitState::Closed);

        // Dependency failing closes the gate again in the same update
        let outcome = service
            .ingest_observation("PRODVIR", "TLDB", Observation::with_error_rate(40.0))
            .unwrap();
        let IngestOutcome::Transitioned { transition, cascaded } = outcome else {
            panic!("expected transition");
        };
        assert_eq!(transition.to_state, CircuitState::Open);
        assert_eq!(cascaded.len(), 1);
        assert_eq!(cascaded[0].reason, "dependency TLDB is not closed");

        let snapshot = service.snapshot("PRODVIR").unwrap();
        assert_eq!(snapshot.totals.open, 2);
        assert_eq!(snapshot.recent_transitions.len(), 3);
    }

    #[test]
    fn test_module_start_without_dependencies_is_closed() {
        let (service, _) = service();
        service
            .register_entity("VALFKT", EntityKind::ModuleStart, "Standalone", gate(&[]))
            .unwrap();
        let outcome = service
            .ingest_observation("VALFKT", "Standalone", Observation::default())
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Unchanged { state: CircuitState::Closed });
    }

    #[test]
    fn test_reset_records_only_real_changes() {
        let (service, _) = service();
        service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "svc", BreakerSettings::default())
            .unwrap();
        service
            .ingest_observation("PRODVIR", "svc", Observation::with_counts(5, 5))
            .unwrap();

        let outcome = service.reset_entity("PRODVIR", "svc").unwrap();
        let IngestOutcome::Transitioned { transition, .. } = outcome else {
            panic!("expected transition");
        };
        assert_eq!(transition.from_state, CircuitState::Open);
        assert_eq!(transition.reason, REASON_MANUAL_RESET);

        let snapshot = service.snapshot("PRODVIR").unwrap();
        let entity = snapshot.entity("svc").unwrap();
        assert_eq!(entity.failure_count, 0);
        assert_eq!(entity.success_count, 0);

        // Resetting a Closed entity records nothing
        assert!(!service.reset_entity("PRODVIR", "svc").unwrap().is_transitioned());
        assert_eq!(service.recent_transitions("PRODVIR", 10).unwrap().len(), 2);
    }

    #[test]
    fn test_expire_cool_downs() {
        let (service, clock) = service();
        service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "svc", BreakerSettings::default())
            .unwrap();
        service
            .ingest_observation("PRODVIR", "svc", Observation::with_error_rate(80.0))
            .unwrap();

        clock.advance(Duration::from_secs(10));
        assert!(service.expire_cool_downs().is_empty());

        clock.advance(Duration::from_secs(25));
        let expired = service.expire_cool_downs();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].to_state, CircuitState::HalfOpen);
        assert_eq!(service.snapshot("PRODVIR").unwrap().totals.half_open, 1);
    }

    #[test]
    fn test_sequences_increase_across_environments() {
        let (service, _) = service();
        for env in ["PRODVIR", "PRODFKT"] {
            service
                .register_entity(env, EntityKind::ModuleHealth, "svc", BreakerSettings::default())
                .unwrap();
            service
                .ingest_observation(env, "svc", Observation::with_error_rate(90.0))
                .unwrap();
        }
        let a = service.recent_transitions("PRODVIR", 1).unwrap();
        let b = service.recent_transitions("PRODFKT", 1).unwrap();
        assert!(a[0].sequence < b[0].sequence);
    }

    #[test]
    fn test_export_restore() {
        let (service, _) = service();
        service
            .register_entity("PRODVIR", EntityKind::ModuleHealth, "svc", BreakerSettings::default())
            .unwrap();
        service
            .ingest_observation("PRODVIR", "svc", Observation::with_error_rate(90.0))
            .unwrap();
        let (entities, history) = service.export_environment("PRODVIR").unwrap();

        let (restored, _) = self::service();
        restored.restore_environment("PRODVIR", entities, history);
        let snapshot = restored.snapshot("PRODVIR").unwrap();
        assert_eq!(snapshot.totals.open, 1);
        assert_eq!(snapshot.recent_transitions.len(), 1);

        // New transitions continue after the restored sequence
        restored.reset_entity("PRODVIR", "svc").unwrap();
        let recent = restored.recent_transitions("PRODVIR", 2).unwrap();
        assert!(recent[0].sequence > recent[1].sequence);
    }
}
