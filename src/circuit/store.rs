//! Entity storage for one environment.
//!
//! # Responsibilities
//! - Keep the entities of an environment keyed by id
//! - Resolve ModuleStart dependency readiness against sibling entities
//!
//! # Design Decisions
//! - Not synchronized itself: the health service owns one store per
//!   environment behind that environment's exclusive section, together
//!   with the aggregate and history it must stay consistent with
//! - BTreeMap keeps listings in stable id order

use std::collections::{BTreeMap, HashSet};

use crate::circuit::engine::Dependencies;
use crate::circuit::state::{CircuitEntity, CircuitState, EntityKind};

/// Entities of a single environment.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: BTreeMap<String, CircuitEntity>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&CircuitEntity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CircuitEntity> {
        self.entities.get_mut(id)
    }

    /// Insert or replace an entity. Returns the replaced entity.
    pub fn upsert(&mut self, entity: CircuitEntity) -> Option<CircuitEntity> {
        self.entities.insert(entity.id.clone(), entity)
    }

    /// All entities in id order.
    pub fn list(&self) -> impl Iterator<Item = &CircuitEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Dependencies of `entity` that are missing or not Closed.
    pub fn resolve_dependencies(&self, entity: &CircuitEntity) -> Dependencies {
        let not_closed = entity
            .dependencies()
            .iter()
            .filter(|dep| {
                self.entities
                    .get(dep.as_str())
                    .map_or(true, |e| e.state != CircuitState::Closed)
            })
            .cloned()
            .collect();
        Dependencies { not_closed }
    }

    /// Whether `from` reaches `target` by following ModuleStart dependencies.
    pub fn depends_on(&self, from: &str, target: &str) -> bool {
        let mut stack = vec![from];
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(entity) = self.entities.get(id) {
                stack.extend(entity.dependencies().iter().map(String::as_str));
            }
        }
        false
    }

    /// ModuleStart entities that list `id` as a dependency.
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        self.entities
            .values()
            .filter(|e| e.kind == EntityKind::ModuleStart && e.dependencies().contains(id))
            .map(|e| e.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::clock::Timestamp;
    use crate::circuit::state::BreakerSettings;

    fn entity(id: &str, kind: EntityKind) -> CircuitEntity {
        CircuitEntity::new(id, kind, BreakerSettings::default(), Timestamp::from_millis(0))
    }

    fn module_start(id: &str, deps: &[&str]) -> CircuitEntity {
        let settings = BreakerSettings {
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            ..BreakerSettings::default()
        };
        CircuitEntity::new(id, EntityKind::ModuleStart, settings, Timestamp::from_millis(0))
    }

    #[test]
    fn test_upsert_and_get() {
        let mut store = EntityStore::new();
        assert!(store.upsert(entity("TLDB", EntityKind::Resource)).is_none());
        assert!(store.upsert(entity("TLDB", EntityKind::Resource)).is_some());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("TLDB").map(|e| e.kind), Some(EntityKind::Resource));
        assert!(store.get("REDIS").is_none());
    }

    #[test]
    fn test_list_is_id_ordered() {
        let mut store = EntityStore::new();
        store.upsert(entity("b", EntityKind::ModuleHealth));
        store.upsert(entity("a", EntityKind::ModuleHealth));
        let ids: Vec<_> = store.list().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_resolve_dependencies() {
        let mut store = EntityStore::new();
        store.upsert(entity("TLDB", EntityKind::Resource));
        let mut redis = entity("REDIS", EntityKind::Resource);
        redis.state = CircuitState::HalfOpen;
        store.upsert(redis);

        let gate = module_start("AuthService", &["TLDB", "REDIS", "OPA"]);
        let deps = store.resolve_dependencies(&gate);
        // Missing and non-Closed dependencies both block, reported in id order
        assert_eq!(deps.not_closed, vec!["OPA".to_string(), "REDIS".to_string()]);

        let free = module_start("Standalone", &[]);
        assert!(store.resolve_dependencies(&free).is_ready());
    }

    #[test]
    fn test_dependents_of() {
        let mut store = EntityStore::new();
        store.upsert(entity("TLDB", EntityKind::Resource));
        store.upsert(module_start("AuthService", &["TLDB"]));
        store.upsert(module_start("OrderService", &["REDIS"]));

        assert_eq!(store.dependents_of("TLDB"), vec!["AuthService".to_string()]);
        assert!(store.dependents_of("OPA").is_empty());
    }

    #[test]
    fn test_depends_on_follows_chains() {
        let mut store = EntityStore::new();
        store.upsert(entity("TLDB", EntityKind::Resource));
        store.upsert(module_start("A", &["B"]));
        store.upsert(module_start("B", &["C", "TLDB"]));
        store.upsert(module_start("C", &["A"]));

        assert!(store.depends_on("A", "TLDB"));
        assert!(store.depends_on("C", "B"));
        assert!(store.depends_on("A", "A"));
        assert!(!store.depends_on("TLDB", "A"));
        assert!(!store.depends_on("OPA", "A"));
    }
}
