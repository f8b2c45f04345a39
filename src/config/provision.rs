//! Registration of configured environments and entities.

use crate::config::schema::HealthConfig;
use crate::health::HealthService;

/// Register every configured entity, returning how many were applied.
///
/// Entities are registered in file order. A module_start listed before
/// its dependencies starts Open and is re-evaluated as they arrive.
/// Failures are logged and skipped so one bad entry does not block the
/// rest.
pub fn provision(service: &HealthService, config: &HealthConfig) -> usize {
    let mut applied = 0;
    for env in &config.environments {
        for entity in &env.entities {
            let settings = entity.settings(&config.defaults);
            match service.register_entity(&env.name, entity.kind, &entity.id, settings) {
                Ok(_) => applied += 1,
                Err(e) => tracing::warn!(
                    environment = %env.name,
                    entity = %entity.id,
                    error = %e,
                    "Failed to provision entity"
                ),
            }
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitState;

    #[test]
    fn test_module_start_before_dependencies() {
        let config: HealthConfig = toml::from_str(
            r#"
            [[environments]]
            name = "PRODVIR"

            [[environments.entities]]
            id = "AuthService"
            kind = "module_start"
            dependencies = ["TLDB", "REDIS"]

            [[environments.entities]]
            id = "TLDB"
            kind = "resource"

            [[environments.entities]]
            id = "REDIS"
            kind = "resource"
            "#,
        )
        .unwrap();
        let service = HealthService::with_system_clock();
        assert_eq!(provision(&service, &config), 3);

        let snapshot = service.snapshot("PRODVIR").unwrap();
        assert_eq!(snapshot.entity("AuthService").unwrap().state, CircuitState::Closed);
        assert_eq!(snapshot.totals.closed, 3);
    }

    #[test]
    fn test_conflicting_kind_is_skipped() {
        let config: HealthConfig = toml::from_str(
            r#"
            [[environments]]
            name = "VALVIR"

            [[environments.entities]]
            id = "APP"
            kind = "resource"

            [[environments.entities]]
            id = "APP"
            kind = "module_health"
            "#,
        )
        .unwrap();
        let service = HealthService::with_system_clock();
        assert_eq!(provision(&service, &config), 1);
    }
}
