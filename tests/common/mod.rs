//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use circuit_health::circuit::{BreakerSettings, EntityKind, ManualClock, Timestamp};
use circuit_health::health::HealthService;

pub const ENV: &str = "PRODVIR";

/// Service driven by a manual clock starting at t=1_000_000ms.
pub fn manual_service() -> (Arc<ManualClock>, Arc<HealthService>) {
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000_000)));
    let service = Arc::new(HealthService::new(clock.clone(), 20));
    (clock, service)
}

pub fn settings(failure_threshold: f64, cool_down_secs: u64) -> BreakerSettings {
    BreakerSettings {
        failure_threshold,
        cool_down_secs,
        ..BreakerSettings::default()
    }
}

/// PRODVIR with the usual resources, two modules and a start gate on
/// TLDB and REDIS.
pub fn provision_prodvir(service: &HealthService) {
    for id in ["TLDB", "APP", "REDIS", "WV", "OPA"] {
        service
            .register_entity(ENV, EntityKind::Resource, id, settings(10.0, 30))
            .unwrap();
    }
    for id in ["auth-service", "user-service"] {
        service
            .register_entity(ENV, EntityKind::ModuleHealth, id, settings(10.0, 30))
            .unwrap();
    }
    let mut gate = settings(10.0, 30);
    gate.dependencies = ["TLDB".to_string(), "REDIS".to_string()].into_iter().collect();
    service
        .register_entity(ENV, EntityKind::ModuleStart, "auth-start", gate)
        .unwrap();
}
