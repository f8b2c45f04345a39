//! Random observation generator.
//!
//! # Responsibilities
//! - Every interval, ingest one observation per rate-based entity
//! - Breach with a configured probability so circuits actually move
//!
//! ModuleStart entities are skipped; their state follows dependencies.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::circuit::Observation;
use crate::config::SimulationConfig;
use crate::health::HealthService;

pub struct SimulatedFeed {
    service: Arc<HealthService>,
    interval: Duration,
    failure_probability: f64,
    rng: fastrand::Rng,
}

impl SimulatedFeed {
    pub fn new(service: Arc<HealthService>, config: &SimulationConfig) -> Self {
        Self {
            service,
            interval: Duration::from_secs(config.interval_secs),
            failure_probability: config.failure_probability,
            rng: fastrand::Rng::new(),
        }
    }

    /// Use a fixed seed for reproducible rounds.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            failure_probability = self.failure_probability,
            "Simulated feed starting"
        );

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let ingested = self.tick();
                    tracing::debug!(ingested, "Simulated feed round complete");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Simulated feed received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Ingest one round of observations, returning how many were accepted.
    pub fn tick(&mut self) -> usize {
        let mut ingested = 0;
        for environment in self.service.list_environments() {
            let Ok(snapshot) = self.service.snapshot(&environment) else {
                continue;
            };
            for entity in snapshot.entities.iter().filter(|e| e.kind.is_rate_based()) {
                let observation = self.generate();
                match self.service.ingest_observation(&environment, &entity.id, observation) {
                    Ok(_) => ingested += 1,
                    Err(e) => tracing::warn!(
                        environment = %environment,
                        entity = %entity.id,
                        error = %e,
                        "Simulated observation rejected"
                    ),
                }
            }
        }
        ingested
    }

    fn generate(&mut self) -> Observation {
        let breach = self.rng.f64() < self.failure_probability;
        let total = self.rng.u64(50..=500);
        let rate = if breach {
            30.0 + self.rng.f64() * 70.0
        } else {
            self.rng.f64() * 5.0
        };
        let failures = ((total as f64) * rate / 100.0).round() as u64;

        let mut observation = Observation::with_counts(failures, total - failures);
        observation.latency_ms = Some(self.rng.u64(20..=800));
        observation.connection_count = Some(self.rng.u64(1..=64));
        if breach {
            observation.error = Some("simulated upstream failure".to_string());
        }
        observation
    }
}
