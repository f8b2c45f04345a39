//! Periodic cool-down expiry.
//!
//! # Responsibilities
//! - Move Open circuits to HalfOpen once their cool-down elapsed, even
//!   when no observation arrives for them

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::health::service::HealthService;

pub struct CoolDownSweeper {
    service: Arc<HealthService>,
    interval: Duration,
}

impl CoolDownSweeper {
    pub fn new(service: Arc<HealthService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Cool-down sweeper starting");

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let expired = self.service.expire_cool_downs();
                    if !expired.is_empty() {
                        tracing::debug!(count = expired.len(), "Cool-downs expired");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cool-down sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
