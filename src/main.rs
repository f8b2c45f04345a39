//! Circuit health service.
//!
//! # Architecture Overview
//!
//! ```text
//!   telemetry agents / simulated feed
//!            │ observations
//!            ▼
//!   ┌─────────────────┐     ┌────────────────────────────────────┐
//!   │   HTTP API      │────▶│          HealthService              │
//!   │ (axum, admin)   │     │  per environment:                   │
//!   └─────────────────┘     │   entities → engine → aggregate     │
//!            ▲              │   → history → published snapshot    │
//!            │ snapshots    └────────────────────────────────────┘
//!   dashboards / circuit-cli          ▲            ▲
//!                                     │            │
//!                         cool-down sweeper   config watcher
//! ```

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use circuit_health::admin::{self, AppState};
use circuit_health::config::{self, watcher::ConfigWatcher, HealthConfig};
use circuit_health::feed::SimulatedFeed;
use circuit_health::health::persistence::Journal;
use circuit_health::health::sweeper::CoolDownSweeper;
use circuit_health::health::HealthService;
use circuit_health::lifecycle::{save_journal, wait_for_shutdown_signal, Shutdown};
use circuit_health::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "circuit-health")]
#[command(about = "Circuit-breaker health snapshot service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Generate random observations for every entity.
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => HealthConfig::default(),
    };
    if args.simulate {
        config.simulation.enabled = true;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "circuit-health starting");
    tracing::info!(
        environments = config.environments.len(),
        admin_enabled = config.admin.enabled,
        persistence_enabled = config.persistence.enabled,
        simulation_enabled = config.simulation.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let service = Arc::new(HealthService::new(
        Arc::new(circuit_health::circuit::SystemClock),
        config.snapshot.recent_transitions,
    ));

    // Journal first so configured settings win over stored ones.
    if config.persistence.enabled {
        Journal::load_from_file(Path::new(&config.persistence.path))?.restore_into(&service);
    }
    let provisioned = config::provision(&service, &config);
    tracing::info!(entities = provisioned, "Entities provisioned");

    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => {
                    tasks.push(tokio::spawn(config::watcher::apply_updates(
                        service.clone(),
                        updates,
                        shutdown.subscribe(),
                    )));
                    Some(handle)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let sweeper = CoolDownSweeper::new(
        service.clone(),
        Duration::from_secs(config.snapshot.sweep_interval_secs),
    );
    tasks.push(tokio::spawn(sweeper.run(shutdown.subscribe())));

    if config.simulation.enabled {
        let feed = SimulatedFeed::new(service.clone(), &config.simulation);
        tasks.push(tokio::spawn(feed.run(shutdown.subscribe())));
    }

    if config.admin.enabled {
        let state = AppState::new(service.clone(), config.defaults.clone(), &config.admin.api_key);
        let admin_config = config.admin.clone();
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::run_api(&admin_config, state, rx).await {
                tracing::error!(error = %e, "HTTP API failed");
            }
        }));
    }

    wait_for_shutdown_signal().await;
    tracing::info!(tasks = shutdown.receiver_count(), "Shutting down");
    shutdown.trigger();

    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Background task ended abnormally");
        }
    }

    if let Err(e) = save_journal(&service, &config.persistence) {
        tracing::error!(error = %e, "Failed to save journal");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
