//! Metrics collection and exposition.
//!
//! # Metrics
//! - `circuit_observations_total` (counter): ingested observations by environment, outcome
//! - `circuit_transitions_total` (counter): state changes by environment, from, to
//! - `circuit_entities` (gauge): entities per environment and state
//! - `circuit_rejected_observations_total` (counter): dropped observations by reason
//!
//! # Design Decisions
//! - Uses the `metrics` facade; without an installed recorder every call is a no-op
//! - Prometheus exporter serves its own HTTP listener

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::circuit::CircuitState;
use crate::health::aggregate::StateTotals;
use crate::health::history::StateTransition;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_observation(environment: &str, outcome: &'static str) {
    metrics::counter!(
        "circuit_observations_total",
        "environment" => environment.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_rejected(reason: &'static str) {
    metrics::counter!("circuit_rejected_observations_total", "reason" => reason).increment(1);
}

pub fn record_transition(transition: &StateTransition) {
    metrics::counter!(
        "circuit_transitions_total",
        "environment" => transition.environment.clone(),
        "from" => transition.from_state.as_str(),
        "to" => transition.to_state.as_str()
    )
    .increment(1);
}

pub fn record_entity_states(environment: &str, totals: &StateTotals) {
    for state in CircuitState::ALL {
        metrics::gauge!(
            "circuit_entities",
            "environment" => environment.to_string(),
            "state" => state.as_str()
        )
        .set(totals.count(state) as f64);
    }
}
