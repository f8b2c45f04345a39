//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! request
//!     → TraceLayer / TimeoutLayer
//!     → auth.rs (mutating admin routes only)
//!     → handlers.rs
//!     → HealthService
//!     → JSON response (errors mapped to status codes)
//! ```
//!
//! # Design Decisions
//! - Reads are public; registration and reset need the API key
//! - Observation ingestion is public so telemetry agents need no key
//! - Snapshot reads never wait on environment writers

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use self::auth::require_api_key;
use self::handlers::*;
use crate::config::{AdminConfig, BreakerDefaults};
use crate::health::HealthService;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<HealthService>,
    pub defaults: Arc<BreakerDefaults>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(service: Arc<HealthService>, defaults: BreakerDefaults, api_key: &str) -> Self {
        Self {
            service,
            defaults: Arc::new(defaults),
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_router(state: AppState, request_timeout: Duration) -> Router {
    let admin = Router::new()
        .route("/api/v1/environments/{env}/entities", post(register_entity))
        .route("/api/v1/environments/{env}/entities/{id}/reset", post(reset_entity))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/environments", get(list_environments))
        .route("/api/v1/environments/{env}/snapshot", get(get_snapshot))
        .route("/api/v1/environments/{env}/transitions", get(get_transitions))
        .route(
            "/api/v1/environments/{env}/entities/{id}/transitions",
            get(get_entity_transitions),
        )
        .route(
            "/api/v1/environments/{env}/entities/{id}/observations",
            post(post_observation),
        )
        .merge(admin)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until shutdown is signalled.
pub async fn run_api(
    config: &AdminConfig,
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "HTTP API starting");

    let app = setup_router(state, Duration::from_secs(config.request_timeout_secs));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("HTTP API stopped");
    Ok(())
}
