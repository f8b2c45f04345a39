use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AppState;
use crate::circuit::{CircuitEntity, Observation, Timestamp};
use crate::config::EntityConfig;
use crate::health::{
    EnvironmentHealth, HealthError, IngestOutcome, StateTotals, StateTransition,
};

impl IntoResponse for HealthError {
    fn into_response(self) -> Response {
        let status = match &self {
            HealthError::UnknownEnvironment(_) | HealthError::UnknownEntity { .. } => StatusCode::NOT_FOUND,
            HealthError::InvalidObservation { .. } | HealthError::InvalidSettings { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            HealthError::EntityConflict { .. } | HealthError::ConcurrentUpdateConflict { .. } => {
                StatusCode::CONFLICT
            }
        };
        let body = Json(serde_json::json!({
            "error": self.label(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub environments: usize,
    pub now: Timestamp,
}

#[derive(Serialize)]
pub struct EnvironmentSummary {
    pub name: String,
    pub health: EnvironmentHealth,
    pub totals: StateTotals,
    pub version: u64,
}

#[derive(Serialize)]
pub struct EntityView<'a> {
    #[serde(flatten)]
    pub entity: &'a CircuitEntity,
    /// HalfOpen for longer than its cool-down.
    pub stale: bool,
}

#[derive(Serialize)]
pub struct SnapshotView<'a> {
    pub environment: &'a str,
    pub version: u64,
    pub taken_at: Timestamp,
    pub health: EnvironmentHealth,
    pub totals: &'a StateTotals,
    pub entities: Vec<EntityView<'a>>,
    pub recent_transitions: &'a [StateTransition],
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub entity: Option<CircuitEntity>,
    pub transitions: Vec<StateTransition>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        environments: state.service.list_environments().len(),
        now: state.service.now(),
    })
}

pub async fn list_environments(State(state): State<AppState>) -> Json<Vec<EnvironmentSummary>> {
    let summaries = state
        .service
        .list_environments()
        .into_iter()
        .filter_map(|name| {
            let snapshot = state.service.snapshot(&name).ok()?;
            Some(EnvironmentSummary {
                name,
                health: snapshot.health,
                totals: snapshot.totals,
                version: snapshot.version,
            })
        })
        .collect();
    Json(summaries)
}

pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(env): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Response, HealthError> {
    let snapshot = state.service.snapshot(&env)?;
    let stale = snapshot.stale_entities(state.service.now());
    let limit = query.limit.unwrap_or(snapshot.recent_transitions.len());

    let view = SnapshotView {
        environment: &snapshot.environment,
        version: snapshot.version,
        taken_at: snapshot.taken_at,
        health: snapshot.health,
        totals: &snapshot.totals,
        entities: snapshot
            .entities
            .iter()
            .map(|entity| EntityView {
                entity,
                stale: stale.contains(&entity.id.as_str()),
            })
            .collect(),
        recent_transitions: snapshot.recent(limit),
    };
    Ok(Json(view).into_response())
}

pub async fn get_transitions(
    State(state): State<AppState>,
    Path(env): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<StateTransition>>, HealthError> {
    let limit = query.limit.unwrap_or(state.service.recent_limit());
    Ok(Json(state.service.recent_transitions(&env, limit)?))
}

pub async fn get_entity_transitions(
    State(state): State<AppState>,
    Path((env, id)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<StateTransition>>, HealthError> {
    let limit = query.limit.unwrap_or(state.service.recent_limit());
    Ok(Json(state.service.transitions_for_entity(&env, &id, limit)?))
}

pub async fn post_observation(
    State(state): State<AppState>,
    Path((env, id)): Path<(String, String)>,
    Json(observation): Json<Observation>,
) -> Result<Json<IngestOutcome>, HealthError> {
    Ok(Json(state.service.ingest_observation(&env, &id, observation)?))
}

pub async fn register_entity(
    State(state): State<AppState>,
    Path(env): Path<String>,
    Json(request): Json<EntityConfig>,
) -> Result<(StatusCode, Json<RegisterResponse>), HealthError> {
    let settings = request.settings(&state.defaults);
    let transitions = state
        .service
        .register_entity(&env, request.kind, &request.id, settings)?;
    let entity = state
        .service
        .snapshot(&env)?
        .entity(&request.id)
        .cloned();
    Ok((StatusCode::CREATED, Json(RegisterResponse { entity, transitions })))
}

pub async fn reset_entity(
    State(state): State<AppState>,
    Path((env, id)): Path<(String, String)>,
) -> Result<Json<IngestOutcome>, HealthError> {
    Ok(Json(state.service.reset_entity(&env, &id)?))
}
