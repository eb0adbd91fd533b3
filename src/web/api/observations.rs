use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::perms::{can_delete, can_vet, PermissionContext};
use crate::scheduler::{Observation, VettedStatus};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{require, AppState, AuthenticatedUser};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ObservationsQuery {
    #[serde(default)]
    pub ground_station: Option<u32>,
    #[serde(default)]
    pub satellite: Option<u32>,
}

/// Permission facts of `user` for one observation.
fn observation_context(
    state: &AppState,
    user: &AuthenticatedUser,
    observation: &Observation,
) -> PermissionContext {
    let base = user.context(&state.stations);
    let is_owner = state
        .stations
        .station(observation.station_id)
        .map(|s| s.owner.as_deref() == Some(user.name.as_str()))
        .unwrap_or(false);
    PermissionContext {
        is_owner,
        is_author: observation.author == user.name,
        ..base
    }
}

#[utoipa::path(
    get,
    path = "/api/observations",
    tag = "observations",
    params(ObservationsQuery),
    responses(
        (status = 200, description = "Observations ordered by start", body = Vec<Observation>),
        (status = 401, description = "Missing or invalid API key")
    ),
    security(("api_key" = []))
)]
pub async fn list_observations(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<ObservationsQuery>,
) -> ApiResult<impl IntoResponse> {
    let observations = match query.ground_station {
        Some(station) => state.storage.get_observations(station)?,
        None => state.storage.all_observations()?,
    };

    let observations: Vec<Observation> = observations
        .into_iter()
        .filter(|o| query.satellite.map_or(true, |id| id == o.satellite_id))
        .collect();

    Ok(Json(observations))
}

#[utoipa::path(
    delete,
    path = "/api/observations/{id}",
    tag = "observations",
    params(("id" = String, Path, description = "Observation id")),
    responses(
        (status = 204, description = "Observation deleted"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Observation not found", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn delete_observation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let observation = state.storage.get_observation(&id)?;
    require(can_delete(&observation_context(&state, &user, &observation)))?;

    state.storage.delete_observation(&id)?;
    log::info!("Observation {} deleted by {}", id, user.name);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VetRequest {
    pub status: VettedStatus,
}

#[utoipa::path(
    post,
    path = "/api/observations/{id}/vet",
    tag = "observations",
    params(("id" = String, Path, description = "Observation id")),
    request_body = VetRequest,
    responses(
        (status = 200, description = "Observation vetted", body = Observation),
        (status = 400, description = "Observation has not ended yet", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Observation not found", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn vet_observation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<VetRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut observation = state.storage.get_observation(&id)?;
    require(can_vet(&observation_context(&state, &user, &observation)))?;

    let now = Utc::now();
    if observation.is_future(now) {
        return Err(ApiError::Validation(format!(
            "observation {} has not ended yet",
            id
        )));
    }

    observation.vet(request.status, &user.name, now);
    state.storage.update_observation(&observation)?;
    Ok(Json(observation))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JobsQuery {
    pub ground_station: u32,
}

/// What a station client needs to run one observation.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub ground_station: u32,
    pub tle0: String,
    pub tle1: String,
    pub tle2: String,
    pub frequency: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/jobs",
    tag = "observations",
    params(JobsQuery),
    responses(
        (status = 200, description = "Observations that have not started yet", body = Vec<JobResponse>),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Not the station owner"),
        (status = 404, description = "Unknown station", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<JobsQuery>,
) -> ApiResult<impl IntoResponse> {
    let station = state
        .stations
        .station(query.ground_station)
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    let is_owner = station.owner.as_deref() == Some(user.name.as_str());
    require(is_owner || user.superuser)?;

    let now = Utc::now();
    // The owner's client polling for jobs is the station's heartbeat.
    if is_owner {
        state
            .stations
            .record_heartbeat(station.id, now)
            .map_err(|e| ApiError::NotFound(e.to_string()))?;
    }

    let catalog = state.catalog.read().await;
    let jobs: Vec<JobResponse> = state
        .storage
        .get_observations(station.id)?
        .into_iter()
        .filter(|o| o.start >= now)
        .map(|o| {
            let frequency = catalog
                .satellite(o.satellite_id)
                .and_then(|s| s.transmitter(&o.transmitter_uuid))
                .and_then(|t| t.downlink_low);
            JobResponse {
                tle0: o.elements.name.clone(),
                tle1: o.elements.line1.clone(),
                tle2: o.elements.line2.clone(),
                id: o.id,
                start: o.start,
                end: o.end,
                ground_station: o.station_id,
                frequency,
            }
        })
        .collect();

    Ok(Json(jobs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::interval::Interval;
    use crate::scheduler::observation::tests::observation;
    use crate::web::auth::tests::{app_state, user};
    use chrono::Duration;
    use tempfile::TempDir;

    fn jobs_query() -> Query<JobsQuery> {
        Query(JobsQuery { ground_station: 1 })
    }

    #[tokio::test]
    async fn test_jobs_skip_observations_already_running() {
        let dir = TempDir::new().unwrap();
        let state = app_state(dir.path());
        let now = Utc::now();
        state
            .storage
            .commit_observations(&[
                observation(
                    "running",
                    1,
                    Interval::new(now - Duration::minutes(5), now + Duration::minutes(5)),
                ),
                observation(
                    "upcoming",
                    1,
                    Interval::new(now + Duration::hours(1), now + Duration::minutes(70)),
                ),
            ])
            .unwrap();

        let response = list_jobs(State(state), user("alice", false), jobs_query())
            .await
            .unwrap()
            .into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let jobs: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        let ids: Vec<&str> = jobs.iter().filter_map(|j| j["id"].as_str()).collect();
        assert_eq!(ids, vec!["upcoming"]);
        assert_eq!(jobs[0]["frequency"], 145_800_000);
    }

    #[tokio::test]
    async fn test_only_owner_polling_records_heartbeat() {
        let dir = TempDir::new().unwrap();
        let state = app_state(dir.path());

        list_jobs(State(state.clone()), user("root", true), jobs_query())
            .await
            .unwrap();
        assert!(state.stations.status(1, Utc::now()).unwrap().last_seen.is_none());

        assert!(
            list_jobs(State(state.clone()), user("mallory", false), jobs_query())
                .await
                .is_err()
        );

        list_jobs(State(state.clone()), user("alice", false), jobs_query())
            .await
            .unwrap();
        assert!(state.stations.status(1, Utc::now()).unwrap().last_seen.is_some());
    }
}
