use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::perms::can_schedule;
use crate::scheduler::service::schedule_batch;
use crate::scheduler::{BatchRequest, ObservationRequest, SchedulingError};
use crate::time_format;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{AppState, AuthenticatedUser};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestedObservation {
    pub station: u32,
    #[serde(with = "time_format::wire")]
    #[schema(value_type = String, example = "2024-03-01 09:50:00.000000")]
    pub start: DateTime<Utc>,
    #[serde(with = "time_format::wire")]
    #[schema(value_type = String)]
    pub end: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScheduleRequest {
    /// NORAD catalog number.
    pub satellite: u32,
    /// Transmitter uuid.
    pub transmitter: String,
    pub observations: Vec<RequestedObservation>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduleResponse {
    pub ids: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/api/schedule",
    tag = "scheduling",
    request_body = ScheduleRequest,
    responses(
        (status = 201, description = "All observations scheduled", body = ScheduleResponse),
        (status = 400, description = "Invalid request, nothing scheduled", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 403, description = "Not allowed to schedule on a station"),
        (status = 404, description = "Unknown satellite, transmitter or station", body = ErrorResponse),
        (status = 409, description = "Overlaps an existing observation, nothing scheduled", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn submit_batch(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ScheduleRequest>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();

    for (index, observation) in request.observations.iter().enumerate() {
        let status = state
            .stations
            .status(observation.station, now)
            .map_err(|e| SchedulingError::from(e).in_batch(index))?;
        if !can_schedule(&user.station_context(&state.stations, &status)) {
            return Err(SchedulingError::PermissionDenied(status.id)
                .in_batch(index)
                .into());
        }
    }

    let batch = BatchRequest {
        satellite_id: request.satellite,
        transmitter_uuid: request.transmitter,
        author: user.name.clone(),
        observations: request
            .observations
            .iter()
            .map(|o| ObservationRequest {
                station_id: o.station,
                start: o.start,
                end: o.end,
            })
            .collect(),
    };

    let ids = run_batch(state, batch, now).await?;
    Ok((StatusCode::CREATED, Json(ScheduleResponse { ids })))
}

/// Schedule `batch` on the blocking pool. Station locks may wait on another
/// batch that is propagating and writing files.
async fn run_batch(
    state: AppState,
    batch: BatchRequest,
    now: DateTime<Utc>,
) -> ApiResult<Vec<String>> {
    let ids = tokio::task::spawn_blocking(move || {
        let catalog = state.catalog.blocking_read();
        schedule_batch(
            &*catalog,
            &*state.stations,
            &*state.storage,
            &state.locks,
            &state.config.scheduling.limits(),
            &batch,
            now,
        )
    })
    .await
    .map_err(|e| ApiError::Internal(format!("scheduling task failed: {}", e)))??;
    Ok(ids)
}
