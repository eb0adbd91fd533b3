use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::perms::can_schedule;
use crate::scheduler::service::pass_windows;
use crate::scheduler::{BookableWindow, PassQuery, StationWindows};
use crate::time_format;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{AppState, AuthenticatedUser};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PassesQuery {
    /// NORAD catalog number.
    pub satellite: u32,
    /// Transmitter uuid.
    pub transmitter: String,
    #[serde(with = "time_format::wire")]
    #[param(value_type = String, example = "2024-03-01 09:50:00.000000")]
    pub start: DateTime<Utc>,
    #[serde(with = "time_format::wire")]
    #[param(value_type = String)]
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub station: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WindowResponse {
    #[serde(with = "time_format::wire")]
    #[schema(value_type = String)]
    pub start: DateTime<Utc>,
    #[serde(with = "time_format::wire")]
    #[schema(value_type = String)]
    pub end: DateTime<Utc>,
    pub az_start: f64,
}

impl From<&BookableWindow> for WindowResponse {
    fn from(w: &BookableWindow) -> Self {
        WindowResponse {
            start: w.start,
            end: w.end,
            az_start: w.rise_azimuth_deg,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationPassesResponse {
    pub id: u32,
    pub name: String,
    pub window: Vec<WindowResponse>,
}

impl From<&StationWindows> for StationPassesResponse {
    fn from(s: &StationWindows) -> Self {
        StationPassesResponse {
            id: s.id,
            name: s.name.clone(),
            window: s.windows.iter().map(WindowResponse::from).collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/passes",
    tag = "scheduling",
    params(PassesQuery),
    responses(
        (status = 200, description = "Free pass windows per station", body = Vec<StationPassesResponse>),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Unknown satellite, transmitter or station", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_pass_windows(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PassesQuery>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let scheduling = &state.config.scheduling;

    let catalog = state.catalog.read().await;
    let windows = pass_windows(
        &*catalog,
        &*state.stations,
        &*state.storage,
        &PassQuery {
            satellite_id: query.satellite,
            transmitter_uuid: query.transmitter,
            start: query.start,
            end: query.end,
            station: query.station,
        },
        now,
        scheduling.min_start_lead,
    )?;

    // Only stations the caller could book on.
    let mut response = Vec::with_capacity(windows.len());
    for station in &windows {
        let status = state
            .stations
            .status(station.id, now)
            .map_err(|e| ApiError::NotFound(e.to_string()))?;
        if can_schedule(&user.station_context(&state.stations, &status)) {
            response.push(StationPassesResponse::from(station));
        }
    }

    Ok(Json(response))
}
