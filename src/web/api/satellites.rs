use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::catalog::{Catalog, Satellite, SatelliteStatus};
use crate::predict::{satellite_position, SubPoint};
use crate::scheduler::stats::satellite_stats;
use crate::scheduler::SatelliteStats;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{AppState, AuthenticatedUser};

#[derive(Debug, Serialize, ToSchema)]
pub struct SatelliteResponse {
    pub norad_id: u32,
    pub name: String,
    pub status: SatelliteStatus,
    pub schedulable: bool,
    /// Epoch of the loaded element set, if any.
    pub tle_epoch: Option<DateTime<Utc>>,
    pub element_set: Option<u32>,
    #[serde(flatten)]
    pub stats: SatelliteStats,
}

impl SatelliteResponse {
    fn new(satellite: &Satellite, catalog: &Catalog, stats: SatelliteStats) -> Self {
        let elements = catalog.elements(satellite.norad_id).ok();
        SatelliteResponse {
            norad_id: satellite.norad_id,
            name: satellite.name.clone(),
            status: satellite.status,
            schedulable: satellite.is_schedulable(),
            tle_epoch: elements.and_then(|e| e.epoch().ok()),
            element_set: elements.and_then(|e| e.element_set_number()),
            stats,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/satellites",
    tag = "satellites",
    responses(
        (status = 200, description = "Satellites with elements and tallies", body = Vec<SatelliteResponse>),
        (status = 401, description = "Missing or invalid API key")
    ),
    security(("api_key" = []))
)]
pub async fn list_satellites(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    let observations = state.storage.all_observations()?;
    let mut stats = satellite_stats(&observations);

    let catalog = state.catalog.read().await;
    let satellites: Vec<SatelliteResponse> = catalog
        .satellites()
        .map(|s| {
            let tallies = stats.remove(&s.norad_id).unwrap_or_default();
            SatelliteResponse::new(s, &catalog, tallies)
        })
        .collect();
    Ok(Json(satellites))
}

#[utoipa::path(
    get,
    path = "/api/satellites/{id}/position",
    tag = "satellites",
    params(("id" = u32, Path, description = "NORAD catalog number")),
    responses(
        (status = 200, description = "Current sub-satellite point", body = SubPoint),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Unknown satellite or no elements", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_satellite_position(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<u32>,
) -> ApiResult<impl IntoResponse> {
    let catalog = state.catalog.read().await;
    if catalog.satellite(id).is_none() {
        return Err(ApiError::NotFound(format!("Unknown satellite {}", id)));
    }
    let position = satellite_position(catalog.elements(id)?, Utc::now())?;
    Ok(Json(position))
}
