use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::predict::{PassReport, SearchWindow};
use crate::scheduler::service::{station_passes, station_windows};
use crate::scheduler::stats::station_stats;
use crate::scheduler::{BookableWindow, StationStats};
use crate::station::StationStatus;
use crate::time_format;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{AppState, AuthenticatedUser};

#[derive(Debug, Serialize, ToSchema)]
pub struct StationResponse {
    #[serde(flatten)]
    pub status: StationStatus,
    #[serde(flatten)]
    pub stats: StationStats,
}

#[utoipa::path(
    get,
    path = "/api/stations",
    tag = "stations",
    responses(
        (status = 200, description = "Stations with state and success rate", body = Vec<StationResponse>),
        (status = 401, description = "Missing or invalid API key")
    ),
    security(("api_key" = []))
)]
pub async fn list_stations(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    let observations = state.storage.all_observations()?;
    let mut stats = station_stats(&observations);
    let stations: Vec<StationResponse> = state
        .stations
        .statuses(Utc::now())
        .into_iter()
        .map(|status| StationResponse {
            stats: stats.remove(&status.id).unwrap_or_default(),
            status,
        })
        .collect();
    Ok(Json(stations))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StationPassesQuery {
    /// `1` lists satellites whose downlinks the station cannot receive too.
    #[serde(default)]
    pub unsupported_frequencies: Option<u8>,
}

#[utoipa::path(
    get,
    path = "/api/stations/{id}/passes",
    tag = "stations",
    params(
        ("id" = u32, Path, description = "Station id"),
        StationPassesQuery
    ),
    responses(
        (status = 200, description = "Upcoming passes over the station", body = Vec<PassReport>),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Unknown station", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_station_passes(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<u32>,
    Query(query): Query<StationPassesQuery>,
) -> ApiResult<impl IntoResponse> {
    let scheduling = &state.config.scheduling;
    let catalog = state.catalog.read().await;
    let passes = station_passes(
        &*catalog,
        &*state.stations,
        id,
        Utc::now(),
        scheduling.upcoming_end,
        scheduling.min_start_lead,
        query.unsupported_frequencies == Some(1),
    )?;
    Ok(Json(passes))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StationWindowsQuery {
    /// Absolute time or `now+1h`. Defaults to now.
    #[serde(default)]
    pub start: Option<String>,
    /// Defaults to the end of the upcoming pass list.
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FreeWindowResponse {
    pub satellite: u32,
    #[serde(with = "time_format::wire")]
    #[schema(value_type = String)]
    pub start: DateTime<Utc>,
    #[serde(with = "time_format::wire")]
    #[schema(value_type = String)]
    pub end: DateTime<Utc>,
    pub az_start: f64,
    pub max_altitude: f64,
    /// False when the window starts too soon to be booked.
    pub valid: bool,
}

impl From<BookableWindow> for FreeWindowResponse {
    fn from(w: BookableWindow) -> Self {
        FreeWindowResponse {
            satellite: w.satellite_id,
            start: w.start,
            end: w.end,
            az_start: w.rise_azimuth_deg,
            max_altitude: w.max_altitude_deg,
            valid: w.valid,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/stations/{id}/windows",
    tag = "stations",
    params(
        ("id" = u32, Path, description = "Station id"),
        StationWindowsQuery
    ),
    responses(
        (status = 200, description = "Free windows", body = Vec<FreeWindowResponse>),
        (status = 400, description = "Invalid time range", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Unknown station", body = ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_station_windows(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<u32>,
    Query(query): Query<StationWindowsQuery>,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    let scheduling = &state.config.scheduling;
    let parse = |value: Option<&str>, default: DateTime<Utc>| match value {
        Some(s) => time_format::parse_time(s, now).map_err(ApiError::Validation),
        None => Ok(default),
    };
    let search = SearchWindow {
        start: parse(query.start.as_deref(), now)?,
        end: parse(query.end.as_deref(), now + scheduling.upcoming_end)?,
        now,
        min_start_lead: scheduling.min_start_lead,
    };

    let catalog = state.catalog.read().await;
    let windows = station_windows(
        &*catalog,
        &*state.stations,
        &*state.storage,
        id,
        &search,
    )?;
    Ok(Json(
        windows
            .into_iter()
            .map(FreeWindowResponse::from)
            .collect::<Vec<_>>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::elements::tests::iss;
    use crate::scheduler::interval::tests::iv;
    use crate::scheduler::observation::tests::observation;
    use crate::scheduler::VettedStatus;
    use crate::web::auth::tests::{app_state, user};
    use tempfile::TempDir;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn windows_query(start: Option<String>, end: Option<String>) -> Query<StationWindowsQuery> {
        Query(StationWindowsQuery { start, end })
    }

    #[tokio::test]
    async fn test_stations_report_success_rate() {
        let dir = TempDir::new().unwrap();
        let state = app_state(dir.path());
        let mut good = observation("good", 1, iv(10, 0, 10, 10));
        good.vet(VettedStatus::Good, "carol", good.end);
        let mut bad = observation("bad", 1, iv(11, 0, 11, 10));
        bad.vet(VettedStatus::Bad, "carol", bad.end);
        state.storage.commit_observations(&[good, bad]).unwrap();

        let response = list_stations(State(state), user("bob", false))
            .await
            .unwrap()
            .into_response();
        let stations = body_json(response).await;

        assert_eq!(stations[0]["id"], 1);
        assert_eq!(stations[0]["state"], "offline");
        assert_eq!(stations[0]["observations_count"], 2);
        assert_eq!(stations[0]["success_rate"], 50);
    }

    #[tokio::test]
    async fn test_station_windows_of_all_satellites() {
        let dir = TempDir::new().unwrap();
        let state = app_state(dir.path());
        state.stations.record_heartbeat(1, Utc::now()).unwrap();
        let start = iss().epoch().unwrap();
        let end = start + chrono::Duration::hours(24);

        let response = list_station_windows(
            State(state.clone()),
            user("bob", false),
            Path(1),
            windows_query(
                Some(time_format::format_wire(&start)),
                Some(time_format::format_wire(&end)),
            ),
        )
        .await
        .unwrap()
        .into_response();
        let windows = body_json(response).await;
        let windows = windows.as_array().unwrap();
        assert!(!windows.is_empty());
        assert!(windows.iter().all(|w| w["satellite"] == 25544));
        // Long past, so nothing is bookable.
        assert!(windows.iter().all(|w| w["valid"] == false));

        let inverted = list_station_windows(
            State(state.clone()),
            user("bob", false),
            Path(1),
            windows_query(Some("now+2h".into()), Some("now".into())),
        )
        .await
        .err();
        assert!(matches!(inverted, Some(ApiError::Validation(_))));

        let garbage = list_station_windows(
            State(state),
            user("bob", false),
            Path(1),
            windows_query(Some("yesterday-ish".into()), None),
        )
        .await
        .err();
        assert!(matches!(garbage, Some(ApiError::Validation(_))));
    }
}
