use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::observations::{JobResponse, VetRequest};
use super::api::passes::{StationPassesResponse, WindowResponse};
use super::api::schedule::{RequestedObservation, ScheduleRequest, ScheduleResponse};
use super::api::satellites::SatelliteResponse;
use super::api::stations::{FreeWindowResponse, StationResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::passes::list_pass_windows,
        super::api::schedule::submit_batch,
        super::api::stations::list_stations,
        super::api::stations::list_station_passes,
        super::api::stations::list_station_windows,
        super::api::satellites::list_satellites,
        super::api::satellites::get_satellite_position,
        super::api::observations::list_observations,
        super::api::observations::delete_observation,
        super::api::observations::vet_observation,
        super::api::observations::list_jobs,
    ),
    components(
        schemas(
            ErrorResponse,
            WindowResponse,
            StationPassesResponse,
            RequestedObservation,
            ScheduleRequest,
            ScheduleResponse,
            VetRequest,
            JobResponse,
            FreeWindowResponse,
            StationResponse,
            SatelliteResponse,
            crate::predict::PolarPoint,
            crate::predict::SubPoint,
            crate::scheduler::SatelliteStats,
            crate::scheduler::StationStats,
            crate::catalog::SatelliteStatus,
            crate::predict::PassReport,
            crate::predict::StationLocation,
            crate::predict::OrbitalElements,
            crate::scheduler::Observation,
            crate::scheduler::VettedStatus,
            crate::station::StationStatus,
            crate::station::StationState,
            crate::station::FrequencyCapability,
            crate::station::FrequencyRange,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Sat-O-Net Scheduling API",
        description = "Pass prediction and observation scheduling for a network of ground stations",
        version = "0.1.0"
    ),
    tags(
        (name = "scheduling", description = "Pass windows and batch scheduling"),
        (name = "stations", description = "Ground stations"),
        (name = "satellites", description = "Satellites and their positions"),
        (name = "observations", description = "Scheduled observations")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/passes",
            "/api/schedule",
            "/api/stations",
            "/api/stations/{id}/passes",
            "/api/stations/{id}/windows",
            "/api/satellites",
            "/api/satellites/{id}/position",
            "/api/observations",
            "/api/observations/{id}",
            "/api/observations/{id}/vet",
            "/api/jobs",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
