use axum::{routing::delete, routing::get, routing::post, Router};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::catalog::Catalog;
use crate::maintenance;
use crate::predict::TleLoader;
use crate::scheduler::{StationLocks, Storage};
use crate::station::StationDirectory;

use super::api::observations as observation_handlers;
use super::api::passes as pass_handlers;
use super::api::satellites as satellite_handlers;
use super::api::schedule as schedule_handlers;
use super::api::stations as station_handlers;
use super::api_doc::ApiDoc;
use super::auth::AppState;
use super::config::Config;

/// Catalog with the TLE directory loaded. A missing or unreadable directory
/// is logged and leaves the catalog without elements.
pub fn load_catalog(config: &Config) -> Catalog {
    let mut tles = TleLoader::new(config.tle.directory.clone());
    match tles.load_all() {
        Ok(count) => log::info!("Loaded {} element sets", count),
        Err(e) => log::warn!("Failed to load TLEs: {}", e),
    }
    Catalog::new(config.satellites.clone(), tles)
}

pub fn build_state(config: Config) -> AppState {
    let storage = Storage::new(config.storage.base_folder.clone());
    let catalog = load_catalog(&config);
    let stations = StationDirectory::new(
        config.stations.clone(),
        config.scheduling.station_heartbeat,
    );

    AppState {
        config: Arc::new(config),
        storage: Arc::new(storage),
        catalog: Arc::new(RwLock::new(catalog)),
        stations: Arc::new(stations),
        locks: Arc::new(StationLocks::new()),
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Scheduling
        .route("/api/passes", get(pass_handlers::list_pass_windows))
        .route("/api/schedule", post(schedule_handlers::submit_batch))
        // Stations
        .route("/api/stations", get(station_handlers::list_stations))
        .route(
            "/api/stations/{id}/passes",
            get(station_handlers::list_station_passes),
        )
        .route(
            "/api/stations/{id}/windows",
            get(station_handlers::list_station_windows),
        )
        // Satellites
        .route("/api/satellites", get(satellite_handlers::list_satellites))
        .route(
            "/api/satellites/{id}/position",
            get(satellite_handlers::get_satellite_position),
        )
        // Observations
        .route(
            "/api/observations",
            get(observation_handlers::list_observations),
        )
        .route(
            "/api/observations/{id}",
            delete(observation_handlers::delete_observation),
        )
        .route(
            "/api/observations/{id}/vet",
            post(observation_handlers::vet_observation),
        )
        .route("/api/jobs", get(observation_handlers::list_jobs))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> std::io::Result<()> {
    let bind_addr = config.web.bind.clone();
    let state = build_state(config);

    let scheduling = &state.config.scheduling;
    maintenance::spawn_tle_refresh(state.catalog.clone(), state.config.tle.refresh);
    maintenance::spawn_cleanup(
        state.storage.clone(),
        scheduling.cleanup_interval,
        scheduling.observation_old_range,
    );

    let app = router(state);

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await
}
