use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::Catalog;
use crate::perms::PermissionContext;
use crate::scheduler::{StationLocks, Storage};
use crate::station::{StationDirectory, StationStatus};

use super::config::Config;

#[derive(Clone)]
pub struct AuthenticatedUser {
    pub name: String,
    pub moderator: bool,
    pub superuser: bool,
}

impl AuthenticatedUser {
    /// Permission facts that hold regardless of the station or observation.
    pub fn context(&self, stations: &StationDirectory) -> PermissionContext {
        PermissionContext {
            is_authenticated: true,
            has_stations: stations.has_owner(&self.name),
            is_moderator: self.moderator,
            is_superuser: self.superuser,
            ..Default::default()
        }
    }

    /// Permission facts for acting on one station.
    pub fn station_context(
        &self,
        stations: &StationDirectory,
        station: &StationStatus,
    ) -> PermissionContext {
        PermissionContext {
            is_owner: station.owner.as_deref() == Some(self.name.as_str()),
            station_state: Some(station.state),
            ..self.context(stations)
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<Storage>,
    pub catalog: Arc<RwLock<Catalog>>,
    pub stations: Arc<StationDirectory>,
    pub locks: Arc<StationLocks>,
}

pub enum AuthError {
    MissingAuth,
    InvalidFormat,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Missing Authorization header"),
            AuthError::InvalidFormat => (StatusCode::UNAUTHORIZED, "Invalid Authorization format"),
            AuthError::InvalidKey => (StatusCode::UNAUTHORIZED, "Invalid API key"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug)]
pub struct PermissionError;

impl IntoResponse for PermissionError {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Insufficient permissions" })),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .ok_or(AuthError::MissingAuth)?
            .to_str()
            .map_err(|_| AuthError::InvalidFormat)?;

        let key = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidFormat)?;

        let api_key = state
            .config
            .find_api_key(key)
            .ok_or(AuthError::InvalidKey)?;

        Ok(AuthenticatedUser {
            name: api_key.name.clone(),
            moderator: api_key.moderator,
            superuser: api_key.superuser,
        })
    }
}

/// Turn a permission check into a 403.
pub fn require(allowed: bool) -> Result<(), PermissionError> {
    if allowed {
        Ok(())
    } else {
        Err(PermissionError)
    }
}
