//! Who may schedule, delete and vet observations.

use crate::station::StationState;

/// Facts about a user relative to one station or observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionContext {
    pub is_authenticated: bool,
    /// Owns the station in question.
    pub is_owner: bool,
    /// Owns at least one station.
    pub has_stations: bool,
    /// Authored the observation in question.
    pub is_author: bool,
    pub is_moderator: bool,
    pub is_superuser: bool,
    pub station_state: Option<StationState>,
}

impl PermissionContext {
    fn is_staff(&self) -> bool {
        self.is_moderator || self.is_superuser
    }
}

/// Station owners, moderators and superusers may schedule. Nobody schedules
/// on an offline station, and only the owner on a testing one.
pub fn can_schedule(ctx: &PermissionContext) -> bool {
    if !ctx.is_authenticated {
        return false;
    }

    match ctx.station_state {
        Some(StationState::Offline) => return false,
        Some(StationState::Testing) if !ctx.is_owner => return false,
        _ => {}
    }

    ctx.has_stations || ctx.is_staff()
}

pub fn can_delete(ctx: &PermissionContext) -> bool {
    ctx.is_authenticated && (ctx.is_author || ctx.is_owner || ctx.is_staff())
}

pub fn can_vet(ctx: &PermissionContext) -> bool {
    ctx.is_authenticated && (ctx.is_author || ctx.is_owner || ctx.is_staff())
}
