use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::predict::look_angles::round_degrees;

/// One rise/culmination/set cycle as seen from a station. Angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassEvent {
    pub rise_time: DateTime<Utc>,
    pub rise_azimuth_rad: f64,
    pub max_altitude_time: DateTime<Utc>,
    pub max_altitude_rad: f64,
    pub set_time: DateTime<Utc>,
    pub set_azimuth_rad: f64,
}

impl PassEvent {
    pub fn rise_azimuth_deg(&self) -> f64 {
        round_degrees(self.rise_azimuth_rad)
    }

    pub fn max_altitude_deg(&self) -> f64 {
        round_degrees(self.max_altitude_rad)
    }

    pub fn set_azimuth_deg(&self) -> f64 {
        round_degrees(self.set_azimuth_rad)
    }
}

/// Why a pass search stopped producing events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// No further rise before the end of the search window.
    HorizonReached,
    /// The satellite stays above the horizon for longer than any pass can last.
    AlwaysAboveHorizon,
    /// The satellite rose but never set within the maximum pass span.
    NeverSets,
    /// SGP4 failed, typically for a decayed orbit.
    PropagationFailed(String),
    /// The per-search pass cap was hit.
    IterationCap,
}

/// One sample of a pass track for a polar plot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct PolarPoint {
    pub time: DateTime<Utc>,
    pub azimuth_deg: f64,
    pub altitude_deg: f64,
}

/// A pass as reported for a station's upcoming pass list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PassReport {
    pub satellite: String,
    pub norad_id: u32,
    pub rise_time: DateTime<Utc>,
    pub rise_azimuth_deg: f64,
    pub max_altitude_time: DateTime<Utc>,
    pub max_altitude_deg: f64,
    pub set_time: DateTime<Utc>,
    pub set_azimuth_deg: f64,
    pub duration_seconds: i64,
    pub valid: bool,
    /// Track from rise to set, evenly spaced in time.
    pub polar_data: Vec<PolarPoint>,
}

impl PassReport {
    pub fn new(satellite: &str, norad_id: u32, event: &PassEvent, valid: bool) -> Self {
        Self {
            satellite: satellite.to_string(),
            norad_id,
            rise_time: event.rise_time,
            rise_azimuth_deg: event.rise_azimuth_deg(),
            max_altitude_time: event.max_altitude_time,
            max_altitude_deg: event.max_altitude_deg(),
            set_time: event.set_time,
            set_azimuth_deg: event.set_azimuth_deg(),
            duration_seconds: (event.set_time - event.rise_time).num_seconds(),
            valid,
            polar_data: Vec::new(),
        }
    }

    pub fn with_polar_data(mut self, track: Vec<PolarPoint>) -> Self {
        self.polar_data = track;
        self
    }
}
