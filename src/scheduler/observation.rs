use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::predict::OrbitalElements;
use crate::scheduler::interval::Interval;
use crate::station::StationId;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VettedStatus {
    #[default]
    Unknown,
    Good,
    Bad,
    Failed,
}

/// A booked observation as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Observation {
    pub id: String,
    pub satellite_id: u32,
    pub transmitter_uuid: String,
    /// Elements the pass geometry was computed from.
    pub elements: OrbitalElements,
    pub author: String,
    pub station_id: StationId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rise_azimuth_deg: Option<f64>,
    pub max_altitude_deg: Option<f64>,
    pub set_azimuth_deg: Option<f64>,
    #[serde(default)]
    pub testing: bool,
    #[serde(default)]
    pub vetted_status: VettedStatus,
    #[serde(default)]
    pub vetted_by: Option<String>,
    #[serde(default)]
    pub vetted_at: Option<DateTime<Utc>>,
}

impl Observation {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    pub fn is_future(&self, now: DateTime<Utc>) -> bool {
        self.end > now
    }

    pub fn vet(&mut self, status: VettedStatus, by: &str, at: DateTime<Utc>) {
        self.vetted_status = status;
        self.vetted_by = Some(by.to_string());
        self.vetted_at = Some(at);
    }
}
