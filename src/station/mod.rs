mod directory;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::predict::StationLocation;

pub use directory::StationDirectory;

pub type StationId = u32;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("Unknown station: {0}")]
    Unknown(StationId),
}

/// Inclusive band an antenna can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FrequencyRange {
    pub min_hz: u64,
    pub max_hz: u64,
}

impl FrequencyRange {
    pub fn contains(&self, frequency_hz: u64) -> bool {
        self.min_hz <= frequency_hz && frequency_hz <= self.max_hz
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct FrequencyCapability {
    pub ranges: Vec<FrequencyRange>,
}

impl FrequencyCapability {
    pub fn supports(&self, frequency_hz: u64) -> bool {
        self.ranges.iter().any(|r| r.contains(frequency_hz))
    }

    /// True when any of the given downlinks can be received.
    pub fn supports_any(&self, frequencies_hz: &[u64]) -> bool {
        frequencies_hz.iter().any(|f| self.supports(*f))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Antenna {
    pub band: String,
    pub antenna_type: String,
    pub frequency_min_hz: u64,
    pub frequency_max_hz: u64,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StationState {
    Online,
    Testing,
    Offline,
}

/// Station state from its last heartbeat. A station is online while
/// `last_seen + heartbeat` lies in the future; testing only applies to
/// online stations.
pub fn compute_status(
    last_seen: Option<DateTime<Utc>>,
    testing: bool,
    now: DateTime<Utc>,
    heartbeat: Duration,
) -> StationState {
    match last_seen {
        Some(seen) if seen + heartbeat > now => {
            if testing {
                StationState::Testing
            } else {
                StationState::Online
            }
        }
        _ => StationState::Offline,
    }
}

/// A registered ground station.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub location: StationLocation,
    #[serde(default)]
    pub antennas: Vec<Antenna>,
    #[serde(default)]
    pub testing: bool,
}

impl Station {
    pub fn frequency_capability(&self) -> FrequencyCapability {
        FrequencyCapability {
            ranges: self
                .antennas
                .iter()
                .map(|a| FrequencyRange {
                    min_hz: a.frequency_min_hz,
                    max_hz: a.frequency_max_hz,
                })
                .collect(),
        }
    }
}

/// Snapshot of what the scheduling core needs to know about a station.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StationStatus {
    pub id: StationId,
    pub name: String,
    pub owner: Option<String>,
    pub state: StationState,
    pub location: StationLocation,
    pub frequency_ranges: FrequencyCapability,
    pub last_seen: Option<DateTime<Utc>>,
}

impl StationStatus {
    pub fn online(&self) -> bool {
        self.state != StationState::Offline
    }

    pub fn min_horizon_deg(&self) -> f64 {
        self.location.horizon_deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2024-03-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_compute_status() {
        let hb = Duration::minutes(60);
        assert_eq!(
            compute_status(None, false, now(), hb),
            StationState::Offline
        );
        assert_eq!(
            compute_status(Some(now() - Duration::minutes(10)), false, now(), hb),
            StationState::Online
        );
        assert_eq!(
            compute_status(Some(now() - Duration::minutes(10)), true, now(), hb),
            StationState::Testing
        );
        // Exactly one heartbeat ago is already stale.
        assert_eq!(
            compute_status(Some(now() - hb), false, now(), hb),
            StationState::Offline
        );
        assert_eq!(
            compute_status(Some(now() - Duration::hours(3)), true, now(), hb),
            StationState::Offline
        );
    }

    #[test]
    fn test_frequency_bounds_are_inclusive() {
        let caps = FrequencyCapability {
            ranges: vec![
                FrequencyRange {
                    min_hz: 144_000_000,
                    max_hz: 146_000_000,
                },
                FrequencyRange {
                    min_hz: 430_000_000,
                    max_hz: 440_000_000,
                },
            ],
        };
        assert!(caps.supports(144_000_000));
        assert!(caps.supports(146_000_000));
        assert!(caps.supports(437_500_000));
        assert!(!caps.supports(146_000_001));
        assert!(!caps.supports_any(&[]));
        assert!(caps.supports_any(&[100, 435_000_000]));
        assert!(!FrequencyCapability::default().supports(145_000_000));
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(StationState::Testing.to_string(), "testing");
    }
}
