use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::predict::{OrbitalElements, PredictError, TleLoader};

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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SatelliteStatus {
    #[default]
    Alive,
    Dead,
    ReEntered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transmitter {
    pub uuid: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_alive")]
    pub alive: bool,
    #[serde(default)]
    pub uplink_low: Option<u64>,
    #[serde(default)]
    pub downlink_low: Option<u64>,
    #[serde(default)]
    pub downlink_high: Option<u64>,
    #[serde(default)]
    pub mode: Option<String>,
}

fn default_alive() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Satellite {
    pub norad_id: u32,
    pub name: String,
    #[serde(default)]
    pub status: SatelliteStatus,
    #[serde(default)]
    pub transmitters: Vec<Transmitter>,
}

impl Satellite {
    /// Alive satellite with at least one alive transmitter.
    pub fn is_schedulable(&self) -> bool {
        self.status == SatelliteStatus::Alive && self.transmitters.iter().any(|t| t.alive)
    }

    /// Downlink frequencies of the alive transmitters.
    pub fn downlinks(&self) -> Vec<u64> {
        self.transmitters
            .iter()
            .filter(|t| t.alive)
            .filter_map(|t| t.downlink_low)
            .collect()
    }

    pub fn transmitter(&self, uuid: &str) -> Option<&Transmitter> {
        self.transmitters.iter().find(|t| t.uuid == uuid)
    }
}

/// Satellites known to the network together with their latest elements.
pub struct Catalog {
    satellites: BTreeMap<u32, Satellite>,
    tles: TleLoader,
}

impl Catalog {
    pub fn new(satellites: Vec<Satellite>, tles: TleLoader) -> Self {
        Self {
            satellites: satellites.into_iter().map(|s| (s.norad_id, s)).collect(),
            tles,
        }
    }

    pub fn satellite(&self, norad_id: u32) -> Option<&Satellite> {
        self.satellites.get(&norad_id)
    }

    pub fn satellites(&self) -> impl Iterator<Item = &Satellite> {
        self.satellites.values()
    }

    pub fn schedulable(&self) -> impl Iterator<Item = &Satellite> {
        self.satellites.values().filter(|s| s.is_schedulable())
    }

    pub fn elements(&self, norad_id: u32) -> Result<&OrbitalElements, PredictError> {
        self.tles.get(norad_id)
    }

    /// Re-read the TLE directory. Returns the number of changed element sets.
    pub fn reload_tles(&mut self) -> Result<usize, PredictError> {
        self.tles.load_all()
    }

    pub fn tle_count(&self) -> usize {
        self.tles.len()
    }
}
