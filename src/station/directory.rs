use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use super::{compute_status, Station, StationError, StationId, StationStatus};

/// Registered stations plus the heartbeats their clients report.
pub struct StationDirectory {
    stations: BTreeMap<StationId, Station>,
    last_seen: RwLock<HashMap<StationId, DateTime<Utc>>>,
    heartbeat: Duration,
}

impl StationDirectory {
    pub fn new(stations: Vec<Station>, heartbeat: Duration) -> Self {
        Self {
            stations: stations.into_iter().map(|s| (s.id, s)).collect(),
            last_seen: RwLock::new(HashMap::new()),
            heartbeat,
        }
    }

    pub fn station(&self, id: StationId) -> Result<&Station, StationError> {
        self.stations.get(&id).ok_or(StationError::Unknown(id))
    }

    /// True when `owner` owns at least one station.
    pub fn has_owner(&self, owner: &str) -> bool {
        self.stations
            .values()
            .any(|s| s.owner.as_deref() == Some(owner))
    }

    pub fn ids(&self) -> Vec<StationId> {
        self.stations.keys().copied().collect()
    }

    pub fn record_heartbeat(&self, id: StationId, at: DateTime<Utc>) -> Result<(), StationError> {
        self.station(id)?;
        let mut seen = self.last_seen.write().unwrap_or_else(|e| e.into_inner());
        seen.insert(id, at);
        log::debug!("Heartbeat from station {} at {}", id, at);
        Ok(())
    }

    pub fn status(&self, id: StationId, now: DateTime<Utc>) -> Result<StationStatus, StationError> {
        let station = self.station(id)?;
        let last_seen = self
            .last_seen
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .copied();

        Ok(StationStatus {
            id,
            name: station.name.clone(),
            owner: station.owner.clone(),
            state: compute_status(last_seen, station.testing, now, self.heartbeat),
            location: station.location,
            frequency_ranges: station.frequency_capability(),
            last_seen,
        })
    }

    pub fn statuses(&self, now: DateTime<Utc>) -> Vec<StationStatus> {
        self.stations
            .keys()
            .filter_map(|id| self.status(*id, now).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::StationLocation;
    use crate::station::StationState;

    fn station(id: StationId, testing: bool) -> Station {
        Station {
            id,
            name: format!("station-{}", id),
            owner: Some("alice".into()),
            location: StationLocation::new(37.98, 23.73, 150.0, 10.0).unwrap(),
            antennas: Vec::new(),
            testing,
        }
    }

    #[test]
    fn test_heartbeat_brings_station_online() {
        let now: DateTime<Utc> = "2024-03-01T12:00:00Z".parse().unwrap();
        let directory =
            StationDirectory::new(vec![station(1, false), station(2, true)], Duration::hours(1));

        assert_eq!(directory.status(1, now).unwrap().state, StationState::Offline);

        directory.record_heartbeat(1, now).unwrap();
        directory.record_heartbeat(2, now).unwrap();
        assert_eq!(directory.status(1, now).unwrap().state, StationState::Online);
        assert_eq!(directory.status(2, now).unwrap().state, StationState::Testing);
        assert!(directory.status(2, now).unwrap().online());

        let later = now + Duration::hours(2);
        assert_eq!(directory.status(1, later).unwrap().state, StationState::Offline);
    }

    #[test]
    fn test_unknown_station() {
        let directory = StationDirectory::new(Vec::new(), Duration::hours(1));
        assert!(matches!(
            directory.record_heartbeat(9, Utc::now()),
            Err(StationError::Unknown(9))
        ));
        assert!(directory.statuses(Utc::now()).is_empty());
        assert!(!directory.has_owner("alice"));
    }

    #[test]
    fn test_has_owner() {
        let directory = StationDirectory::new(vec![station(1, false)], Duration::hours(1));
        assert!(directory.has_owner("alice"));
        assert!(!directory.has_owner("bob"));
    }
}
