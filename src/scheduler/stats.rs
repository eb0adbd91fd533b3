use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::scheduler::observation::{Observation, VettedStatus};
use crate::station::StationId;

/// Vetting tallies of one satellite's observations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SatelliteStats {
    pub data_count: usize,
    pub good_count: usize,
    pub bad_count: usize,
    pub unknown_count: usize,
    /// Whole percent of observations vetted good.
    pub success_rate: u32,
}

impl SatelliteStats {
    fn add(&mut self, observation: &Observation) {
        self.data_count += 1;
        match observation.vetted_status {
            VettedStatus::Good => self.good_count += 1,
            VettedStatus::Bad => self.bad_count += 1,
            VettedStatus::Unknown => self.unknown_count += 1,
            VettedStatus::Failed => {}
        }
        self.success_rate = percent(self.good_count, self.data_count);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StationStats {
    pub observations_count: usize,
    /// Whole percent of non-testing observations vetted good. None until the
    /// station has one.
    pub success_rate: Option<u32>,
    #[serde(skip)]
    scored: usize,
    #[serde(skip)]
    good: usize,
}

impl StationStats {
    fn add(&mut self, observation: &Observation) {
        self.observations_count += 1;
        if observation.testing {
            return;
        }
        self.scored += 1;
        if observation.vetted_status == VettedStatus::Good {
            self.good += 1;
        }
        self.success_rate = Some(percent(self.good, self.scored));
    }
}

fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        (100 * part / total) as u32
    }
}

pub fn satellite_stats<'a>(
    observations: impl IntoIterator<Item = &'a Observation>,
) -> HashMap<u32, SatelliteStats> {
    let mut stats: HashMap<u32, SatelliteStats> = HashMap::new();
    for observation in observations {
        stats
            .entry(observation.satellite_id)
            .or_default()
            .add(observation);
    }
    stats
}

pub fn station_stats<'a>(
    observations: impl IntoIterator<Item = &'a Observation>,
) -> HashMap<StationId, StationStats> {
    let mut stats: HashMap<StationId, StationStats> = HashMap::new();
    for observation in observations {
        stats
            .entry(observation.station_id)
            .or_default()
            .add(observation);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::interval::tests::iv;
    use crate::scheduler::observation::tests::observation;

    fn vetted(id: &str, station: StationId, status: VettedStatus) -> Observation {
        let mut o = observation(id, station, iv(10, 0, 10, 10));
        o.vetted_status = status;
        o
    }

    #[test]
    fn test_satellite_tallies() {
        let observations = vec![
            vetted("a", 1, VettedStatus::Good),
            vetted("b", 1, VettedStatus::Bad),
            vetted("c", 2, VettedStatus::Unknown),
            vetted("d", 2, VettedStatus::Failed),
            vetted("e", 2, VettedStatus::Good),
            vetted("f", 1, VettedStatus::Unknown),
        ];
        let stats = satellite_stats(&observations);
        assert_eq!(
            stats[&25544],
            SatelliteStats {
                data_count: 6,
                good_count: 2,
                bad_count: 1,
                unknown_count: 2,
                success_rate: 33,
            }
        );
        assert!(!stats.contains_key(&1));
    }

    #[test]
    fn test_station_rate_ignores_testing() {
        let mut testing = vetted("t", 2, VettedStatus::Bad);
        testing.testing = true;
        let observations = vec![
            vetted("a", 1, VettedStatus::Good),
            vetted("b", 1, VettedStatus::Bad),
            vetted("c", 1, VettedStatus::Good),
            testing,
        ];
        let stats = station_stats(&observations);

        assert_eq!(stats[&1].observations_count, 3);
        assert_eq!(stats[&1].success_rate, Some(66));
        assert_eq!(stats[&2].observations_count, 1);
        assert_eq!(stats[&2].success_rate, None);
        assert_eq!(StationStats::default().success_rate, None);
    }
}
