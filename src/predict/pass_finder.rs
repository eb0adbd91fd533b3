use chrono::{DateTime, Duration, Utc};

use crate::predict::elements::{OrbitalElements, PreparedElements};
use crate::predict::error::PredictError;
use crate::predict::ground_station::StationLocation;
use crate::predict::look_angles::{look_angles, LookAngles};
use crate::predict::types::{PassEvent, SearchOutcome};

const COARSE_STEP_SECONDS: i64 = 60; // 1 minute for initial scan
const FINE_STEP_SECONDS: i64 = 1; // 1 second for refinement
const HORIZON_ELEVATION_RAD: f64 = 0.0;
const RESTART_AFTER_SET: Duration = Duration::minutes(1);
const MAX_PASS_SPAN: Duration = Duration::days(1);

pub const MAX_PASSES_PER_SEARCH: usize = 500;

type StepResult<T> = Result<T, String>;

/// Lazily finds successive passes of one satellite over one station.
///
/// Each call to `next` searches forward from the cursor for a rise, follows
/// the pass to its set and moves the cursor one minute past the set. The
/// sequence ends when the next rise lies beyond `search_start +
/// search_horizon`, when SGP4 gives up, or after `MAX_PASSES_PER_SEARCH`
/// events. [`PassIterator::outcome`] tells which.
pub struct PassIterator {
    prepared: PreparedElements,
    station: StationLocation,
    cursor: DateTime<Utc>,
    limit: DateTime<Utc>,
    max_passes: usize,
    yielded: usize,
    outcome: Option<SearchOutcome>,
}

/// Start a pass search. Fails only when the elements themselves are unusable.
pub fn compute_passes(
    elements: &OrbitalElements,
    station: &StationLocation,
    search_start: DateTime<Utc>,
    search_horizon: Duration,
) -> Result<PassIterator, PredictError> {
    let prepared = elements.prepare()?;
    Ok(PassIterator {
        prepared,
        station: *station,
        cursor: search_start,
        limit: search_start + search_horizon,
        max_passes: MAX_PASSES_PER_SEARCH,
        yielded: 0,
        outcome: None,
    })
}

impl PassIterator {
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn outcome(&self) -> Option<&SearchOutcome> {
        self.outcome.as_ref()
    }

    fn finish(&mut self, outcome: SearchOutcome) {
        log::debug!("Pass search ended: {:?}", outcome);
        self.outcome = Some(outcome);
    }

    fn sample(&self, t: DateTime<Utc>) -> StepResult<LookAngles> {
        look_angles(&self.station, &self.prepared, t)
    }

    fn is_up(&self, t: DateTime<Utc>) -> StepResult<bool> {
        Ok(self.sample(t)?.elevation_rad >= HORIZON_ELEVATION_RAD)
    }

    /// Steps from `from` until the visibility equals `want_up`, stopping at
    /// `bound`. Returns the first sample time satisfying it.
    fn scan_until(
        &self,
        from: DateTime<Utc>,
        step: Duration,
        bound: DateTime<Utc>,
        want_up: bool,
    ) -> StepResult<Option<DateTime<Utc>>> {
        let forward = step > Duration::zero();
        let mut t = from;
        loop {
            t += step;
            if (forward && t > bound) || (!forward && t < bound) {
                return Ok(None);
            }
            if self.is_up(t)? == want_up {
                return Ok(Some(t));
            }
        }
    }

    /// Binary search for the horizon crossing between `low` and `high`.
    /// `rising` means the satellite is below at `low` and above at `high`.
    fn refine_crossing(
        &self,
        mut low: DateTime<Utc>,
        mut high: DateTime<Utc>,
        rising: bool,
    ) -> StepResult<(DateTime<Utc>, f64)> {
        while (high - low).num_seconds() > FINE_STEP_SECONDS {
            let mid = low + (high - low) / 2;
            let up = self.is_up(mid)?;
            if up == rising {
                high = mid;
            } else {
                low = mid;
            }
        }
        let sample = self.sample(high)?;
        Ok((high, sample.azimuth_rad))
    }

    /// Ternary search for the highest elevation in `[low, high]`.
    fn refine_culmination(
        &self,
        mut low: DateTime<Utc>,
        mut high: DateTime<Utc>,
    ) -> StepResult<(DateTime<Utc>, f64)> {
        while (high - low).num_seconds() > FINE_STEP_SECONDS {
            let third = (high - low) / 3;
            let m1 = low + third;
            let m2 = high - third;
            if self.sample(m1)?.elevation_rad < self.sample(m2)?.elevation_rad {
                low = m1;
            } else {
                high = m2;
            }
        }
        let t = low + (high - low) / 2;
        Ok((t, self.sample(t)?.elevation_rad))
    }

    fn next_pass(&mut self) -> StepResult<Option<PassEvent>> {
        let coarse = Duration::seconds(COARSE_STEP_SECONDS);
        let cursor = self.cursor;

        let (rise_time, rise_azimuth_rad) = if self.is_up(cursor)? {
            // Pass already in progress: look back for its rise.
            match self.scan_until(cursor, -coarse, cursor - MAX_PASS_SPAN, false)? {
                Some(below) => self.refine_crossing(below, below + coarse, true)?,
                None => {
                    self.finish(SearchOutcome::AlwaysAboveHorizon);
                    return Ok(None);
                }
            }
        } else {
            match self.scan_until(cursor, coarse, self.limit + coarse, true)? {
                Some(above) => self.refine_crossing(above - coarse, above, true)?,
                None => {
                    self.finish(SearchOutcome::HorizonReached);
                    return Ok(None);
                }
            }
        };

        if rise_time > self.limit {
            self.finish(SearchOutcome::HorizonReached);
            return Ok(None);
        }

        // Follow the pass to its set, remembering the highest coarse sample.
        let mut best_time = rise_time;
        let mut best_el = self.sample(rise_time)?.elevation_rad;
        let mut t = rise_time;
        let below = loop {
            t += coarse;
            if t > rise_time + MAX_PASS_SPAN {
                break None;
            }
            let sample = self.sample(t)?;
            if sample.elevation_rad < HORIZON_ELEVATION_RAD {
                break Some(t);
            }
            if sample.elevation_rad > best_el {
                best_el = sample.elevation_rad;
                best_time = t;
            }
        };

        let Some(below) = below else {
            self.finish(SearchOutcome::NeverSets);
            return Ok(None);
        };

        let (set_time, set_azimuth_rad) = self.refine_crossing(below - coarse, below, false)?;

        let low = (best_time - coarse).max(rise_time);
        let high = (best_time + coarse).min(set_time);
        let (max_altitude_time, max_altitude_rad) = self.refine_culmination(low, high)?;

        Ok(Some(PassEvent {
            rise_time,
            rise_azimuth_rad,
            max_altitude_time,
            max_altitude_rad: max_altitude_rad.max(best_el),
            set_time,
            set_azimuth_rad,
        }))
    }
}

impl Iterator for PassIterator {
    type Item = PassEvent;

    fn next(&mut self) -> Option<PassEvent> {
        if self.outcome.is_some() {
            return None;
        }
        if self.yielded >= self.max_passes {
            log::warn!(
                "Pass search stopped after {} passes at {}",
                self.yielded,
                self.cursor
            );
            self.finish(SearchOutcome::IterationCap);
            return None;
        }

        match self.next_pass() {
            Ok(Some(event)) => {
                self.yielded += 1;
                self.cursor = event.set_time + RESTART_AFTER_SET;
                Some(event)
            }
            Ok(None) => None,
            Err(e) => {
                self.finish(SearchOutcome::PropagationFailed(e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::elements::tests::iss;

    fn london() -> StationLocation {
        StationLocation::new(51.5, -0.1, 20.0, 0.0).unwrap()
    }

    fn search_start() -> DateTime<Utc> {
        iss().epoch().unwrap()
    }

    #[test]
    fn test_finds_ordered_passes_within_a_day() {
        let mut passes = compute_passes(&iss(), &london(), search_start(), Duration::hours(24))
            .unwrap();
        let events: Vec<_> = passes.by_ref().collect();

        assert!(!events.is_empty());
        assert_eq!(passes.outcome(), Some(&SearchOutcome::HorizonReached));

        for event in &events {
            assert!(event.rise_time < event.set_time);
            assert!(event.rise_time <= event.max_altitude_time);
            assert!(event.max_altitude_time <= event.set_time);
            assert!(event.set_time - event.rise_time < Duration::minutes(20));
            assert!(event.max_altitude_deg() >= 0.0);
            assert!((0.0..=360.0).contains(&event.rise_azimuth_deg()));
            assert!(event.rise_time <= search_start() + Duration::hours(24));
        }
        for pair in events.windows(2) {
            assert!(pair[1].rise_time > pair[0].set_time);
        }
    }

    #[test]
    fn test_never_rises_is_empty_not_error() {
        let pole = StationLocation::new(-89.9, 0.0, 2800.0, 0.0).unwrap();
        let mut passes =
            compute_passes(&iss(), &pole, search_start(), Duration::hours(6)).unwrap();
        assert!(passes.next().is_none());
        assert_eq!(passes.outcome(), Some(&SearchOutcome::HorizonReached));
    }

    #[test]
    fn test_pass_in_progress_reports_its_rise() {
        let first = compute_passes(&iss(), &london(), search_start(), Duration::hours(24))
            .unwrap()
            .next()
            .unwrap();

        let midway = first.rise_time + (first.set_time - first.rise_time) / 2;
        let resumed = compute_passes(&iss(), &london(), midway, Duration::hours(1))
            .unwrap()
            .next()
            .unwrap();

        assert!((resumed.rise_time - first.rise_time).num_seconds().abs() <= 2);
        assert!((resumed.set_time - first.set_time).num_seconds().abs() <= 2);
    }

    #[test]
    fn test_iteration_cap_stops_search() {
        let mut passes = compute_passes(&iss(), &london(), search_start(), Duration::hours(24))
            .unwrap()
            .with_max_passes(1);
        assert!(passes.next().is_some());
        assert!(passes.next().is_none());
        assert_eq!(passes.outcome(), Some(&SearchOutcome::IterationCap));
    }

    #[test]
    fn test_malformed_elements_are_a_hard_error() {
        let elements = OrbitalElements {
            satellite_id: 25544,
            name: "BROKEN".into(),
            line1: "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992".into(),
            line2: "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.4950789623600x".into(),
        };
        let result = compute_passes(&elements, &london(), search_start(), Duration::hours(1));
        assert!(matches!(
            result.err(),
            Some(PredictError::InvalidElements { .. })
        ));
    }
}
