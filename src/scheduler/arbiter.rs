use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::predict::CandidateWindow;
use crate::scheduler::error::SchedulingError;
use crate::scheduler::interval::{resolve, Interval};
use crate::station::StationId;

/// Part of a pass that is still free on its station.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BookableWindow {
    pub satellite_id: u32,
    pub station_id: StationId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rise_azimuth_deg: f64,
    pub max_altitude_deg: f64,
    pub valid: bool,
}

/// Booked time per station, kept sorted by start.
#[derive(Debug, Clone, Default)]
pub struct BookingLedger {
    by_station: HashMap<StationId, Vec<Interval>>,
}

impl BookingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bookings(&self, station: StationId) -> &[Interval] {
        self.by_station
            .get(&station)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn insert(&mut self, station: StationId, interval: Interval) {
        let booked = self.by_station.entry(station).or_default();
        let at = booked.partition_point(|b| (b.start, b.end) <= (interval.start, interval.end));
        booked.insert(at, interval);
    }

    /// Free parts of `candidate` on `station`.
    pub fn free(&self, station: StationId, candidate: Interval) -> Vec<Interval> {
        resolve(candidate, self.bookings(station))
    }
}

impl FromIterator<(StationId, Interval)> for BookingLedger {
    fn from_iter<T: IntoIterator<Item = (StationId, Interval)>>(iter: T) -> Self {
        let mut ledger = BookingLedger::new();
        for (station, interval) in iter {
            ledger.insert(station, interval);
        }
        ledger
    }
}

/// Cut every candidate down to the time its station still has free.
/// Split windows keep the pass's rise azimuth on both halves.
pub fn arbitrate(candidates: &[CandidateWindow], ledger: &BookingLedger) -> Vec<BookableWindow> {
    candidates
        .iter()
        .flat_map(|candidate| {
            ledger
                .free(
                    candidate.station_id,
                    Interval::new(candidate.start, candidate.end),
                )
                .into_iter()
                .map(move |free| BookableWindow {
                    satellite_id: candidate.satellite_id,
                    station_id: candidate.station_id,
                    start: free.start,
                    end: free.end,
                    rise_azimuth_deg: candidate.rise_azimuth_deg,
                    max_altitude_deg: candidate.max_altitude_deg,
                    valid: candidate.valid,
                })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub struct ObservationRequest {
    pub station_id: StationId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleLimits {
    pub min_start_lead: Duration,
    pub max_range: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedWindow {
    pub station_id: StationId,
    pub interval: Interval,
}

fn validate_request(
    request: &ObservationRequest,
    now: DateTime<Utc>,
    limits: &ScheduleLimits,
) -> Result<Interval, SchedulingError> {
    let interval = Interval::new(request.start, request.end);
    if interval.is_empty() {
        return Err(SchedulingError::InvalidRequest(format!(
            "end {} is not after start {}",
            request.end, request.start
        )));
    }
    if interval.duration() > limits.max_range {
        return Err(SchedulingError::TooLong {
            minutes: interval.duration().num_minutes(),
            max_minutes: limits.max_range.num_minutes(),
        });
    }
    let earliest = now + limits.min_start_lead;
    if request.start < earliest {
        return Err(SchedulingError::TooSoon {
            start: request.start,
            earliest,
        });
    }
    Ok(interval)
}

/// Admit a batch of requests against existing bookings.
///
/// Requests are folded through the ledger in order, so each later request
/// also sees the ones accepted before it. The first rejection fails the
/// whole batch with its position; the caller's ledger is never touched.
pub fn plan_batch(
    requests: &[ObservationRequest],
    ledger: &BookingLedger,
    now: DateTime<Utc>,
    limits: &ScheduleLimits,
) -> Result<Vec<PlannedWindow>, SchedulingError> {
    let (planned, _) = requests.iter().enumerate().try_fold(
        (Vec::with_capacity(requests.len()), ledger.clone()),
        |(mut planned, mut ledger), (index, request)| {
            let interval =
                validate_request(request, now, limits).map_err(|e| e.in_batch(index))?;

            if ledger.free(request.station_id, interval) != [interval] {
                return Err(SchedulingError::Conflict {
                    station: request.station_id,
                    start: request.start,
                    end: request.end,
                }
                .in_batch(index));
            }

            ledger.insert(request.station_id, interval);
            planned.push(PlannedWindow {
                station_id: request.station_id,
                interval,
            });
            Ok((planned, ledger))
        },
    )?;
    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::interval::tests::{at, iv};

    fn candidate(station_id: StationId, interval: Interval) -> CandidateWindow {
        CandidateWindow {
            satellite_id: 25544,
            station_id,
            start: interval.start,
            end: interval.end,
            rise_azimuth_deg: 212.0,
            max_altitude_deg: 48.0,
            valid: true,
        }
    }

    fn limits() -> ScheduleLimits {
        ScheduleLimits {
            min_start_lead: Duration::minutes(15),
            max_range: Duration::hours(8),
        }
    }

    fn request(station_id: StationId, interval: Interval) -> ObservationRequest {
        ObservationRequest {
            station_id,
            start: interval.start,
            end: interval.end,
        }
    }

    #[test]
    fn test_ledger_keeps_bookings_sorted() {
        let ledger: BookingLedger = vec![
            (1, iv(11, 0, 11, 30)),
            (1, iv(9, 0, 9, 30)),
            (2, iv(10, 0, 10, 5)),
        ]
        .into_iter()
        .collect();
        assert_eq!(ledger.bookings(1), &[iv(9, 0, 9, 30), iv(11, 0, 11, 30)]);
        assert_eq!(ledger.bookings(2).len(), 1);
        assert!(ledger.bookings(3).is_empty());
    }

    #[test]
    fn test_split_halves_share_azimuth() {
        let ledger: BookingLedger = vec![(1, iv(10, 0, 10, 30))].into_iter().collect();
        let windows = arbitrate(&[candidate(1, iv(9, 50, 10, 40))], &ledger);

        assert_eq!(windows.len(), 2);
        assert_eq!((windows[0].start, windows[0].end), (at(9, 50), at(10, 0)));
        assert_eq!((windows[1].start, windows[1].end), (at(10, 30), at(10, 40)));
        assert!(windows.iter().all(|w| w.rise_azimuth_deg == 212.0));
    }

    #[test]
    fn test_bookings_only_affect_their_station() {
        let ledger: BookingLedger = vec![(2, iv(9, 0, 11, 0))].into_iter().collect();
        let windows = arbitrate(
            &[candidate(1, iv(9, 50, 10, 40)), candidate(2, iv(9, 50, 10, 40))],
            &ledger,
        );
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].station_id, 1);
    }

    #[test]
    fn test_batch_with_free_requests_is_accepted() {
        let ledger: BookingLedger = vec![(1, iv(10, 0, 10, 30))].into_iter().collect();
        let requests = [
            request(1, iv(10, 30, 10, 45)),
            request(2, iv(10, 0, 10, 30)),
            request(1, iv(11, 0, 11, 10)),
        ];
        let planned = plan_batch(&requests, &ledger, at(8, 0), &limits()).unwrap();

        assert_eq!(planned.len(), 3);
        assert_eq!(planned[2].station_id, 1);
        assert_eq!(planned[2].interval, iv(11, 0, 11, 10));
        assert_eq!(ledger.bookings(1).len(), 1);
    }

    #[test]
    fn test_overlapping_requests_in_one_batch_fail() {
        let requests = [request(1, iv(10, 0, 10, 20)), request(1, iv(10, 10, 10, 30))];
        let err = plan_batch(&requests, &BookingLedger::new(), at(8, 0), &limits()).unwrap_err();

        assert!(matches!(err, SchedulingError::Batch { index: 1, .. }));
        assert!(matches!(
            err.root(),
            SchedulingError::Conflict { station: 1, .. }
        ));
    }

    #[test]
    fn test_conflict_with_existing_booking_fails() {
        let ledger: BookingLedger = vec![(1, iv(10, 0, 10, 30))].into_iter().collect();
        let requests = [request(1, iv(9, 0, 9, 10)), request(1, iv(10, 20, 10, 40))];
        let err = plan_batch(&requests, &ledger, at(8, 0), &limits()).unwrap_err();
        assert!(matches!(err, SchedulingError::Batch { index: 1, .. }));
        assert_eq!(ledger.bookings(1).len(), 1);
    }

    #[test]
    fn test_request_limits() {
        let now = at(9, 50);
        let plan =
            |interval| plan_batch(&[request(1, interval)], &BookingLedger::new(), now, &limits());

        let too_soon = plan(iv(10, 0, 10, 10)).unwrap_err();
        assert!(matches!(too_soon.root(), SchedulingError::TooSoon { .. }));

        let too_long = plan(iv(11, 0, 19, 1)).unwrap_err();
        assert!(matches!(too_long.root(), SchedulingError::TooLong { .. }));

        let inverted = plan(iv(11, 0, 10, 30)).unwrap_err();
        assert!(matches!(inverted.root(), SchedulingError::InvalidRequest(_)));

        assert!(plan(iv(10, 5, 10, 20)).is_ok());
    }
}
