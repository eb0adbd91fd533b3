use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::Serialize;
use utoipa::ToSchema;

use crate::catalog::{Catalog, Satellite, Transmitter};
use crate::predict::{
    compute_passes, generate_station_windows, generate_windows, upcoming_passes, FrequencyFilter,
    OrbitalElements, PassEvent, PassReport, PassTarget, PredictError, SearchWindow,
};
use crate::scheduler::arbiter::{
    arbitrate, plan_batch, BookableWindow, BookingLedger, ObservationRequest, ScheduleLimits,
};
use crate::scheduler::error::SchedulingError;
use crate::scheduler::interval::Interval;
use crate::scheduler::locks::StationLocks;
use crate::scheduler::observation::{Observation, VettedStatus};
use crate::scheduler::storage::{Storage, StorageError};
use crate::station::{StationDirectory, StationError, StationId, StationState, StationStatus};

/// Satellites and their current orbital elements.
pub trait ElementsSource {
    fn satellite(&self, norad_id: u32) -> Option<&Satellite>;
    fn schedulable_satellites(&self) -> Vec<&Satellite>;
    fn orbital_elements(&self, norad_id: u32) -> Result<&OrbitalElements, PredictError>;
}

pub trait StationSource {
    fn station_ids(&self) -> Vec<StationId>;
    fn station_status(&self, id: StationId, now: DateTime<Utc>)
        -> Result<StationStatus, StationError>;
}

pub trait BookingStore {
    /// Booked intervals of `station` overlapping `[start, end)`, by start.
    fn existing_bookings(
        &self,
        station: StationId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Interval>, StorageError>;

    /// Persist all observations or none of them.
    fn commit_bookings(&self, observations: &[Observation]) -> Result<(), StorageError>;

    fn generate_id(&self, start: DateTime<Utc>) -> String;
}

impl ElementsSource for Catalog {
    fn satellite(&self, norad_id: u32) -> Option<&Satellite> {
        Catalog::satellite(self, norad_id)
    }

    fn schedulable_satellites(&self) -> Vec<&Satellite> {
        self.schedulable().collect()
    }

    fn orbital_elements(&self, norad_id: u32) -> Result<&OrbitalElements, PredictError> {
        self.elements(norad_id)
    }
}

impl StationSource for StationDirectory {
    fn station_ids(&self) -> Vec<StationId> {
        self.ids()
    }

    fn station_status(
        &self,
        id: StationId,
        now: DateTime<Utc>,
    ) -> Result<StationStatus, StationError> {
        self.status(id, now)
    }
}

impl BookingStore for Storage {
    fn existing_bookings(
        &self,
        station: StationId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Interval>, StorageError> {
        Storage::existing_bookings(self, station, start, end)
    }

    fn commit_bookings(&self, observations: &[Observation]) -> Result<(), StorageError> {
        self.commit_observations(observations)
    }

    fn generate_id(&self, start: DateTime<Utc>) -> String {
        Storage::generate_id(self, start)
    }
}

/// Satellite and transmitter of a request, both checked to be usable.
fn schedulable_transmitter<'a, E: ElementsSource>(
    elements: &'a E,
    satellite_id: u32,
    transmitter_uuid: &str,
) -> Result<(&'a Satellite, &'a Transmitter), SchedulingError> {
    let satellite = elements
        .satellite(satellite_id)
        .filter(|s| s.is_schedulable())
        .ok_or(SchedulingError::UnknownSatellite(satellite_id))?;
    let transmitter = satellite
        .transmitter(transmitter_uuid)
        .filter(|t| t.alive)
        .ok_or_else(|| SchedulingError::UnknownTransmitter(transmitter_uuid.to_string()))?;
    Ok((satellite, transmitter))
}

#[derive(Debug, Clone)]
pub struct PassQuery {
    pub satellite_id: u32,
    pub transmitter_uuid: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub station: Option<StationId>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StationWindows {
    pub id: StationId,
    pub name: String,
    pub windows: Vec<BookableWindow>,
}

/// Free pass windows of one transmitter per station, for building a batch.
/// Stations without any window are left out.
pub fn pass_windows<E, S, B>(
    elements: &E,
    stations: &S,
    store: &B,
    query: &PassQuery,
    now: DateTime<Utc>,
    min_start_lead: Duration,
) -> Result<Vec<StationWindows>, SchedulingError>
where
    E: ElementsSource,
    S: StationSource,
    B: BookingStore,
{
    if query.end <= query.start {
        return Err(SchedulingError::InvalidRequest(
            "end must be after start".to_string(),
        ));
    }

    let (satellite, transmitter) =
        schedulable_transmitter(elements, query.satellite_id, &query.transmitter_uuid)?;
    let tle = elements.orbital_elements(satellite.norad_id)?;
    let filter = FrequencyFilter::Downlinks(transmitter.downlink_low.into_iter().collect());
    let search = SearchWindow {
        start: query.start,
        end: query.end,
        now,
        min_start_lead,
    };

    let ids = match query.station {
        Some(id) => vec![id],
        None => stations.station_ids(),
    };

    let mut result = Vec::new();
    for id in ids {
        let status = stations.station_status(id, now)?;
        let candidates = generate_windows(tle, &status, &search, &filter)?;
        if candidates.is_empty() {
            continue;
        }

        let ledger: BookingLedger = store
            .existing_bookings(id, query.start, query.end)?
            .into_iter()
            .map(|interval| (id, interval))
            .collect();
        let windows = arbitrate(&candidates, &ledger);
        if !windows.is_empty() {
            result.push(StationWindows {
                id,
                name: status.name,
                windows,
            });
        }
    }

    debug!(
        "{} stations have windows for {} between {} and {}",
        result.len(),
        satellite.name,
        query.start,
        query.end
    );
    Ok(result)
}

/// Every schedulable satellite with elements. Unless `ignore_frequencies`,
/// a satellite only counts where one of its live downlinks is receivable.
fn pass_targets<E: ElementsSource>(
    elements: &E,
    ignore_frequencies: bool,
) -> Vec<PassTarget<'_>> {
    elements
        .schedulable_satellites()
        .into_iter()
        .filter_map(|satellite| {
            let tle = elements.orbital_elements(satellite.norad_id).ok()?;
            let filter = if ignore_frequencies {
                FrequencyFilter::Any
            } else {
                FrequencyFilter::Downlinks(satellite.downlinks())
            };
            Some(PassTarget {
                name: &satellite.name,
                elements: tle,
                filter,
            })
        })
        .collect()
}

/// Free windows of every schedulable satellite over one station, ordered by
/// start. An offline station has none.
pub fn station_windows<E, S, B>(
    elements: &E,
    stations: &S,
    store: &B,
    station: StationId,
    search: &SearchWindow,
) -> Result<Vec<BookableWindow>, SchedulingError>
where
    E: ElementsSource,
    S: StationSource,
    B: BookingStore,
{
    if search.end <= search.start {
        return Err(SchedulingError::InvalidRequest(
            "end must be after start".to_string(),
        ));
    }

    let status = stations.station_status(station, search.now)?;
    let candidates = generate_station_windows(pass_targets(elements, false), &status, search);
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let ledger: BookingLedger = store
        .existing_bookings(station, search.start, search.end)?
        .into_iter()
        .map(|interval| (station, interval))
        .collect();
    let windows = arbitrate(&candidates, &ledger);
    debug!(
        "Station {} has {} free windows between {} and {}",
        station,
        windows.len(),
        search.start,
        search.end
    );
    Ok(windows)
}

/// Upcoming passes of every schedulable satellite over one station.
pub fn station_passes<E, S>(
    elements: &E,
    stations: &S,
    station: StationId,
    now: DateTime<Utc>,
    horizon: Duration,
    min_start_lead: Duration,
    ignore_frequencies: bool,
) -> Result<Vec<PassReport>, SchedulingError>
where
    E: ElementsSource,
    S: StationSource,
{
    let status = stations.station_status(station, now)?;
    let search = SearchWindow {
        start: now,
        end: now + horizon,
        now,
        min_start_lead,
    };

    Ok(upcoming_passes(
        pass_targets(elements, ignore_frequencies),
        &status,
        &search,
    ))
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub satellite_id: u32,
    pub transmitter_uuid: String,
    pub author: String,
    pub observations: Vec<ObservationRequest>,
}

/// First pass touching `[start, end)`, for the stored geometry.
fn pass_geometry(
    tle: &OrbitalElements,
    status: &StationStatus,
    interval: Interval,
) -> Result<Option<PassEvent>, PredictError> {
    Ok(compute_passes(tle, &status.location, interval.start, interval.duration())?
        .next()
        .filter(|event| event.rise_time < interval.end))
}

/// Admit a batch of observations and persist them atomically.
///
/// Every station of the batch is locked (ascending id) for the whole
/// read-plan-commit sequence, so concurrent batches on the same station
/// cannot both pass the conflict check. Returns the new observation ids in
/// request order.
pub fn schedule_batch<E, S, B>(
    elements: &E,
    stations: &S,
    store: &B,
    locks: &StationLocks,
    limits: &ScheduleLimits,
    batch: &BatchRequest,
    now: DateTime<Utc>,
) -> Result<Vec<String>, SchedulingError>
where
    E: ElementsSource,
    S: StationSource,
    B: BookingStore,
{
    if batch.observations.is_empty() {
        return Err(SchedulingError::InvalidRequest(
            "no observations requested".to_string(),
        ));
    }

    let (satellite, transmitter) =
        schedulable_transmitter(elements, batch.satellite_id, &batch.transmitter_uuid)?;
    let tle = elements.orbital_elements(satellite.norad_id)?;

    let mut statuses: Vec<StationStatus> = Vec::new();
    for (index, request) in batch.observations.iter().enumerate() {
        if statuses.iter().any(|s| s.id == request.station_id) {
            continue;
        }
        let status = stations
            .station_status(request.station_id, now)
            .map_err(|e| SchedulingError::from(e).in_batch(index))?;
        if !status.online() {
            return Err(SchedulingError::StationOffline(status.id).in_batch(index));
        }
        statuses.push(status);
    }

    let station_ids: Vec<StationId> = statuses.iter().map(|s| s.id).collect();
    let handles = locks.handles(&station_ids);
    let _guards = handles.lock();

    // Bookings are only needed where a request could touch them.
    let first = batch.observations.iter().map(|r| r.start).min().unwrap_or(now);
    let last = batch.observations.iter().map(|r| r.end).max().unwrap_or(now);
    let mut ledger = BookingLedger::new();
    for id in &station_ids {
        for interval in store.existing_bookings(*id, first, last)? {
            ledger.insert(*id, interval);
        }
    }

    let planned = plan_batch(&batch.observations, &ledger, now, limits)?;

    let mut observations = Vec::with_capacity(planned.len());
    for window in &planned {
        let status = statuses
            .iter()
            .find(|s| s.id == window.station_id)
            .ok_or(SchedulingError::UnknownStation(window.station_id))?;
        let pass = pass_geometry(tle, status, window.interval)?;

        observations.push(Observation {
            id: store.generate_id(window.interval.start),
            satellite_id: satellite.norad_id,
            transmitter_uuid: transmitter.uuid.clone(),
            elements: tle.clone(),
            author: batch.author.clone(),
            station_id: window.station_id,
            start: window.interval.start,
            end: window.interval.end,
            rise_azimuth_deg: pass.as_ref().map(PassEvent::rise_azimuth_deg),
            max_altitude_deg: pass.as_ref().map(PassEvent::max_altitude_deg),
            set_azimuth_deg: pass.as_ref().map(PassEvent::set_azimuth_deg),
            testing: status.state == StationState::Testing,
            vetted_status: VettedStatus::Unknown,
            vetted_by: None,
            vetted_at: None,
        });
    }

    store.commit_bookings(&observations)?;

    info!(
        "Scheduled {} observations of {} for {}",
        observations.len(),
        satellite.name,
        batch.author
    );
    Ok(observations.into_iter().map(|o| o.id).collect())
}
