use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::predict::elements::OrbitalElements;
use crate::predict::error::PredictError;
use crate::predict::look_angles::polar_track;
use crate::predict::pass_finder::compute_passes;
use crate::predict::types::{PassEvent, PassReport};
use crate::station::{StationId, StationStatus};

const POLAR_POINTS: usize = 10;

/// Which downlinks must be receivable by a station for a satellite to count.
#[derive(Debug, Clone, PartialEq)]
pub enum FrequencyFilter {
    Any,
    Downlinks(Vec<u64>),
}

/// Time bounds and booking lead for one generation request.
#[derive(Debug, Clone, Copy)]
pub struct SearchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub min_start_lead: Duration,
}

impl SearchWindow {
    fn earliest_bookable(&self) -> DateTime<Utc> {
        self.now + self.min_start_lead
    }
}

/// One satellite to generate passes for.
#[derive(Debug, Clone)]
pub struct PassTarget<'a> {
    pub name: &'a str,
    pub elements: &'a OrbitalElements,
    pub filter: FrequencyFilter,
}

/// A provisional observation window derived from a pass.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CandidateWindow {
    pub satellite_id: u32,
    pub station_id: StationId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rise_azimuth_deg: f64,
    pub max_altitude_deg: f64,
    /// False when the pass rises too soon to be booked.
    pub valid: bool,
}

/// Passes of one satellite over one station that survive the frequency and
/// horizon filters.
fn qualifying_passes(
    elements: &OrbitalElements,
    station: &StationStatus,
    search: &SearchWindow,
    filter: &FrequencyFilter,
) -> Result<Vec<PassEvent>, PredictError> {
    if let FrequencyFilter::Downlinks(downlinks) = filter {
        if !station.frequency_ranges.supports_any(downlinks) {
            log::debug!(
                "Station {} cannot receive {} downlinks {:?}, skipping",
                station.id,
                elements.label(),
                downlinks
            );
            return Ok(Vec::new());
        }
    }

    if search.end <= search.start {
        return Ok(Vec::new());
    }

    let mut passes = compute_passes(
        elements,
        &station.location,
        search.start,
        search.end - search.start,
    )?;

    let mut kept = Vec::new();
    for event in passes.by_ref() {
        if event.rise_time > search.end {
            break;
        }
        if event.max_altitude_deg() < station.min_horizon_deg() || event.rise_time >= event.set_time
        {
            continue;
        }
        kept.push(event);
    }

    if kept.is_empty() {
        log::debug!(
            "No pass of {} above {} deg for station {} ({:?})",
            elements.label(),
            station.min_horizon_deg(),
            station.id,
            passes.outcome()
        );
    }

    Ok(kept)
}

/// Candidate windows of one satellite over one online station, ordered by
/// rise. Windows are cut to `[search.start, search.end)`, so a pass already
/// in progress starts at `search.start`.
pub fn generate_windows(
    elements: &OrbitalElements,
    station: &StationStatus,
    search: &SearchWindow,
    filter: &FrequencyFilter,
) -> Result<Vec<CandidateWindow>, PredictError> {
    if !station.online() {
        log::debug!("Station {} is {}, skipping", station.id, station.state);
        return Ok(Vec::new());
    }

    Ok(qualifying_passes(elements, station, search, filter)?
        .into_iter()
        .map(|event| {
            let start = event.rise_time.max(search.start);
            CandidateWindow {
                satellite_id: elements.satellite_id,
                station_id: station.id,
                start,
                end: event.set_time.min(search.end),
                rise_azimuth_deg: event.rise_azimuth_deg(),
                max_altitude_deg: event.max_altitude_deg(),
                valid: start >= search.earliest_bookable(),
            }
        })
        .filter(|w| w.start < w.end)
        .collect())
}

/// Candidate windows of several satellites over one station, sorted by rise
/// time and then satellite id. Satellites with unusable elements are skipped.
pub fn generate_station_windows<'a>(
    targets: impl IntoIterator<Item = PassTarget<'a>>,
    station: &StationStatus,
    search: &SearchWindow,
) -> Vec<CandidateWindow> {
    let mut windows = Vec::new();
    for target in targets {
        match generate_windows(target.elements, station, search, &target.filter) {
            Ok(found) => windows.extend(found),
            Err(e) => log::warn!("Failed to predict passes for {}: {}", target.name, e),
        }
    }
    windows.sort_by_key(|w| (w.start, w.satellite_id));
    windows
}

fn pass_reports(
    target: &PassTarget<'_>,
    station: &StationStatus,
    search: &SearchWindow,
) -> Result<Vec<PassReport>, PredictError> {
    let events = qualifying_passes(target.elements, station, search, &target.filter)?;
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let prepared = target.elements.prepare()?;
    events
        .iter()
        .map(|event| {
            let track = polar_track(
                &station.location,
                &prepared,
                event.rise_time,
                event.set_time,
                POLAR_POINTS,
            )
            .map_err(|e| PredictError::propagation(target.elements.label(), e))?;
            let valid = event.rise_time >= search.earliest_bookable();
            Ok(PassReport::new(target.name, target.elements.satellite_id, event, valid)
                .with_polar_data(track))
        })
        .collect()
}

/// Full pass reports for a station's upcoming pass list. Unlike
/// [`generate_windows`] this ignores the station's online state.
pub fn upcoming_passes<'a>(
    targets: impl IntoIterator<Item = PassTarget<'a>>,
    station: &StationStatus,
    search: &SearchWindow,
) -> Vec<PassReport> {
    let mut reports = Vec::new();
    for target in targets {
        match pass_reports(&target, station, search) {
            Ok(found) => reports.extend(found),
            Err(e) => log::warn!("Failed to predict passes for {}: {}", target.name, e),
        }
    }
    reports.sort_by_key(|r| (r.rise_time, r.norad_id));
    reports
}
