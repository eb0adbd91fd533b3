use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::predict::elements::{OrbitalElements, PreparedElements};
use crate::predict::error::PredictError;
use crate::predict::ground_station::{StationLocation, EARTH_RADIUS_KM, ECCENTRICITY_SQ};
use crate::predict::types::PolarPoint;

/// Topocentric direction to a satellite. Angles are in radians.
#[derive(Debug, Clone, Copy)]
pub struct LookAngles {
    pub azimuth_rad: f64,
    pub elevation_rad: f64,
    pub range_km: f64,
}

/// Ground point below a satellite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct SubPoint {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

/// Earth-fixed satellite position at `timestamp`, in km.
fn ecef_position(
    prepared: &PreparedElements,
    timestamp: DateTime<Utc>,
) -> Result<[f64; 3], String> {
    let minutes = prepared
        .elements
        .datetime_to_minutes_since_epoch(&timestamp.naive_utc())
        .map_err(|e| e.to_string())?;

    let prediction = prepared
        .constants
        .propagate(minutes)
        .map_err(|e| e.to_string())?;

    let sidereal =
        sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&timestamp.naive_utc()));

    Ok(teme_to_ecef_position(prediction.position, sidereal))
}

/// Propagates the elements to `timestamp` and returns the direction seen from
/// `station`. Errors are SGP4 numerical failures for that instant.
pub fn look_angles(
    station: &StationLocation,
    prepared: &PreparedElements,
    timestamp: DateTime<Utc>,
) -> Result<LookAngles, String> {
    let sat_ecef = ecef_position(prepared, timestamp)?;
    let sta_ecef = station.position_ecef_km();

    let dr = [
        sat_ecef[0] - sta_ecef[0],
        sat_ecef[1] - sta_ecef[1],
        sat_ecef[2] - sta_ecef[2],
    ];
    let range_km = (dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]).sqrt();

    let (east, north, up) = ecef_to_enu(dr, station.lat_rad(), station.lon_rad());
    let azimuth_rad = east.atan2(north).rem_euclid(std::f64::consts::TAU);
    let elevation_rad = if range_km > 0.0 {
        (up / range_km).clamp(-1.0, 1.0).asin()
    } else {
        0.0
    };

    Ok(LookAngles {
        azimuth_rad,
        elevation_rad,
        range_km,
    })
}

/// Where the satellite is over the ground at `timestamp`.
pub fn satellite_position(
    elements: &OrbitalElements,
    timestamp: DateTime<Utc>,
) -> Result<SubPoint, PredictError> {
    let prepared = elements.prepare()?;
    let ecef = ecef_position(&prepared, timestamp)
        .map_err(|e| PredictError::propagation(elements.label(), e))?;
    Ok(ecef_to_geodetic(ecef))
}

/// `points` look angles spread evenly from `rise` to `set`, both included.
pub fn polar_track(
    station: &StationLocation,
    prepared: &PreparedElements,
    rise: DateTime<Utc>,
    set: DateTime<Utc>,
    points: usize,
) -> Result<Vec<PolarPoint>, String> {
    let steps = points.max(2) as i32 - 1;
    let span = set - rise;
    (0..=steps)
        .map(|i| {
            let time = rise + span * i / steps;
            let angles = look_angles(station, prepared, time)?;
            Ok(PolarPoint {
                time,
                azimuth_deg: angles.azimuth_rad.to_degrees(),
                altitude_deg: angles.elevation_rad.to_degrees(),
            })
        })
        .collect()
}

/// WGS-84 geodetic coordinates of an Earth-fixed position, by fixed-point
/// iteration on the latitude.
pub fn ecef_to_geodetic(r: [f64; 3]) -> SubPoint {
    let p = (r[0] * r[0] + r[1] * r[1]).sqrt();
    let longitude = r[1].atan2(r[0]);
    let mut latitude = r[2].atan2(p * (1.0 - ECCENTRICITY_SQ));
    let mut altitude = 0.0;
    for _ in 0..6 {
        let sin_lat = latitude.sin();
        let n = EARTH_RADIUS_KM / (1.0 - ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
        altitude = if latitude.cos().abs() > 1e-9 {
            p / latitude.cos() - n
        } else {
            r[2].abs() - n * (1.0 - ECCENTRICITY_SQ)
        };
        latitude = r[2].atan2(p * (1.0 - ECCENTRICITY_SQ * n / (n + altitude)));
    }
    SubPoint {
        latitude_deg: latitude.to_degrees(),
        longitude_deg: longitude.to_degrees(),
        altitude_km: altitude,
    }
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}

/// Whole degrees, rounded half away from zero.
pub fn round_degrees(rad: f64) -> f64 {
    rad.to_degrees().round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::elements::tests::iss;
    use chrono::Duration;

    #[test]
    fn test_enu_straight_up_at_equator() {
        let (e, n, u) = ecef_to_enu([1.0, 0.0, 0.0], 0.0, 0.0);
        assert!(e.abs() < 1e-12);
        assert!(n.abs() < 1e-12);
        assert!((u - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_degrees() {
        assert_eq!(round_degrees(10.6_f64.to_radians()), 11.0);
        assert_eq!(round_degrees(-10.6_f64.to_radians()), -11.0);
        assert_eq!(round_degrees(10.4_f64.to_radians()), 10.0);
        assert_eq!(round_degrees(std::f64::consts::PI), 180.0);
    }

    #[test]
    fn test_geodetic_of_station_position() {
        let station = StationLocation::new(51.5, -0.1, 20.0, 0.0).unwrap();
        let point = ecef_to_geodetic(station.position_ecef_km());
        assert!((point.latitude_deg - 51.5).abs() < 1e-6);
        assert!((point.longitude_deg + 0.1).abs() < 1e-6);
        assert!((point.altitude_km - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_iss_stays_within_its_inclination() {
        let elements = iss();
        let epoch = elements.epoch().unwrap();
        for minutes in (0..=90).step_by(15) {
            let point = satellite_position(&elements, epoch + Duration::minutes(minutes)).unwrap();
            assert!(point.latitude_deg.abs() <= 52.0);
            assert!((-180.0..=180.0).contains(&point.longitude_deg));
            assert!((300.0..500.0).contains(&point.altitude_km));
        }
    }

    #[test]
    fn test_polar_track_spans_the_pass() {
        let station = StationLocation::new(51.5, -0.1, 20.0, 0.0).unwrap();
        let prepared = iss().prepare().unwrap();
        let rise = iss().epoch().unwrap();
        let set = rise + Duration::minutes(9);

        let track = polar_track(&station, &prepared, rise, set, 10).unwrap();
        assert_eq!(track.len(), 10);
        assert_eq!(track[0].time, rise);
        assert_eq!(track[9].time, set);
        assert!(track.windows(2).all(|pair| pair[0].time < pair[1].time));
        assert!(track.iter().all(|p| (0.0..360.0).contains(&p.azimuth_deg)));
    }
}
