use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::predict::error::PredictError;

// WGS-84
pub(crate) const EARTH_RADIUS_KM: f64 = 6378.137;
pub(crate) const ECCENTRICITY_SQ: f64 = 0.00669437999014;

/// Geographic position of a station and the elevation it can track above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StationLocation {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
    pub horizon_deg: f64,
}

impl StationLocation {
    pub fn new(
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: f64,
        horizon_deg: f64,
    ) -> Result<Self, PredictError> {
        let location = Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
            horizon_deg,
        };
        location.validate()?;
        Ok(location)
    }

    pub fn validate(&self) -> Result<(), PredictError> {
        if !(-90.0..=90.0).contains(&self.latitude_deg) {
            return Err(PredictError::InvalidLocation(format!(
                "latitude {} outside [-90, 90]",
                self.latitude_deg
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude_deg) {
            return Err(PredictError::InvalidLocation(format!(
                "longitude {} outside [-180, 180]",
                self.longitude_deg
            )));
        }
        if !self.altitude_m.is_finite() {
            return Err(PredictError::InvalidLocation("altitude is not finite".into()));
        }
        if !(0.0..=90.0).contains(&self.horizon_deg) {
            return Err(PredictError::InvalidLocation(format!(
                "horizon {} outside [0, 90]",
                self.horizon_deg
            )));
        }
        Ok(())
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        let a = EARTH_RADIUS_KM;
        let e2 = ECCENTRICITY_SQ;
        let lat = self.lat_rad();
        let lon = self.lon_rad();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let alt_km = self.altitude_m / 1000.0;
        [
            (n + alt_km) * cos_lat * lon.cos(),
            (n + alt_km) * cos_lat * lon.sin(),
            (n * (1.0 - e2) + alt_km) * sin_lat,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range_coordinates() {
        assert!(StationLocation::new(91.0, 0.0, 0.0, 10.0).is_err());
        assert!(StationLocation::new(0.0, -180.5, 0.0, 10.0).is_err());
        assert!(StationLocation::new(0.0, 0.0, 0.0, -1.0).is_err());
        assert!(StationLocation::new(-90.0, 180.0, 120.0, 0.0).is_ok());
    }

    #[test]
    fn test_equator_ecef_position() {
        let station = StationLocation::new(0.0, 0.0, 0.0, 0.0).unwrap();
        let pos = station.position_ecef_km();
        assert!((pos[0] - 6378.137).abs() < 1e-6);
        assert!(pos[1].abs() < 1e-6);
        assert!(pos[2].abs() < 1e-6);
    }
}
