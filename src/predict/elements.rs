use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sgp4::{Constants, Elements};
use utoipa::ToSchema;

use crate::predict::error::PredictError;

const TLE_LINE_LEN: usize = 69;

/// Two-line element set for one satellite, as received from the TLE source.
///
/// Only the fixed-width layout is checked on construction. The orbital
/// content is validated by [`OrbitalElements::prepare`], so a corrupt set is
/// reported as an error for that satellite when it is first used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrbitalElements {
    pub satellite_id: u32,
    pub name: String,
    pub line1: String,
    pub line2: String,
}

/// Parsed SGP4 state ready for propagation.
pub struct PreparedElements {
    pub elements: Elements,
    pub constants: Constants,
}

impl OrbitalElements {
    pub fn new(name: &str, line1: &str, line2: &str) -> Result<Self, PredictError> {
        let line1 = line1.trim_end();
        let line2 = line2.trim_end();
        let name = name.trim().trim_start_matches("0 ").to_string();

        let label = if name.is_empty() { "unnamed" } else { name.as_str() };
        check_line(label, line1, '1')?;
        check_line(label, line2, '2')?;

        if line1[2..7] != line2[2..7] {
            return Err(PredictError::invalid_elements(
                label,
                "catalog numbers of line 1 and line 2 differ",
            ));
        }

        let satellite_id = line1[2..7].trim().parse::<u32>().map_err(|_| {
            PredictError::invalid_elements(label, "catalog number is not numeric")
        })?;

        Ok(Self {
            satellite_id,
            name,
            line1: line1.to_string(),
            line2: line2.to_string(),
        })
    }

    /// Human readable name, falling back to the catalog number.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("NORAD {}", self.satellite_id)
        } else {
            self.name.clone()
        }
    }

    /// Epoch encoded in line 1, columns 19-32 (`YYDDD.DDDDDDDD`).
    pub fn epoch(&self) -> Result<DateTime<Utc>, PredictError> {
        let field = &self.line1[18..32];
        let err = |msg: &str| PredictError::invalid_elements(self.label(), msg);

        let yy: i32 = field[..2]
            .trim()
            .parse()
            .map_err(|_| err("epoch year is not numeric"))?;
        let day: f64 = field[2..]
            .trim()
            .parse()
            .map_err(|_| err("epoch day is not numeric"))?;
        if !(1.0..367.0).contains(&day) {
            return Err(err("epoch day out of range"));
        }

        // Two-digit years follow the NORAD convention: 57-99 are 19xx.
        let year = if yy < 57 { 2000 + yy } else { 1900 + yy };
        let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| err("epoch year out of range"))?
            .and_utc();

        let micros = ((day - 1.0) * 86_400_000_000.0).round() as i64;
        Ok(jan1 + Duration::microseconds(micros))
    }

    /// Element set number, line 1 columns 66-68.
    pub fn element_set_number(&self) -> Option<u32> {
        self.line1[64..68].trim().parse().ok()
    }

    pub fn prepare(&self) -> Result<PreparedElements, PredictError> {
        let name = if self.name.is_empty() {
            None
        } else {
            Some(self.name.clone())
        };

        let elements = Elements::from_tle(name, self.line1.as_bytes(), self.line2.as_bytes())
            .map_err(|e| PredictError::invalid_elements(self.label(), e))?;
        let constants = Constants::from_elements(&elements)
            .map_err(|e| PredictError::invalid_elements(self.label(), e))?;

        Ok(PreparedElements {
            elements,
            constants,
        })
    }
}

fn check_line(label: &str, line: &str, number: char) -> Result<(), PredictError> {
    if !line.is_ascii() {
        return Err(PredictError::invalid_elements(
            label,
            format!("line {} contains non-ASCII characters", number),
        ));
    }
    if line.len() < TLE_LINE_LEN {
        return Err(PredictError::invalid_elements(
            label,
            format!(
                "line {} is {} characters, expected {}",
                number,
                line.len(),
                TLE_LINE_LEN
            ),
        ));
    }
    let mut chars = line.chars();
    if chars.next() != Some(number) || chars.next() != Some(' ') {
        return Err(PredictError::invalid_elements(
            label,
            format!("line {} must start with \"{} \"", number, number),
        ));
    }
    Ok(())
}
