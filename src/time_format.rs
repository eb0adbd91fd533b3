//! Timestamp parsing and the `YYYY-MM-DD HH:MM:SS.ffffff` API format.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub const WIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn format_wire(dt: &DateTime<Utc>) -> String {
    dt.format(WIRE_FORMAT).to_string()
}

/// An absolute UTC timestamp: the wire format (fraction optional),
/// `YYYY-MM-DD HH:MM`, or RFC 3339.
pub fn parse_absolute(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }

    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", s, e))
}

/// Like [`parse_absolute`], plus `now`, `now+2h` and `now-30m`.
pub fn parse_time(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let s = s.trim();

    if let Some(rest) = s.to_lowercase().strip_prefix("now") {
        let rest = rest.trim();
        if rest.is_empty() {
            return Ok(now);
        }
        let (neg, rest) = match rest.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, rest.strip_prefix('+').unwrap_or(rest)),
        };
        let dur = parse_duration(rest)?;
        return Ok(if neg { now - dur } else { now + dur });
    }

    parse_absolute(s)
}

pub fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s.trim())
        .map_err(|e| e.to_string())
        .and_then(|d| Duration::from_std(d).map_err(|e| e.to_string()))
}

/// `#[serde(with = "crate::time_format::wire")]`
pub mod wire {
    use super::*;

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_wire(dt))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_absolute(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 50, 0).unwrap()
    }

    #[test]
    fn test_wire_format_has_six_fraction_digits() {
        assert_eq!(format_wire(&t0()), "2024-03-01 09:50:00.000000");
        let frac = t0() + Duration::microseconds(1_500);
        assert_eq!(format_wire(&frac), "2024-03-01 09:50:00.001500");
        assert_eq!(parse_absolute(&format_wire(&frac)).unwrap(), frac);
    }

    #[test]
    fn test_absolute_forms() {
        assert_eq!(parse_absolute("2024-03-01 09:50:00").unwrap(), t0());
        assert_eq!(parse_absolute("2024-03-01 09:50").unwrap(), t0());
        assert_eq!(parse_absolute("2024-03-01T09:50:00Z").unwrap(), t0());
        assert_eq!(parse_absolute("2024-03-01T11:50:00+02:00").unwrap(), t0());
        assert!(parse_absolute("yesterday").is_err());
    }

    #[test]
    fn test_relative_forms() {
        assert_eq!(parse_time("now", t0()).unwrap(), t0());
        assert_eq!(
            parse_time("now+2h", t0()).unwrap(),
            t0() + Duration::hours(2)
        );
        assert_eq!(
            parse_time("NOW - 30m", t0()).unwrap(),
            t0() - Duration::minutes(30)
        );
        assert!(parse_time("now+soon", t0()).is_err());
    }
}
