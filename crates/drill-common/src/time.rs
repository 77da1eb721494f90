//! Time handling for model runs and forecast hours.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used in index entries and output documents.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Combines reference time (model run time) and forecast offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidTime {
    /// Model run/reference time
    pub reference_time: DateTime<Utc>,
    /// Forecast hour offset from reference time
    pub forecast_hour: u32,
}

impl ValidTime {
    pub fn new(reference_time: DateTime<Utc>, forecast_hour: u32) -> Self {
        Self {
            reference_time,
            forecast_hour,
        }
    }

    /// Calculate the actual valid time (reference + forecast offset)
    pub fn valid_datetime(&self) -> DateTime<Utc> {
        self.reference_time + Duration::hours(self.forecast_hour as i64)
    }
}

/// Parse a model run timestamp.
///
/// Supports RFC 3339 ("2021-02-25T12:00:00Z"), naive ISO 8601 assumed UTC,
/// ISO 8601 without seconds, and the compact `YYYYMMDDHH` run stamp.
pub fn parse_model_run(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let bare = s.trim_end_matches('Z');
    for layout in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(bare, layout) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if s.len() == 10 && s.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&format!("{}0000", s), "%Y%m%d%H%M%S") {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 2, 25, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_model_run_layouts() {
        assert_eq!(parse_model_run("2021-02-25T12:00:00Z").unwrap(), run());
        assert_eq!(parse_model_run("2021-02-25T12:00:00+00:00").unwrap(), run());
        assert_eq!(parse_model_run("2021-02-25T12:00:00").unwrap(), run());
        assert_eq!(parse_model_run("2021-02-25T12:00Z").unwrap(), run());
        assert_eq!(parse_model_run("2021022512").unwrap(), run());
        assert!(parse_model_run("yesterday").is_err());
    }

    #[test]
    fn test_valid_time() {
        let vt = ValidTime::new(run(), 30);
        assert_eq!(format_timestamp(&vt.valid_datetime()), "2021-02-26T18:00:00Z");
    }
}
