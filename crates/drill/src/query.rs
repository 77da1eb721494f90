//! Normalised extraction query.

use chrono::{DateTime, Utc};
use drill_common::ValidTime;

use crate::error::{DrillError, DrillResult};

/// A validated request: model, run and a non-empty ascending set of hours.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterQuery {
    model: String,
    model_run: DateTime<Utc>,
    forecast_hours: Vec<u32>,
}

impl RasterQuery {
    /// Build a query, deduplicating and sorting the forecast hours.
    pub fn new(
        model: impl Into<String>,
        model_run: DateTime<Utc>,
        forecast_hours: impl IntoIterator<Item = u32>,
    ) -> DrillResult<Self> {
        let model = model.into().trim().to_string();
        if model.is_empty() {
            return Err(DrillError::InvalidParameter("model must not be empty".to_string()));
        }

        let mut forecast_hours: Vec<u32> = forecast_hours.into_iter().collect();
        forecast_hours.sort_unstable();
        forecast_hours.dedup();
        if forecast_hours.is_empty() {
            return Err(DrillError::InvalidParameter(
                "forecast_hours must not be empty".to_string(),
            ));
        }

        Ok(Self {
            model,
            model_run,
            forecast_hours,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn model_run(&self) -> DateTime<Utc> {
        self.model_run
    }

    /// Forecast hours in strictly ascending order.
    pub fn forecast_hours(&self) -> &[u32] {
        &self.forecast_hours
    }

    pub fn valid_time(&self, forecast_hour: u32) -> DateTime<Utc> {
        ValidTime::new(self.model_run, forecast_hour).valid_datetime()
    }
}

/// Parse a comma-separated list of forecast hours.
///
/// Items are either non-negative integers or timestamps at a whole hour on or
/// after the model run, which are converted to hour offsets.
pub fn parse_forecast_hours(s: &str, model_run: DateTime<Utc>) -> DrillResult<Vec<u32>> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_hour_item(item, model_run))
        .collect()
}

fn parse_hour_item(item: &str, model_run: DateTime<Utc>) -> DrillResult<u32> {
    if let Ok(hour) = item.parse::<i64>() {
        return hour_from_i64(hour);
    }

    let valid = drill_common::parse_model_run(item).map_err(|_| {
        DrillError::InvalidParameter(format!("invalid forecast hour '{}'", item))
    })?;
    let offset = valid - model_run;
    if offset.num_seconds() % 3600 != 0 {
        return Err(DrillError::InvalidParameter(format!(
            "forecast time '{}' is not a whole hour after the model run",
            item
        )));
    }
    hour_from_i64(offset.num_hours())
}

/// Convert a signed hour, rejecting negatives and overflow.
pub fn hour_from_i64(hour: i64) -> DrillResult<u32> {
    u32::try_from(hour).map_err(|_| {
        DrillError::InvalidParameter(format!("forecast hour {} must be a non-negative integer", hour))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn run() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_hours_sorted_and_deduplicated() {
        let q = RasterQuery::new("hrdps", run(), [12, 0, 6, 6, 0]).unwrap();
        assert_eq!(q.forecast_hours(), &[0, 6, 12]);
        assert_eq!(q.model(), "hrdps");
        assert_eq!(q.valid_time(12), Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            RasterQuery::new("hrdps", run(), []),
            Err(DrillError::InvalidParameter(_))
        ));
        assert!(RasterQuery::new("  ", run(), [0]).is_err());
    }

    #[test]
    fn test_parse_forecast_hours() {
        assert_eq!(parse_forecast_hours("0, 6,12", run()).unwrap(), vec![0, 6, 12]);
        assert_eq!(
            parse_forecast_hours("2024-03-01T18:00:00Z,3", run()).unwrap(),
            vec![6, 3]
        );
        assert!(parse_forecast_hours("-1", run()).is_err());
        assert!(parse_forecast_hours("abc", run()).is_err());
        assert!(parse_forecast_hours("2024-03-01T11:00:00Z", run()).is_err());
        assert!(parse_forecast_hours("2024-03-01T12:30:00Z", run()).is_err());
    }
}
