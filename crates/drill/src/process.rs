//! The drill process: request validation and orchestration.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use grid_processor::{RasterHandles, RasterSource};
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use storage::RasterIndex;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::assembler::{BoundaryFlag, ExtractionRecord, ExtractionResult, ResultBuilder};
use crate::config::DrillConfig;
use crate::error::{DrillError, DrillResult};
use crate::geometry::QueryGeometry;
use crate::lookup::{CatalogLookup, HourPlan};
use crate::normalize::GeometryNormalizer;
use crate::output::{EncodedOutput, OutputFormat};
use crate::query::{hour_from_i64, parse_forecast_hours, RasterQuery};
use crate::sampler;

/// Invocation parameters as received from the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct DrillRequest {
    pub model: String,
    pub model_run: String,
    pub forecast_hours: ForecastHoursInput,
    /// GeoJSON geometry, Feature or FeatureCollection.
    pub geometry: Value,
    /// CRS of the geometry; overrides any `crs` member of the GeoJSON.
    #[serde(default)]
    pub crs: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// Forecast hours as a JSON list or a comma-separated string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ForecastHoursInput {
    List(Vec<i64>),
    Text(String),
}

impl DrillRequest {
    /// Requested output format, defaulting to GeoJSON.
    pub fn output_format(&self) -> DrillResult<OutputFormat> {
        match self.format.as_deref().map(str::trim) {
            None | Some("") => Ok(OutputFormat::default()),
            Some(name) => name.parse(),
        }
    }

    /// Validate model, run and hours into a [`RasterQuery`].
    pub fn query(&self) -> DrillResult<RasterQuery> {
        let model_run = drill_common::parse_model_run(&self.model_run)
            .map_err(|e| DrillError::InvalidParameter(format!("model_run: {}", e)))?;
        let hours = match &self.forecast_hours {
            ForecastHoursInput::List(hours) => hours
                .iter()
                .map(|h| hour_from_i64(*h))
                .collect::<DrillResult<Vec<_>>>()?,
            ForecastHoursInput::Text(text) => parse_forecast_hours(text, model_run)?,
        };
        RasterQuery::new(&self.model, model_run, hours)
    }
}

/// Result of extracting one forecast hour on a worker.
enum HourOutcome {
    Extracted {
        record: ExtractionRecord,
        flags: Vec<BoundaryFlag>,
    },
    /// A raster of this hour could not be read; the hour is dropped.
    ReadFailed {
        forecast_hour: u32,
        path: String,
        message: String,
    },
    /// Aborts the whole request.
    Fatal(DrillError),
}

/// Executes drill requests against a raster index.
pub struct DrillProcess {
    index: Arc<dyn RasterIndex>,
    config: DrillConfig,
}

impl DrillProcess {
    pub fn new(index: Arc<dyn RasterIndex>, config: DrillConfig) -> Self {
        Self { index, config }
    }

    /// Validate and run a request, encoding the result in the requested format.
    pub async fn run(&self, request: &DrillRequest) -> DrillResult<EncodedOutput> {
        let format = request.output_format()?;
        let result = self.execute(request).await?;
        format.encode(&result)
    }

    /// Validate and run a request.
    ///
    /// Every parameter is checked before the index is queried.
    pub async fn execute(&self, request: &DrillRequest) -> DrillResult<ExtractionResult> {
        metrics::counter!("drill_requests_total").increment(1);

        request.output_format()?;
        let query = request.query()?;
        let geometry = QueryGeometry::from_geojson(
            &request.geometry,
            request.crs.as_deref(),
            &self.config.default_crs()?,
            self.config.ring_closure_tolerance,
        )?;

        self.extract(&query, geometry).await
    }

    /// Run an already validated query.
    pub async fn extract(
        &self,
        query: &RasterQuery,
        geometry: QueryGeometry,
    ) -> DrillResult<ExtractionResult> {
        let span = info_span!(
            "drill",
            model = %query.model(),
            model_run = %drill_common::format_timestamp(&query.model_run()),
            hours = query.forecast_hours().len(),
            query_type = %geometry.query_type(),
        );
        let start = Instant::now();
        let result = self.extract_inner(query, geometry).instrument(span).await;
        metrics::histogram!("drill_extraction_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn extract_inner(
        &self,
        query: &RasterQuery,
        geometry: QueryGeometry,
    ) -> DrillResult<ExtractionResult> {
        let model = self.config.resolve_model(query.model());
        let plan = CatalogLookup::new(self.index.as_ref())
            .resolve(query, &model)
            .await?;

        let mut builder = ResultBuilder::new(query.model(), query.model_run(), geometry.clone());
        for note in plan.notes {
            builder.add_note(note);
        }

        let normalizer = GeometryNormalizer::new(geometry);
        let hours = plan.hours;
        let workers = self.config.worker_count().min(hours.len()).max(1);
        let span = Span::current();

        let outcomes =
            tokio::task::spawn_blocking(move || extract_hours(&hours, &normalizer, workers, &span))
                .await
                .map_err(|e| DrillError::Internal(format!("extraction task failed: {}", e)))??;

        for outcome in outcomes {
            match outcome {
                HourOutcome::Extracted { record, flags } => {
                    for flag in flags {
                        builder.add_boundary_flag(flag);
                    }
                    builder.add_record(record);
                }
                HourOutcome::ReadFailed {
                    forecast_hour,
                    path,
                    message,
                } => {
                    warn!(forecast_hour, path = %path, error = %message, "Dropping forecast hour with unreadable raster");
                    metrics::counter!("drill_forecast_hours_dropped_total").increment(1);
                    builder.record_read_failure(forecast_hour, &path, &message);
                }
                HourOutcome::Fatal(err) => return Err(err),
            }
        }

        let result = builder.finish()?;
        info!(
            records = result.records().len(),
            notes = result.notes().len(),
            out_of_bounds = result.out_of_bounds().len(),
            "Extraction complete"
        );
        Ok(result)
    }
}

/// Extract every planned hour on a dedicated pool; each worker keeps its own handles.
fn extract_hours(
    hours: &[HourPlan],
    normalizer: &GeometryNormalizer,
    workers: usize,
    span: &Span,
) -> DrillResult<Vec<HourOutcome>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("drill-worker-{}", i))
        .build()
        .map_err(|e| DrillError::Internal(format!("failed to build worker pool: {}", e)))?;

    Ok(pool.install(|| {
        hours
            .par_iter()
            .map_init(RasterHandles::new, |handles, plan| {
                let _entered = span.enter();
                extract_hour(handles, plan, normalizer)
            })
            .collect()
    }))
}

fn extract_hour(
    handles: &mut RasterHandles,
    plan: &HourPlan,
    normalizer: &GeometryNormalizer,
) -> HourOutcome {
    let mut values = BTreeMap::new();
    let mut flags = Vec::new();

    for (variable, file) in &plan.files {
        let raster = match handles.open(&file.path, Some(file.parameter.as_str())) {
            Ok(raster) => raster,
            Err(e) => {
                return HourOutcome::ReadFailed {
                    forecast_hour: plan.forecast_hour,
                    path: file.path.clone(),
                    message: e.to_string(),
                }
            }
        };

        let geometry = match normalizer.reproject(&raster.metadata().crs) {
            Ok(geometry) => geometry,
            Err(e) => return HourOutcome::Fatal(e),
        };

        let outcome = match sampler::sample(raster, &geometry) {
            Ok(outcome) => outcome,
            Err(e) => {
                return HourOutcome::ReadFailed {
                    forecast_hour: plan.forecast_hour,
                    path: file.path.clone(),
                    message: e.to_string(),
                }
            }
        };

        debug!(
            forecast_hour = plan.forecast_hour,
            variable = %variable,
            path = %file.path,
            out_of_bounds = outcome.out_of_bounds.len(),
            "Sampled raster"
        );
        flags.extend(outcome.out_of_bounds.into_iter().map(|vertex| BoundaryFlag {
            forecast_hour: plan.forecast_hour,
            variable: *variable,
            vertex,
        }));
        values.insert(*variable, outcome.value);
    }

    HourOutcome::Extracted {
        record: ExtractionRecord {
            forecast_hour: plan.forecast_hour,
            valid_time: plan.valid_time,
            values,
        },
        flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> DrillRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_forecast_hours_forms() {
        let list = request(json!({
            "model": "HRDPS",
            "model_run": "2024-03-01T12:00:00Z",
            "forecast_hours": [6, 0, 6],
            "geometry": {"type": "Point", "coordinates": [0, 0]}
        }));
        assert_eq!(list.query().unwrap().forecast_hours(), &[0, 6]);

        let text = request(json!({
            "model": "HRDPS",
            "model_run": "2024-03-01T12:00:00Z",
            "forecast_hours": "0, 2024-03-01T18:00:00Z",
            "geometry": {"type": "Point", "coordinates": [0, 0]},
            "format": "csv"
        }));
        assert_eq!(text.query().unwrap().forecast_hours(), &[0, 6]);
        assert_eq!(text.output_format().unwrap(), OutputFormat::Csv);
    }

    #[test]
    fn test_request_rejects_bad_parameters() {
        let base = json!({
            "model": "HRDPS",
            "model_run": "2024-03-01T12:00:00Z",
            "forecast_hours": [0],
            "geometry": {"type": "Point", "coordinates": [0, 0]}
        });

        let mut negative = base.clone();
        negative["forecast_hours"] = json!([-1]);
        assert!(matches!(
            request(negative).query(),
            Err(DrillError::InvalidParameter(_))
        ));

        let mut empty = base.clone();
        empty["forecast_hours"] = json!([]);
        assert!(request(empty).query().is_err());

        let mut bad_run = base.clone();
        bad_run["model_run"] = json!("yesterday");
        assert!(matches!(
            request(bad_run).query(),
            Err(DrillError::InvalidParameter(_))
        ));

        let mut bad_format = base;
        bad_format["format"] = json!("html");
        assert!(request(bad_format).output_format().is_err());
    }
}
