//! Result assembly.
//!
//! [`ResultBuilder`] accumulates per-hour records, boundary flags and notes in
//! any order; [`ResultBuilder::finish`] sorts them and freezes the result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use drill_common::Variable;
use serde::Serialize;

use crate::error::{DrillError, DrillResult};
use crate::geometry::{QueryGeometry, QueryType};
use crate::sampler::SampledValue;

/// Values of every variable for one forecast hour.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRecord {
    pub forecast_hour: u32,
    pub valid_time: DateTime<Utc>,
    pub values: BTreeMap<Variable, SampledValue>,
}

impl ExtractionRecord {
    pub fn value(&self, variable: Variable) -> Option<&SampledValue> {
        self.values.get(&variable)
    }
}

/// A sampled position outside a raster grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryFlag {
    pub forecast_hour: u32,
    pub variable: Variable,
    /// Vertex index, `None` for a polygon that misses the grid.
    pub vertex: Option<usize>,
}

/// A forecast hour left out of the result, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub forecast_hour: u32,
    pub reason: String,
}

/// The assembled, immutable extraction result.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    model: String,
    model_run: DateTime<Utc>,
    geometry: QueryGeometry,
    records: Vec<ExtractionRecord>,
    out_of_bounds: Vec<BoundaryFlag>,
    notes: Vec<Note>,
}

impl ExtractionResult {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn model_run(&self) -> DateTime<Utc> {
        self.model_run
    }

    pub fn query_type(&self) -> QueryType {
        self.geometry.query_type()
    }

    /// The input geometry in its source CRS.
    pub fn geometry(&self) -> &QueryGeometry {
        &self.geometry
    }

    /// Records in strictly ascending forecast-hour order.
    pub fn records(&self) -> &[ExtractionRecord] {
        &self.records
    }

    pub fn out_of_bounds(&self) -> &[BoundaryFlag] {
        &self.out_of_bounds
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn forecast_hours(&self) -> Vec<u32> {
        self.records.iter().map(|r| r.forecast_hour).collect()
    }
}

pub struct ResultBuilder {
    model: String,
    model_run: DateTime<Utc>,
    geometry: QueryGeometry,
    records: Vec<ExtractionRecord>,
    out_of_bounds: Vec<BoundaryFlag>,
    notes: Vec<Note>,
    first_read_failure: Option<(String, String)>,
}

impl ResultBuilder {
    pub fn new(model: impl Into<String>, model_run: DateTime<Utc>, geometry: QueryGeometry) -> Self {
        Self {
            model: model.into(),
            model_run,
            geometry,
            records: Vec::new(),
            out_of_bounds: Vec::new(),
            notes: Vec::new(),
            first_read_failure: None,
        }
    }

    pub fn add_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    pub fn add_boundary_flag(&mut self, flag: BoundaryFlag) {
        self.out_of_bounds.push(flag);
    }

    pub fn add_record(&mut self, record: ExtractionRecord) {
        self.records.push(record);
    }

    /// Drop a forecast hour because one of its rasters could not be read.
    pub fn record_read_failure(&mut self, forecast_hour: u32, path: &str, message: &str) {
        if self.first_read_failure.is_none() {
            self.first_read_failure = Some((path.to_string(), message.to_string()));
        }
        self.notes.push(Note {
            forecast_hour,
            reason: format!("failed to read {}: {}", path, message),
        });
    }

    /// Freeze the result.
    ///
    /// # Errors
    /// With no records, `RasterRead` if any raster failed to read, else `NotFound`.
    pub fn finish(mut self) -> DrillResult<ExtractionResult> {
        if self.records.is_empty() {
            return Err(match self.first_read_failure {
                Some((path, message)) => DrillError::RasterRead { path, message },
                None => DrillError::NotFound(format!(
                    "no forecast hours could be extracted for model {} run {}",
                    self.model,
                    drill_common::format_timestamp(&self.model_run)
                )),
            });
        }

        self.records.sort_by_key(|r| r.forecast_hour);
        self.out_of_bounds
            .sort_by_key(|f| (f.forecast_hour, f.variable, f.vertex));
        self.notes.sort_by_key(|n| n.forecast_hour);

        Ok(ExtractionResult {
            model: self.model,
            model_run: self.model_run,
            geometry: self.geometry,
            records: self.records,
            out_of_bounds: self.out_of_bounds,
            notes: self.notes,
        })
    }
}
