//! Raster catalog lookup.
//!
//! Translates a [`RasterQuery`] into one raster file per variable per forecast
//! hour with a single batched index query. Hours missing any variable are
//! dropped with a note instead of failing the request.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use drill_common::Variable;
use storage::{IndexQuery, RasterIndex};
use tracing::{debug, warn};

use crate::assembler::Note;
use crate::config::ModelDefinition;
use crate::error::{DrillError, DrillResult};
use crate::query::RasterQuery;

/// One raster file resolved for a (variable, forecast hour).
#[derive(Debug, Clone, PartialEq)]
pub struct RasterFileRecord {
    pub path: String,
    pub variable: Variable,
    /// Index parameter code the file was found under.
    pub parameter: String,
    pub forecast_hour: u32,
    pub model_run: DateTime<Utc>,
}

/// The files for one forecast hour; always holds every variable.
#[derive(Debug, Clone, PartialEq)]
pub struct HourPlan {
    pub forecast_hour: u32,
    pub valid_time: DateTime<Utc>,
    pub files: BTreeMap<Variable, RasterFileRecord>,
}

/// Complete hours in ascending order, plus notes for the dropped ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlan {
    pub hours: Vec<HourPlan>,
    pub notes: Vec<Note>,
}

pub struct CatalogLookup<'a> {
    index: &'a dyn RasterIndex,
}

impl<'a> CatalogLookup<'a> {
    pub fn new(index: &'a dyn RasterIndex) -> Self {
        Self { index }
    }

    /// Resolve every requested hour.
    ///
    /// # Errors
    /// `NotFound` when no hour has all three variables, `Index` when the
    /// index query itself fails.
    pub async fn resolve(
        &self,
        query: &RasterQuery,
        model: &ModelDefinition,
    ) -> DrillResult<ResolvedPlan> {
        let index_query = IndexQuery {
            model: model.catalog_model.clone(),
            parameters: model.parameters.all_codes(),
            model_run: query.model_run(),
            forecast_hours: query.forecast_hours().to_vec(),
        };

        let entries = self.index.find_rasters(&index_query).await?;
        debug!(
            model = %index_query.model,
            entries = entries.len(),
            "Index returned raster entries"
        );

        let mut found: BTreeMap<u32, BTreeMap<Variable, RasterFileRecord>> = BTreeMap::new();
        for entry in entries {
            if !index_query.matches(&entry) {
                continue;
            }
            let Some(variable) = model.parameters.variable_for(&entry.parameter) else {
                continue;
            };
            let files = found.entry(entry.forecast_hour).or_default();
            if files.contains_key(&variable) {
                warn!(
                    forecast_hour = entry.forecast_hour,
                    variable = %variable,
                    path = %entry.storage_path,
                    "Duplicate index entry ignored"
                );
                continue;
            }
            debug!(
                forecast_hour = entry.forecast_hour,
                variable = %variable,
                path = %entry.storage_path,
                "Resolved raster file"
            );
            files.insert(
                variable,
                RasterFileRecord {
                    path: entry.storage_path,
                    variable,
                    parameter: entry.parameter,
                    forecast_hour: entry.forecast_hour,
                    model_run: entry.reference_time,
                },
            );
        }

        let mut hours = Vec::new();
        let mut notes = Vec::new();
        for &hour in query.forecast_hours() {
            let files = found.remove(&hour).unwrap_or_default();
            let missing: Vec<Variable> = Variable::ALL
                .into_iter()
                .filter(|v| !files.contains_key(v))
                .collect();

            if missing.is_empty() {
                hours.push(HourPlan {
                    forecast_hour: hour,
                    valid_time: query.valid_time(hour),
                    files,
                });
                continue;
            }

            let names: Vec<String> = missing
                .iter()
                .map(|v| format!("{} ({})", v.key(), model.parameters.code(*v)))
                .collect();
            warn!(
                forecast_hour = hour,
                missing = %names.join(", "),
                "Dropping forecast hour with incomplete rasters"
            );
            metrics::counter!("drill_forecast_hours_dropped_total").increment(1);
            notes.push(Note {
                forecast_hour: hour,
                reason: format!("missing rasters for {}", names.join(", ")),
            });
        }

        if hours.is_empty() {
            return Err(DrillError::NotFound(format!(
                "no complete set of rasters for model {} run {} hours {:?}",
                model.catalog_model,
                drill_common::format_timestamp(&query.model_run()),
                query.forecast_hours()
            )));
        }

        Ok(ResolvedPlan { hours, notes })
    }
}
