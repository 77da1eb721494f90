//! Flat CSV encoding.
//!
//! Point and line queries produce one row per forecast hour and vertex.
//! Polygon queries produce one row per forecast hour located at the exterior
//! ring's centroid, with `_min`, `_mean` and `_max` columns per variable.

use drill_common::{format_timestamp, Variable};

use crate::assembler::ExtractionResult;
use crate::error::{DrillError, DrillResult};
use crate::geometry::{GeometryKind, QueryType};
use crate::sampler::SampledValue;

pub fn to_csv(result: &ExtractionResult) -> DrillResult<String> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    let polygon = result.query_type() == QueryType::Polygon;

    let mut header: Vec<String> = ["forecast_hour", "valid_time", "vertex", "x", "y"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for variable in Variable::ALL {
        if polygon {
            for stat in ["min", "mean", "max"] {
                header.push(format!("{}_{}", variable.key(), stat));
            }
        } else {
            header.push(variable.key().to_string());
        }
    }
    writer.write_record(&header)?;

    match &result.geometry().kind {
        GeometryKind::Polygon(rings) => {
            let (x, y) = rings
                .centroid()
                .map_or((String::new(), String::new()), |(x, y)| {
                    (x.to_string(), y.to_string())
                });
            for record in result.records() {
                let mut row = vec![
                    record.forecast_hour.to_string(),
                    format_timestamp(&record.valid_time),
                    String::new(),
                    x.clone(),
                    y.clone(),
                ];
                for variable in Variable::ALL {
                    match record.value(variable) {
                        Some(SampledValue::Polygon(stats)) => {
                            row.extend([stats.min, stats.mean, stats.max].map(cell));
                        }
                        _ => row.extend([None, None, None].map(cell)),
                    }
                }
                writer.write_record(&row)?;
            }
        }
        kind => {
            let points = kind.sample_points();
            for record in result.records() {
                for (vertex, (x, y)) in points.iter().enumerate() {
                    let mut row = vec![
                        record.forecast_hour.to_string(),
                        format_timestamp(&record.valid_time),
                        vertex.to_string(),
                        x.to_string(),
                        y.to_string(),
                    ];
                    for variable in Variable::ALL {
                        let value = match record.value(variable) {
                            Some(SampledValue::Point(v)) => *v,
                            Some(SampledValue::Line(values)) => {
                                values.get(vertex).copied().flatten()
                            }
                            _ => None,
                        };
                        row.push(cell(value));
                    }
                    writer.write_record(&row)?;
                }
            }
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DrillError::Encode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DrillError::Encode(e.to_string()))
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
