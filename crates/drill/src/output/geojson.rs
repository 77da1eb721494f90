//! GeoJSON `Feature` encoding.

use drill_common::{format_timestamp, Variable};
use serde_json::{json, Map, Value};

use crate::assembler::{ExtractionRecord, ExtractionResult};
use crate::sampler::SampledValue;

/// Build the result document: the echoed geometry plus per-hour forecasts.
pub fn to_geojson(result: &ExtractionResult) -> Value {
    let forecasts: Vec<Value> = result.records().iter().map(record_json).collect();

    json!({
        "type": "Feature",
        "geometry": result.geometry().to_geojson(),
        "properties": {
            "model": result.model(),
            "model_run": format_timestamp(&result.model_run()),
            "query_type": result.query_type().as_str(),
            "metadata": metadata(),
            "forecasts": forecasts,
            "out_of_bounds": result.out_of_bounds(),
            "notes": result.notes(),
        }
    })
}

fn metadata() -> Value {
    json!({
        "Temporal Resolution": "1",
        "Temporal Units": "hour",
        "Temperature Units": Variable::Temperature.units(),
        "Wind Speed Units": Variable::WindSpeed.units(),
        "Wind Direction Units": Variable::WindDirection.units(),
    })
}

fn record_json(record: &ExtractionRecord) -> Value {
    let mut obj = Map::new();
    obj.insert("forecast_hour".to_string(), json!(record.forecast_hour));
    obj.insert(
        "valid_time".to_string(),
        json!(format_timestamp(&record.valid_time)),
    );
    for variable in Variable::ALL {
        let value = record.value(variable).map_or(Value::Null, value_json);
        obj.insert(variable.key().to_string(), value);
    }
    Value::Object(obj)
}

fn value_json(value: &SampledValue) -> Value {
    match value {
        SampledValue::Point(v) => json!(v),
        SampledValue::Line(values) => json!(values),
        SampledValue::Polygon(stats) => json!(stats),
    }
}
