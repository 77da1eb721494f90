//! Output encoders for extraction results.

mod csv;
mod geojson;

use serde::{Deserialize, Serialize};

use crate::assembler::ExtractionResult;
use crate::error::{DrillError, DrillResult};

pub use self::csv::to_csv;
pub use self::geojson::to_geojson;

/// Supported result representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// application/geo+json - Feature document
    #[default]
    GeoJson,
    /// text/csv - one row per forecast hour and sample position
    Csv,
}

impl OutputFormat {
    /// Parse a `format` request parameter (short name or MIME type).
    pub fn from_param(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "geojson" | "json" | "application/geo+json" | "application/json" => {
                Some(OutputFormat::GeoJson)
            }
            "csv" | "text/csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "application/geo+json",
            OutputFormat::Csv => "text/csv",
        }
    }

    pub fn encode(&self, result: &ExtractionResult) -> DrillResult<EncodedOutput> {
        let body = match self {
            OutputFormat::GeoJson => serde_json::to_string_pretty(&to_geojson(result))?,
            OutputFormat::Csv => to_csv(result)?,
        };
        Ok(EncodedOutput {
            content_type: self.content_type(),
            body,
        })
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = DrillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_param(s)
            .ok_or_else(|| DrillError::InvalidParameter(format!("unsupported format '{}'", s)))
    }
}

/// An encoded result body with its MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedOutput {
    pub content_type: &'static str,
    pub body: String,
}
