//! Raster time-series extraction ("drill").
//!
//! Given a model, a model run, a set of forecast hours and a point, line or
//! polygon, the drill process locates the temperature, wind speed and wind
//! direction rasters for every hour, reprojects the geometry into each
//! raster's CRS, samples or summarises the pixels and assembles one
//! time-ordered result.
//!
//! ```text
//! DrillRequest
//!      │
//!      ▼
//! CatalogLookup::resolve ──► one batched RasterIndex query
//!      │
//!      ▼                      (rayon, one task per forecast hour)
//! RasterHandles::open ──► GeometryNormalizer::reproject (cached per CRS)
//!      │
//!      ▼
//! sampler::sample ──► point value / line vertices / zonal statistics
//!      │
//!      ▼
//! ResultBuilder ──► ExtractionResult ──► OutputFormat::encode
//! ```

pub mod assembler;
pub mod config;
pub mod error;
pub mod geometry;
pub mod lookup;
pub mod normalize;
pub mod output;
pub mod polygon;
pub mod process;
pub mod query;
pub mod sampler;

pub use assembler::{BoundaryFlag, ExtractionRecord, ExtractionResult, Note, ResultBuilder};
pub use config::{DrillConfig, ModelDefinition, ParameterCodes};
pub use error::{DrillError, DrillResult};
pub use geometry::{GeometryKind, QueryGeometry, QueryType};
pub use lookup::{CatalogLookup, HourPlan, RasterFileRecord, ResolvedPlan};
pub use normalize::{GeometryNormalizer, ReprojectedGeometry};
pub use output::{EncodedOutput, OutputFormat};
pub use polygon::{PolygonRings, ZonalStats};
pub use process::{DrillProcess, DrillRequest, ForecastHoursInput};
pub use query::RasterQuery;
pub use sampler::{SampleOutcome, SampledValue};
