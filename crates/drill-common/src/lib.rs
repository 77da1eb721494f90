//! Common types and utilities shared across the raster drill crates.

pub mod affine;
pub mod bbox;
pub mod crs;
pub mod time;
pub mod variable;

pub use affine::AffineTransform;
pub use bbox::BoundingBox;
pub use crs::{Crs, CrsParseError, LambertParams, StereographicParams, DEFAULT_EARTH_RADIUS};
pub use time::{format_timestamp, parse_model_run, TimeParseError, ValidTime, TIMESTAMP_FORMAT};
pub use variable::{Variable, VariableParseError};
