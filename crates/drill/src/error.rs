//! Error types for the drill process.

use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrillError {
    /// No forecast hour could be resolved to a complete set of rasters.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A located raster could not be opened or parsed.
    #[error("Raster read error for {path}: {message}")]
    RasterRead { path: String, message: String },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Index query failed: {0}")]
    Index(#[from] StorageError),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DrillError {
    /// Process exit status for command-line front ends.
    pub fn exit_code(&self) -> i32 {
        match self {
            DrillError::InvalidGeometry(_) | DrillError::InvalidParameter(_) => 2,
            DrillError::NotFound(_) => 3,
            DrillError::RasterRead { .. } => 4,
            _ => 1,
        }
    }
}

impl From<csv::Error> for DrillError {
    fn from(err: csv::Error) -> Self {
        DrillError::Encode(err.to_string())
    }
}

impl From<serde_json::Error> for DrillError {
    fn from(err: serde_json::Error) -> Self {
        DrillError::Encode(err.to_string())
    }
}

pub type DrillResult<T> = Result<T, DrillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(DrillError::InvalidGeometry("x".into()).exit_code(), 2);
        assert_eq!(DrillError::InvalidParameter("x".into()).exit_code(), 2);
        assert_eq!(DrillError::NotFound("x".into()).exit_code(), 3);
        assert_eq!(
            DrillError::RasterRead {
                path: "a".into(),
                message: "b".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(DrillError::Encode("x".into()).exit_code(), 1);
    }
}
