//! Raster access errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// The path is missing or is not a Zarr array.
    #[error("cannot open raster: {0}")]
    Open(String),

    /// Chunk retrieval or decoding failed.
    #[error("cannot read raster data: {0}")]
    Read(String),

    /// Shape, type or georeferencing attributes are unusable.
    #[error("invalid raster metadata: {0}")]
    Metadata(String),

    #[error("raster holds variable '{found}', expected '{expected}'")]
    VariableMismatch { expected: String, found: String },

    #[error("cannot write raster: {0}")]
    Write(String),

    #[error("invalid writer configuration: {0}")]
    Config(String),
}

impl GridProcessorError {
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::Open(msg.into())
    }

    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<std::io::Error> for GridProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::Write(err.to_string())
    }
}

impl From<serde_json::Error> for GridProcessorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Metadata(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GridProcessorError>;
