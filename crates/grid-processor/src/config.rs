//! Raster writer settings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};

/// Chunking and compression used when writing rasters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Edge length of the square chunks; clamped to the grid size.
    pub chunk_size: usize,

    pub compression: Compression,

    /// Blosc compression level, 1-9.
    pub compression_level: u8,

    /// Byte shuffle before compressing.
    pub shuffle: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            compression: Compression::BloscZstd,
            compression_level: 3,
            shuffle: true,
        }
    }
}

impl WriterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(GridProcessorError::config("chunk_size must be > 0"));
        }
        if self.compression != Compression::None && !(1..=9).contains(&self.compression_level) {
            return Err(GridProcessorError::config(format!(
                "compression_level {} is outside 1-9",
                self.compression_level
            )));
        }
        Ok(())
    }
}

/// Bytes-to-bytes codec applied to every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    None,
    BloscLz4,
    #[default]
    BloscZstd,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl FromStr for Compression {
    type Err = GridProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "raw" => Ok(Self::None),
            "lz4" | "blosc_lz4" => Ok(Self::BloscLz4),
            "zstd" | "blosc_zstd" => Ok(Self::BloscZstd),
            other => Err(GridProcessorError::config(format!(
                "unknown compression '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
