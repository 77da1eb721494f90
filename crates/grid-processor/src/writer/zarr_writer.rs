//! Zarr V3 writer for georeferenced rasters.
//!
//! This module is used by ingestion tooling and test fixtures to write
//! rasters in the layout [`ZarrRaster`](crate::ZarrRaster) reads, with
//! optional Blosc compression.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use drill_common::{format_timestamp, AffineTransform, Crs};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::{ReadableStorageTraits, WritableStorageTraits};
use zarrs_filesystem::FilesystemStore;

use crate::config::{WriterConfig, Compression};
use crate::error::{GridProcessorError, Result};
use crate::types::RasterData;

/// Georeferencing and attributes of a raster to be written.
#[derive(Debug, Clone)]
pub struct RasterSpec {
    pub rows: usize,
    pub cols: usize,
    /// `Some(n)` writes a `[n, rows, cols]` array, `None` a `[rows, cols]` one.
    pub bands: Option<usize>,
    pub crs: Crs,
    pub transform: AffineTransform,
    pub nodata: Option<f64>,
    pub variable: Option<String>,
    pub model: Option<String>,
    pub reference_time: Option<DateTime<Utc>>,
    pub forecast_hour: Option<u32>,
    pub units: Option<String>,
}

impl RasterSpec {
    /// A single-band raster with no descriptive attributes.
    pub fn new(rows: usize, cols: usize, crs: Crs, transform: AffineTransform) -> Self {
        Self {
            rows,
            cols,
            bands: None,
            crs,
            transform,
            nodata: None,
            variable: None,
            model: None,
            reference_time: None,
            forecast_hour: None,
            units: None,
        }
    }

    fn element_count(&self) -> usize {
        self.bands.unwrap_or(1) * self.rows * self.cols
    }

    fn shape(&self) -> Vec<u64> {
        match self.bands {
            Some(b) => vec![b as u64, self.rows as u64, self.cols as u64],
            None => vec![self.rows as u64, self.cols as u64],
        }
    }

    fn attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut attrs = serde_json::Map::new();
        attrs.insert("crs".to_string(), serde_json::json!(self.crs.to_string()));
        attrs.insert(
            "geotransform".to_string(),
            serde_json::json!(self.transform.to_gdal()),
        );
        if let Some(nodata) = self.nodata {
            attrs.insert("nodata".to_string(), serde_json::json!(nodata));
        }
        if let Some(variable) = &self.variable {
            attrs.insert("variable".to_string(), serde_json::json!(variable));
        }
        if let Some(model) = &self.model {
            attrs.insert("model".to_string(), serde_json::json!(model));
        }
        if let Some(reference_time) = &self.reference_time {
            attrs.insert(
                "reference_time".to_string(),
                serde_json::json!(format_timestamp(reference_time)),
            );
        }
        if let Some(hour) = self.forecast_hour {
            attrs.insert("forecast_hour".to_string(), serde_json::json!(hour));
        }
        if let Some(units) = &self.units {
            attrs.insert("units".to_string(), serde_json::json!(units));
        }
        attrs
    }
}

/// Result of writing a Zarr array.
#[derive(Debug)]
pub struct ZarrWriteResult {
    pub shape: Vec<u64>,
    pub dtype: String,
    /// Compression codec used.
    pub compression: String,
    /// Total bytes written (uncompressed).
    pub bytes_written: u64,
}

/// Writer for creating Zarr V3 rasters.
pub struct ZarrWriter {
    config: WriterConfig,
}

impl ZarrWriter {
    /// Create a new ZarrWriter with the given configuration.
    pub fn new(config: WriterConfig) -> Self {
        Self { config }
    }

    /// Write a raster to a new directory on the local filesystem.
    pub fn write_to_dir(
        &self,
        dir: &Path,
        spec: &RasterSpec,
        data: &RasterData,
    ) -> Result<ZarrWriteResult> {
        std::fs::create_dir_all(dir)?;
        let store = FilesystemStore::new(dir)
            .map_err(|e| GridProcessorError::write(format!("{}: {}", dir.display(), e)))?;
        self.write(store, "/", spec, data)
    }

    /// Write raster data to a Zarr array.
    ///
    /// # Arguments
    /// * `storage` - The storage backend to write to (must be readable AND writable)
    /// * `path` - Path for the Zarr array (e.g., "/")
    /// * `spec` - Shape, georeferencing and attributes
    /// * `data` - Pixel values in row-major order (band, top-to-bottom, left-to-right)
    pub fn write<S: ReadableStorageTraits + WritableStorageTraits + 'static>(
        &self,
        storage: S,
        path: &str,
        spec: &RasterSpec,
        data: &RasterData,
    ) -> Result<ZarrWriteResult> {
        self.config.validate()?;
        if spec.rows == 0 || spec.cols == 0 || spec.bands == Some(0) {
            return Err(GridProcessorError::write("raster dimensions must be > 0"));
        }
        if data.len() != spec.element_count() {
            return Err(GridProcessorError::write(format!(
                "expected {} values, got {}",
                spec.element_count(),
                data.len()
            )));
        }

        let array = self.build_array(Arc::new(storage), path, spec, data)?;

        // Store metadata
        array
            .store_metadata()
            .map_err(|e| GridProcessorError::write(e.to_string()))?;

        // Write data
        let shape = spec.shape();
        let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape.clone())
            .map_err(|e| GridProcessorError::write(e.to_string()))?;

        let stored = match data {
            RasterData::Float32(v) => array.store_array_subset_elements(&subset, v.as_slice()),
            RasterData::Float64(v) => array.store_array_subset_elements(&subset, v.as_slice()),
            RasterData::Int16(v) => array.store_array_subset_elements(&subset, v.as_slice()),
            RasterData::Int32(v) => array.store_array_subset_elements(&subset, v.as_slice()),
            RasterData::UInt8(v) => array.store_array_subset_elements(&subset, v.as_slice()),
            RasterData::UInt16(v) => array.store_array_subset_elements(&subset, v.as_slice()),
        };
        stored.map_err(|e| GridProcessorError::write(e.to_string()))?;

        tracing::debug!(
            path = %path,
            shape = ?shape,
            dtype = data.type_name(),
            "Wrote raster"
        );

        Ok(ZarrWriteResult {
            shape,
            dtype: data.type_name().to_string(),
            compression: self.config.compression.as_str().to_string(),
            bytes_written: (data.len() * data.element_size()) as u64,
        })
    }

    /// Build a Zarr array with the configured settings.
    fn build_array<S: ReadableStorageTraits + WritableStorageTraits + 'static>(
        &self,
        storage: Arc<S>,
        path: &str,
        spec: &RasterSpec,
        data: &RasterData,
    ) -> Result<Array<S>> {
        let chunk_size = self.config.chunk_size.max(1);
        let rows_chunk = chunk_size.min(spec.rows) as u64;
        let cols_chunk = chunk_size.min(spec.cols) as u64;
        let chunk_shape = match spec.bands {
            Some(_) => vec![1, rows_chunk, cols_chunk],
            None => vec![rows_chunk, cols_chunk],
        };

        // Create chunk grid
        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| GridProcessorError::config(format!("{:?}", e)))?;

        let (data_type, fill_value) = data_type_and_fill(data, spec.nodata);

        // Create array builder
        let mut binding = ArrayBuilder::new(spec.shape(), data_type, chunk_grid, fill_value);
        let mut builder = binding.attributes(spec.attributes());

        // Add compression if configured
        if self.config.compression != Compression::None {
            let codec = self.create_compression_codec(data.element_size())?;
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        // Build the array
        builder
            .build(storage, path)
            .map_err(|e| GridProcessorError::write(e.to_string()))
    }

    /// Create the compression codec based on configuration.
    fn create_compression_codec(
        &self,
        element_size: usize,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.config.compression_level)
            .map_err(|_| GridProcessorError::config("invalid compression level"))?;

        let shuffle = if self.config.shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };

        // typesize is required when shuffle is enabled
        let typesize = if self.config.shuffle {
            Some(element_size)
        } else {
            None
        };

        let compressor = match self.config.compression {
            Compression::None => {
                return Err(GridProcessorError::config("no compression configured"))
            }
            Compression::BloscLz4 => BloscCompressor::LZ4,
            Compression::BloscZstd => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| GridProcessorError::config(e.to_string()))?;

        Ok(Arc::new(codec))
    }
}

/// Zarr data type and fill value for the data, using nodata as the fill.
fn data_type_and_fill(data: &RasterData, nodata: Option<f64>) -> (DataType, FillValue) {
    match data {
        RasterData::Float32(_) => (
            DataType::Float32,
            FillValue::from(nodata.map_or(f32::NAN, |v| v as f32)),
        ),
        RasterData::Float64(_) => (DataType::Float64, FillValue::from(nodata.unwrap_or(f64::NAN))),
        RasterData::Int16(_) => (DataType::Int16, FillValue::from(nodata.map_or(0, |v| v as i16))),
        RasterData::Int32(_) => (DataType::Int32, FillValue::from(nodata.map_or(0, |v| v as i32))),
        RasterData::UInt8(_) => (DataType::UInt8, FillValue::from(nodata.map_or(0, |v| v as u8))),
        RasterData::UInt16(_) => (
            DataType::UInt16,
            FillValue::from(nodata.map_or(0, |v| v as u16)),
        ),
    }
}
