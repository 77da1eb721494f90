//! Zarr V3 raster implementation.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use drill_common::{AffineTransform, BoundingBox, Crs};
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::ReadableStorageTraits;
use zarrs_filesystem::FilesystemStore;

use crate::error::{GridProcessorError, Result};
use crate::types::{RasterMetadata, RasterWindow};

use super::RasterSource;

/// A raster backed by a Zarr V3 array of shape `[rows, cols]` or
/// `[bands, rows, cols]`. Only band 0 is read.
pub struct ZarrRaster<S: ReadableStorageTraits + ?Sized> {
    /// The Zarr array.
    array: Array<S>,
    /// Location used in log and error messages.
    path: String,
    /// Metadata extracted from Zarr attributes.
    metadata: RasterMetadata,
}

impl ZarrRaster<FilesystemStore> {
    /// Open a raster stored as a Zarr directory on the local filesystem.
    pub fn open_path(path: &Path) -> Result<Self> {
        if !path.join("zarr.json").is_file() {
            return Err(GridProcessorError::open_failed(format!(
                "{}: not a Zarr V3 array",
                path.display()
            )));
        }
        let store = FilesystemStore::new(path)
            .map_err(|e| GridProcessorError::open_failed(format!("{}: {}", path.display(), e)))?;
        Self::open(store, "/", &path.display().to_string())
    }
}

impl<S: ReadableStorageTraits + ?Sized + 'static> ZarrRaster<S> {
    /// Open a Zarr array from storage.
    ///
    /// # Arguments
    /// * `storage` - The storage backend
    /// * `array_path` - Path to the array inside the store (usually "/")
    /// * `label` - Human-readable location for messages
    pub fn open(storage: impl Into<Arc<S>>, array_path: &str, label: &str) -> Result<Self> {
        let array = Array::open(storage.into(), array_path)
            .map_err(|e| GridProcessorError::open_failed(format!("{}: {}", label, e)))?;

        let metadata = Self::extract_metadata(&array)
            .map_err(|e| GridProcessorError::invalid_metadata(format!("{}: {}", label, e)))?;

        tracing::debug!(
            path = %label,
            rows = metadata.rows,
            cols = metadata.cols,
            crs = %metadata.crs,
            dtype = %metadata.data_type,
            "Opened raster"
        );

        Ok(Self {
            array,
            path: label.to_string(),
            metadata,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fail if the raster declares a parameter code other than `expected`.
    pub fn check_variable(&self, expected: &str) -> Result<()> {
        match &self.metadata.variable {
            Some(found) if !found.eq_ignore_ascii_case(expected) => {
                Err(GridProcessorError::VariableMismatch {
                    expected: expected.to_string(),
                    found: found.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Extract metadata from Zarr array attributes.
    fn extract_metadata(array: &Array<S>) -> std::result::Result<RasterMetadata, String> {
        let attrs = array.attributes();
        let shape = array.shape();

        let (bands, rows, cols) = match shape {
            [rows, cols] => (1, *rows as usize, *cols as usize),
            [bands, rows, cols] => (*bands as usize, *rows as usize, *cols as usize),
            _ => {
                return Err(format!(
                    "array must have 2 or 3 dimensions, found {}",
                    shape.len()
                ))
            }
        };
        if bands == 0 || rows == 0 || cols == 0 {
            return Err(format!("array has an empty dimension: {:?}", shape));
        }

        let data_type = array.data_type();
        let type_name = type_name(data_type)
            .ok_or_else(|| format!("unsupported element type {:?}", data_type))?;

        // Parse required attributes
        let crs = match attrs.get("crs").and_then(|v| v.as_str()) {
            Some(s) => Crs::parse(s).map_err(|e| e.to_string())?,
            None => return Err("missing 'crs' attribute".to_string()),
        };

        let geotransform: Vec<f64> = attrs
            .get("geotransform")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_f64()).collect())
            .ok_or_else(|| "missing 'geotransform' attribute".to_string())?;
        let gt: [f64; 6] = geotransform
            .try_into()
            .map_err(|_| "'geotransform' must hold six numbers".to_string())?;
        let transform = AffineTransform::from_gdal(gt);
        if !transform.is_invertible() {
            return Err(format!("geotransform {:?} is not invertible", gt));
        }

        // Explicit nodata wins over the fill value
        let nodata = match attrs.get("nodata") {
            Some(v) if v.is_null() => None,
            Some(v) => Some(
                v.as_f64()
                    .ok_or_else(|| format!("'nodata' must be a number, found {}", v))?,
            ),
            None => fill_value_f64(data_type, array.fill_value().as_ne_bytes()),
        }
        .map(|nd| round_to_type(data_type, nd))
        .filter(|nd| !nd.is_nan());

        let string_attr = |key: &str| attrs.get(key).and_then(|v| v.as_str()).map(String::from);

        let reference_time = attrs
            .get("reference_time")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(RasterMetadata {
            crs,
            transform,
            nodata,
            rows,
            cols,
            bands,
            data_type: type_name.to_string(),
            variable: string_attr("variable"),
            model: string_attr("model"),
            reference_time,
            forecast_hour: attrs
                .get("forecast_hour")
                .and_then(|v| v.as_u64())
                .map(|h| h as u32),
            units: string_attr("units"),
        })
    }

    /// Subset of band 0 covering `rows x cols` pixels at an offset.
    fn band_subset(
        &self,
        row_off: usize,
        col_off: usize,
        rows: usize,
        cols: usize,
    ) -> Result<ArraySubset> {
        let (start, shape) = if self.array.shape().len() == 3 {
            (
                vec![0, row_off as u64, col_off as u64],
                vec![1, rows as u64, cols as u64],
            )
        } else {
            (
                vec![row_off as u64, col_off as u64],
                vec![rows as u64, cols as u64],
            )
        };
        ArraySubset::new_with_start_shape(start, shape)
            .map_err(|e| GridProcessorError::read_failed(e.to_string()))
    }

    /// Retrieve a subset and widen it to f64.
    fn retrieve_f64(&self, subset: &ArraySubset) -> Result<Vec<f64>> {
        let err = |e: zarrs::array::ArrayError| {
            GridProcessorError::read_failed(format!("{}: {}", self.path, e))
        };

        macro_rules! read {
            ($t:ty) => {
                self.array
                    .retrieve_array_subset_elements::<$t>(subset)
                    .map_err(err)?
            };
        }

        let values = match self.array.data_type() {
            DataType::Float32 => widen(read!(f32)),
            DataType::Float64 => read!(f64),
            DataType::Int8 => widen(read!(i8)),
            DataType::Int16 => widen(read!(i16)),
            DataType::Int32 => widen(read!(i32)),
            DataType::UInt8 => widen(read!(u8)),
            DataType::UInt16 => widen(read!(u16)),
            DataType::UInt32 => widen(read!(u32)),
            other => {
                return Err(GridProcessorError::read_failed(format!(
                    "{}: unsupported element type {:?}",
                    self.path, other
                )))
            }
        };
        Ok(values)
    }
}

impl<S: ReadableStorageTraits + Send + Sync + ?Sized + 'static> RasterSource for ZarrRaster<S> {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    fn read_window(&self, bbox: &BoundingBox) -> Result<RasterWindow> {
        let meta = &self.metadata;

        // Corners of the box in fractional pixel space
        let mut min_col = f64::INFINITY;
        let mut max_col = f64::NEG_INFINITY;
        let mut min_row = f64::INFINITY;
        let mut max_row = f64::NEG_INFINITY;
        for (x, y) in bbox.corners() {
            let (col, row) = meta.transform.to_pixel(x, y).ok_or_else(|| {
                GridProcessorError::invalid_metadata(format!(
                    "{}: geotransform is singular",
                    self.path
                ))
            })?;
            min_col = min_col.min(col);
            max_col = max_col.max(col);
            min_row = min_row.min(row);
            max_row = max_row.max(row);
        }

        if ![min_col, max_col, min_row, max_row].iter().all(|v| v.is_finite()) {
            return Ok(RasterWindow::empty(meta.transform));
        }

        let col0 = min_col.floor().clamp(0.0, meta.cols as f64) as usize;
        let col1 = max_col.ceil().clamp(0.0, meta.cols as f64) as usize;
        let row0 = min_row.floor().clamp(0.0, meta.rows as f64) as usize;
        let row1 = max_row.ceil().clamp(0.0, meta.rows as f64) as usize;

        if col0 >= col1 || row0 >= row1 {
            tracing::debug!(path = %self.path, bbox = ?bbox, "Window misses the grid");
            return Ok(RasterWindow::empty(meta.transform));
        }

        let (rows, cols) = (row1 - row0, col1 - col0);
        let subset = self.band_subset(row0, col0, rows, cols)?;
        let data = self.retrieve_f64(&subset)?;

        tracing::debug!(
            path = %self.path,
            row_off = row0,
            col_off = col0,
            rows,
            cols,
            "Read raster window"
        );

        Ok(RasterWindow {
            data,
            rows,
            cols,
            row_off: row0,
            col_off: col0,
            transform: meta.transform.offset(col0, row0),
        })
    }

    fn read_pixel(&self, row: usize, col: usize) -> Result<Option<f64>> {
        if row >= self.metadata.rows || col >= self.metadata.cols {
            return Ok(None);
        }
        let subset = self.band_subset(row, col, 1, 1)?;
        let value = self.retrieve_f64(&subset)?.first().copied();
        Ok(value.filter(|v| self.metadata.is_valid(*v)))
    }
}

fn widen<T: Into<f64>>(values: Vec<T>) -> Vec<f64> {
    values.into_iter().map(Into::into).collect()
}

fn type_name(data_type: &DataType) -> Option<&'static str> {
    Some(match data_type {
        DataType::Float32 => "float32",
        DataType::Float64 => "float64",
        DataType::Int8 => "int8",
        DataType::Int16 => "int16",
        DataType::Int32 => "int32",
        DataType::UInt8 => "uint8",
        DataType::UInt16 => "uint16",
        DataType::UInt32 => "uint32",
        _ => return None,
    })
}

/// Decode the array fill value as f64.
fn fill_value_f64(data_type: &DataType, bytes: &[u8]) -> Option<f64> {
    match data_type {
        DataType::Float32 => bytes.try_into().ok().map(f32::from_ne_bytes).map(f64::from),
        DataType::Float64 => bytes.try_into().ok().map(f64::from_ne_bytes),
        DataType::Int8 => bytes.try_into().ok().map(i8::from_ne_bytes).map(f64::from),
        DataType::Int16 => bytes.try_into().ok().map(i16::from_ne_bytes).map(f64::from),
        DataType::Int32 => bytes.try_into().ok().map(i32::from_ne_bytes).map(f64::from),
        DataType::UInt8 => bytes.try_into().ok().map(u8::from_ne_bytes).map(f64::from),
        DataType::UInt16 => bytes.try_into().ok().map(u16::from_ne_bytes).map(f64::from),
        DataType::UInt32 => bytes.try_into().ok().map(u32::from_ne_bytes).map(f64::from),
        _ => None,
    }
}

/// Round a nodata value to what the element type can store, so it compares
/// equal to widened pixel values.
fn round_to_type(data_type: &DataType, value: f64) -> f64 {
    match data_type {
        DataType::Float32 => value as f32 as f64,
        _ => value,
    }
}
