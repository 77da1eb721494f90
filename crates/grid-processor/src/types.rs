//! Core types for raster access.

use chrono::{DateTime, Utc};
use drill_common::{AffineTransform, BoundingBox, Crs};

/// Georeferencing and descriptive metadata of one raster.
#[derive(Debug, Clone)]
pub struct RasterMetadata {
    pub crs: Crs,
    pub transform: AffineTransform,
    /// Sentinel for missing data, already rounded to the on-disk element type.
    pub nodata: Option<f64>,
    /// Grid height in pixels.
    pub rows: usize,
    /// Grid width in pixels.
    pub cols: usize,
    /// Number of bands; 1 for a two-dimensional array.
    pub bands: usize,
    /// On-disk element type, e.g. `float32`.
    pub data_type: String,
    /// Parameter code from the `variable` attribute.
    pub variable: Option<String>,
    pub model: Option<String>,
    pub reference_time: Option<DateTime<Utc>>,
    pub forecast_hour: Option<u32>,
    pub units: Option<String>,
}

impl RasterMetadata {
    /// A pixel value counts only if it is finite and not the nodata sentinel.
    pub fn is_valid(&self, value: f64) -> bool {
        value.is_finite() && self.nodata.map_or(true, |nd| value != nd)
    }

    /// Extent of the grid in its own CRS.
    pub fn bounds(&self) -> BoundingBox {
        let (x0, y0) = self.transform.apply(0.0, 0.0);
        let mut bbox = BoundingBox::new(x0, y0, x0, y0);
        for (x, y) in [
            self.transform.apply(self.cols as f64, 0.0),
            self.transform.apply(0.0, self.rows as f64),
            self.transform.apply(self.cols as f64, self.rows as f64),
        ] {
            bbox.include(x, y);
        }
        bbox
    }

    /// Pixel `(row, col)` covering a CRS coordinate, `None` outside the grid.
    pub fn pixel_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.transform.pixel_index(x, y)?;
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.rows {
            return None;
        }
        Some((row as usize, col as usize))
    }
}

/// A block of pixels read from a raster, widened to f64.
#[derive(Debug, Clone)]
pub struct RasterWindow {
    /// Values in row-major order, top-to-bottom.
    pub data: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
    /// Offset of the window's top-left pixel in the full grid.
    pub row_off: usize,
    pub col_off: usize,
    /// Geotransform whose origin is the window's top-left corner.
    pub transform: AffineTransform,
}

impl RasterWindow {
    pub fn empty(transform: AffineTransform) -> Self {
        Self {
            data: Vec::new(),
            rows: 0,
            cols: 0,
            row_off: 0,
            col_off: 0,
            transform,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Get the value at a window-local coordinate.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    /// CRS coordinates of the centre of a window-local pixel.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_center(col, row)
    }
}

/// Typed pixel data handed to the writer.
#[derive(Debug, Clone)]
pub enum RasterData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
}

impl RasterData {
    pub fn len(&self) -> usize {
        match self {
            RasterData::Float32(v) => v.len(),
            RasterData::Float64(v) => v.len(),
            RasterData::Int16(v) => v.len(),
            RasterData::Int32(v) => v.len(),
            RasterData::UInt8(v) => v.len(),
            RasterData::UInt16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        match self {
            RasterData::UInt8(_) => 1,
            RasterData::Int16(_) | RasterData::UInt16(_) => 2,
            RasterData::Float32(_) | RasterData::Int32(_) => 4,
            RasterData::Float64(_) => 8,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RasterData::Float32(_) => "float32",
            RasterData::Float64(_) => "float64",
            RasterData::Int16(_) => "int16",
            RasterData::Int32(_) => "int32",
            RasterData::UInt8(_) => "uint8",
            RasterData::UInt16(_) => "uint16",
        }
    }
}

impl From<Vec<f32>> for RasterData {
    fn from(v: Vec<f32>) -> Self {
        RasterData::Float32(v)
    }
}

impl From<Vec<f64>> for RasterData {
    fn from(v: Vec<f64>) -> Self {
        RasterData::Float64(v)
    }
}
