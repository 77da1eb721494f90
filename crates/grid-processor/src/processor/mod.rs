//! Raster source trait and implementations.

mod zarr;

pub use zarr::ZarrRaster;

use crate::error::Result;
use crate::types::{RasterMetadata, RasterWindow};
use drill_common::BoundingBox;

/// Read access to one georeferenced raster band.
///
/// Implementations are read-only, so a source can be used from any thread,
/// but each worker is expected to open its own handle.
pub trait RasterSource: Send + Sync {
    /// Georeferencing and descriptive metadata.
    fn metadata(&self) -> &RasterMetadata;

    /// Read the block of pixels intersecting `bbox` (in the raster's CRS).
    ///
    /// The window is clamped to the grid; a box that misses the grid yields
    /// an empty window rather than an error.
    fn read_window(&self, bbox: &BoundingBox) -> Result<RasterWindow>;

    /// Read one pixel.
    ///
    /// # Returns
    /// * `Some(value)` if the pixel is inside the grid and holds valid data
    /// * `None` if the pixel is outside the grid, nodata, NaN or infinite
    fn read_pixel(&self, row: usize, col: usize) -> Result<Option<f64>>;

    /// Read the pixel covering a CRS coordinate, using floor indexing.
    fn read_point(&self, x: f64, y: f64) -> Result<Option<f64>> {
        match self.metadata().pixel_of(x, y) {
            Some((row, col)) => self.read_pixel(row, col),
            None => Ok(None),
        }
    }
}
