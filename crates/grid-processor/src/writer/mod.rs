//! Writers for persisting rasters.

mod zarr_writer;

pub use zarr_writer::{RasterSpec, ZarrWriteResult, ZarrWriter};
