//! Raster Access Layer with Zarr V3 Support
//!
//! This crate opens georeferenced rasters stored as Zarr V3 arrays and reads
//! only the pixels a query needs:
//!
//! - **Windowed reads**: a bounding box in the raster's CRS becomes a pixel
//!   subset, so only the intersecting chunks are decoded
//! - **Request-scoped handles**: [`RasterHandles`] keeps rasters open for the
//!   lifetime of one worker and releases them when dropped
//! - **Writing**: [`ZarrWriter`] produces rasters in the same layout
//!
//! # Architecture
//!
//! ```text
//! Sampler
//!      │
//!      ▼
//! RasterHandles::open(path, variable)
//!      │
//!      ├─► Cached handle: reuse
//!      │
//!      └─► Miss: ZarrRaster::open_path (reads zarr.json attributes)
//!               │
//!               ▼
//! RasterSource::read_window(bbox)
//!      │
//!      ├─► Inverse geotransform on the bbox corners
//!      │
//!      ├─► Clamp to the grid
//!      │
//!      └─► Retrieve the array subset, widen to f64
//!               │
//!               ▼
//!          RasterWindow (data + local geotransform)
//! ```

pub mod config;
pub mod error;
pub mod handles;
pub mod processor;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use config::{Compression, WriterConfig};
pub use error::{GridProcessorError, Result};
pub use handles::RasterHandles;
pub use processor::{RasterSource, ZarrRaster};
pub use types::{RasterData, RasterMetadata, RasterWindow};
pub use writer::{RasterSpec, ZarrWriteResult, ZarrWriter};
