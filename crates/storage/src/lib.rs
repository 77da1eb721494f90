//! Raster metadata index for the drill services.
//!
//! Provides unified interfaces for:
//! - PostgreSQL for the raster catalog
//! - In-memory entries for tests and fixtures
//! - JSON manifests for offline use

pub mod catalog;
pub mod error;
pub mod index;
pub mod manifest;

pub use catalog::Catalog;
pub use error::{StorageError, StorageResult};
pub use index::{IndexEntry, IndexQuery, MemoryIndex, RasterIndex};
pub use manifest::ManifestIndex;
