//! Request-scoped cache of open raster handles.

use std::collections::HashMap;
use std::path::Path;

use zarrs_filesystem::FilesystemStore;

use crate::error::Result;
use crate::processor::ZarrRaster;

/// Open rasters keyed by file path, owned by a single worker.
///
/// Each raster is opened on first use and kept until the cache is dropped,
/// which releases every handle on all exit paths.
#[derive(Default)]
pub struct RasterHandles {
    handles: HashMap<String, ZarrRaster<FilesystemStore>>,
    opened: usize,
}

impl RasterHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the raster at `path`, opening it if needed.
    ///
    /// When `expected_variable` is given, the raster's `variable` attribute
    /// (if any) must match it.
    pub fn open(
        &mut self,
        path: &str,
        expected_variable: Option<&str>,
    ) -> Result<&ZarrRaster<FilesystemStore>> {
        if !self.handles.contains_key(path) {
            let raster = ZarrRaster::<FilesystemStore>::open_path(Path::new(path))?;
            self.handles.insert(path.to_string(), raster);
            self.opened += 1;
        }

        let raster = &self.handles[path];
        if let Some(code) = expected_variable {
            raster.check_variable(code)?;
        }
        Ok(raster)
    }

    /// Number of rasters currently held open.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Total rasters opened by this cache over its lifetime.
    pub fn opened(&self) -> usize {
        self.opened
    }
}

impl Drop for RasterHandles {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            tracing::debug!(handles = self.handles.len(), "Releasing raster handles");
        }
    }
}
