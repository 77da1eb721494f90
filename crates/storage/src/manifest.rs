//! JSON manifest index.
//!
//! A manifest is a JSON array of [`IndexEntry`] objects. Relative storage paths
//! are resolved against the directory holding the manifest, so a manifest can
//! be shipped next to the rasters it describes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::{IndexEntry, IndexQuery, MemoryIndex, RasterIndex, StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct ManifestIndex {
    path: PathBuf,
    inner: MemoryIndex,
}

impl ManifestIndex {
    /// Read and parse a manifest file.
    pub async fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path).await?;
        Self::from_json(&path, &raw)
    }

    /// Parse manifest content as if it had been read from `path`.
    pub fn from_json(path: &Path, raw: &str) -> StorageResult<Self> {
        let mut entries: Vec<IndexEntry> =
            serde_json::from_str(raw).map_err(|e| StorageError::Manifest {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for entry in &mut entries {
            let storage = Path::new(&entry.storage_path);
            if storage.is_relative() {
                entry.storage_path = base.join(storage).display().to_string();
            }
        }

        debug!(path = %path.display(), entries = entries.len(), "Loaded raster manifest");

        Ok(Self {
            path: path.to_path_buf(),
            inner: MemoryIndex::with_entries(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[IndexEntry] {
        self.inner.entries()
    }
}

#[async_trait]
impl RasterIndex for ManifestIndex {
    async fn find_rasters(&self, query: &IndexQuery) -> StorageResult<Vec<IndexEntry>> {
        self.inner.find_rasters(query).await
    }
}
