//! The raster index query interface.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::StorageResult;

/// One raster file known to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Catalog model name, e.g. `HRDPS.CONTINENTAL`.
    pub model: String,
    /// Parameter code, e.g. `TT`.
    pub parameter: String,
    pub reference_time: DateTime<Utc>,
    pub forecast_hour: u32,
    pub storage_path: String,
}

impl IndexEntry {
    pub fn valid_time(&self) -> DateTime<Utc> {
        self.reference_time + Duration::hours(self.forecast_hour as i64)
    }
}

/// A batched lookup across several parameters and forecast hours of one run.
#[derive(Debug, Clone)]
pub struct IndexQuery {
    pub model: String,
    pub parameters: Vec<String>,
    pub model_run: DateTime<Utc>,
    pub forecast_hours: Vec<u32>,
}

impl IndexQuery {
    pub fn matches(&self, entry: &IndexEntry) -> bool {
        entry.model == self.model
            && entry.reference_time == self.model_run
            && self.parameters.iter().any(|p| p == &entry.parameter)
            && self.forecast_hours.contains(&entry.forecast_hour)
    }
}

/// Anything that can translate a query into raster file locations.
#[async_trait]
pub trait RasterIndex: Send + Sync {
    /// Return every entry matching the query, in no particular order.
    async fn find_rasters(&self, query: &IndexQuery) -> StorageResult<Vec<IndexEntry>>;
}

/// An index over a fixed list of entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    entries: Vec<IndexEntry>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, entry: IndexEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RasterIndex for MemoryIndex {
    async fn find_rasters(&self, query: &IndexQuery) -> StorageResult<Vec<IndexEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect())
    }
}
