//! On-disk raster fixtures.
//!
//! [`RasterFixture`] writes one Zarr raster per (parameter, forecast hour)
//! into a temporary directory and records each in a [`MemoryIndex`], the
//! same way the ingestion side registers files in the catalog.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use drill_common::{AffineTransform, Crs};
use grid_processor::{Compression, RasterSpec, WriterConfig, ZarrWriter};
use storage::{IndexEntry, MemoryIndex};
use tempfile::TempDir;

use crate::generators::create_constant_grid;

/// Catalog model name used by default.
pub const FIXTURE_MODEL: &str = "HRDPS.CONTINENTAL";

/// Parameter codes for temperature, wind speed and wind direction.
pub const FIXTURE_PARAMETERS: [&str; 3] = ["TT", "WSPD", "WD"];

/// The model run used by default: 2024-03-01T12:00:00Z.
pub fn fixture_model_run() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Grid layout shared by every raster of a fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureGrid {
    pub rows: usize,
    pub cols: usize,
    pub crs: Crs,
    pub transform: AffineTransform,
    pub nodata: Option<f64>,
}

impl FixtureGrid {
    /// 20x20 geographic grid of 0.5 degree cells, top-left corner at (-80, 50).
    pub fn geographic() -> Self {
        Self {
            rows: 20,
            cols: 20,
            crs: Crs::Geographic,
            transform: AffineTransform::north_up(-80.0, 50.0, 0.5, -0.5),
            nodata: Some(-9999.0),
        }
    }

    /// Coordinates of the centre of pixel `(row, col)`.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_center(col, row)
    }
}

/// Rasters for one model run in a temporary directory.
pub struct RasterFixture {
    dir: TempDir,
    model: String,
    model_run: DateTime<Utc>,
    grid: FixtureGrid,
    index: MemoryIndex,
    writer: ZarrWriter,
}

impl RasterFixture {
    /// An empty fixture on the default geographic grid.
    pub fn new() -> std::io::Result<Self> {
        Self::with_grid(FixtureGrid::geographic())
    }

    pub fn with_grid(grid: FixtureGrid) -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            model: FIXTURE_MODEL.to_string(),
            model_run: fixture_model_run(),
            grid,
            index: MemoryIndex::new(),
            writer: ZarrWriter::new(WriterConfig {
                chunk_size: 8,
                compression: Compression::BloscLz4,
                ..Default::default()
            }),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn model_run(&self) -> DateTime<Utc> {
        self.model_run
    }

    pub fn grid(&self) -> &FixtureGrid {
        &self.grid
    }

    /// Snapshot of the index holding every raster written so far.
    pub fn index(&self) -> MemoryIndex {
        self.index.clone()
    }

    /// Write one raster and register it in the index.
    ///
    /// `data` is row-major over the fixture grid.
    pub fn write_raster(
        &mut self,
        parameter: &str,
        forecast_hour: u32,
        data: Vec<f32>,
    ) -> grid_processor::Result<PathBuf> {
        let grid = self.grid.clone();
        self.write_raster_on(&grid, parameter, forecast_hour, data)
    }

    /// Write one raster on a grid other than the fixture's default.
    pub fn write_raster_on(
        &mut self,
        grid: &FixtureGrid,
        parameter: &str,
        forecast_hour: u32,
        data: Vec<f32>,
    ) -> grid_processor::Result<PathBuf> {
        let path = self
            .dir
            .path()
            .join(format!("{}_{}_{:03}.zarr", self.model, parameter, forecast_hour));

        let mut spec = RasterSpec::new(grid.rows, grid.cols, grid.crs.clone(), grid.transform);
        spec.nodata = grid.nodata;
        spec.variable = Some(parameter.to_string());
        spec.model = Some(self.model.clone());
        spec.reference_time = Some(self.model_run);
        spec.forecast_hour = Some(forecast_hour);
        self.writer.write_to_dir(&path, &spec, &data.into())?;

        self.register(parameter, forecast_hour, &path.to_string_lossy());
        Ok(path)
    }

    /// Write all three variables of one hour with constant values.
    pub fn write_constant_hour(
        &mut self,
        forecast_hour: u32,
        values: [f32; 3],
    ) -> grid_processor::Result<()> {
        let (rows, cols) = (self.grid.rows, self.grid.cols);
        for (parameter, value) in FIXTURE_PARAMETERS.iter().zip(values) {
            self.write_raster(parameter, forecast_hour, create_constant_grid(rows, cols, value))?;
        }
        Ok(())
    }

    /// Write all three variables of one hour from full grids.
    pub fn write_hour(
        &mut self,
        forecast_hour: u32,
        grids: [Vec<f32>; 3],
    ) -> grid_processor::Result<()> {
        for (parameter, data) in FIXTURE_PARAMETERS.iter().zip(grids) {
            self.write_raster(parameter, forecast_hour, data)?;
        }
        Ok(())
    }

    /// Add an index entry without writing a raster (for dangling paths).
    pub fn register(&mut self, parameter: &str, forecast_hour: u32, storage_path: &str) {
        self.index.insert(IndexEntry {
            model: self.model.clone(),
            parameter: parameter.to_string(),
            reference_time: self.model_run,
            forecast_hour,
            storage_path: storage_path.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_writes_and_indexes() {
        let mut fixture = RasterFixture::new().unwrap();
        fixture.write_constant_hour(0, [5.2, 12.0, 270.0]).unwrap();
        fixture.write_constant_hour(6, [4.0, 10.0, 180.0]).unwrap();

        let index = fixture.index();
        assert_eq!(index.len(), 6);
        for entry in index.entries() {
            assert!(Path::new(&entry.storage_path).join("zarr.json").exists());
            assert_eq!(entry.reference_time, fixture.model_run());
        }
    }

    #[test]
    fn test_pixel_center() {
        let grid = FixtureGrid::geographic();
        assert_eq!(grid.pixel_center(0, 0), (-79.75, 49.75));
        assert_eq!(grid.pixel_center(10, 10), (-74.75, 44.75));
    }
}
