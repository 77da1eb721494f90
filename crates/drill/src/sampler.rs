//! Geometry-dispatched pixel extraction.
//!
//! Points and line vertices read the single pixel covering them (floor
//! indexing of the inverse geotransform, no interpolation). Polygons read the
//! window under their bounding box and summarise every cell whose centre lies
//! inside the polygon. Out-of-grid positions, nodata and empty masks produce
//! nulls, never errors.

use grid_processor::{GridProcessorError, RasterSource};
use tracing::debug;

use crate::geometry::GeometryKind;
use crate::normalize::ReprojectedGeometry;
use crate::polygon::{PolygonRings, StatsAccumulator, ZonalStats};

/// Value extracted from one raster for one geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum SampledValue {
    Point(Option<f64>),
    /// One entry per line vertex, in vertex order.
    Line(Vec<Option<f64>>),
    Polygon(ZonalStats),
}

/// A sampled value plus the positions that fell outside the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    pub value: SampledValue,
    /// Vertex indices outside the grid; `None` marks a polygon that misses it entirely.
    pub out_of_bounds: Vec<Option<usize>>,
}

/// Sample `source` with a geometry already expressed in the source's CRS.
pub fn sample(
    source: &dyn RasterSource,
    geometry: &ReprojectedGeometry,
) -> Result<SampleOutcome, GridProcessorError> {
    match &geometry.kind {
        GeometryKind::Point((x, y)) => {
            let (value, outside) = sample_position(source, *x, *y)?;
            Ok(SampleOutcome {
                value: SampledValue::Point(value),
                out_of_bounds: if outside { vec![Some(0)] } else { Vec::new() },
            })
        }
        GeometryKind::LineString(vertices) => {
            let mut values = Vec::with_capacity(vertices.len());
            let mut out_of_bounds = Vec::new();
            for (i, (x, y)) in vertices.iter().enumerate() {
                let (value, outside) = sample_position(source, *x, *y)?;
                if outside {
                    out_of_bounds.push(Some(i));
                }
                values.push(value);
            }
            Ok(SampleOutcome {
                value: SampledValue::Line(values),
                out_of_bounds,
            })
        }
        GeometryKind::Polygon(polygon) => sample_polygon(source, polygon, geometry),
    }
}

/// Value at a position and whether the position is outside the grid.
fn sample_position(
    source: &dyn RasterSource,
    x: f64,
    y: f64,
) -> Result<(Option<f64>, bool), GridProcessorError> {
    match source.metadata().pixel_of(x, y) {
        Some((row, col)) => Ok((source.read_pixel(row, col)?, false)),
        None => Ok((None, true)),
    }
}

fn sample_polygon(
    source: &dyn RasterSource,
    polygon: &PolygonRings,
    geometry: &ReprojectedGeometry,
) -> Result<SampleOutcome, GridProcessorError> {
    let metadata = source.metadata();
    let window = source.read_window(&geometry.bbox)?;
    if window.is_empty() {
        debug!(bbox = ?geometry.bbox, "Polygon does not overlap the raster grid");
        return Ok(SampleOutcome {
            value: SampledValue::Polygon(ZonalStats::empty()),
            out_of_bounds: vec![None],
        });
    }

    let mut acc = StatsAccumulator::default();
    let mut masked = 0usize;
    for row in 0..window.rows {
        for col in 0..window.cols {
            let (cx, cy) = window.pixel_center(row, col);
            if !polygon.contains(cx, cy) {
                continue;
            }
            masked += 1;
            if let Some(v) = window.get(row, col).filter(|v| metadata.is_valid(*v)) {
                acc.push(v);
            }
        }
    }

    let stats = acc.finish();
    debug!(
        window_rows = window.rows,
        window_cols = window.cols,
        masked_cells = masked,
        valid_cells = stats.count,
        "Computed zonal statistics"
    );
    Ok(SampleOutcome {
        value: SampledValue::Polygon(stats),
        out_of_bounds: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_common::{AffineTransform, BoundingBox, Crs};
    use grid_processor::{RasterMetadata, RasterWindow};

    /// A 10x10 grid at 1-unit pixels, origin (0, 10), value = row * 10 + col.
    struct GridSource {
        metadata: RasterMetadata,
        data: Vec<f64>,
    }

    impl GridSource {
        fn new(nodata: Option<f64>) -> Self {
            Self {
                metadata: RasterMetadata {
                    crs: Crs::Geographic,
                    transform: AffineTransform::north_up(0.0, 10.0, 1.0, -1.0),
                    nodata,
                    rows: 10,
                    cols: 10,
                    bands: 1,
                    data_type: "float64".to_string(),
                    variable: None,
                    model: None,
                    reference_time: None,
                    forecast_hour: None,
                    units: None,
                },
                data: (0..100).map(|v| v as f64).collect(),
            }
        }

        fn set(&mut self, row: usize, col: usize, value: f64) {
            self.data[row * 10 + col] = value;
        }
    }

    impl RasterSource for GridSource {
        fn metadata(&self) -> &RasterMetadata {
            &self.metadata
        }

        fn read_window(&self, bbox: &BoundingBox) -> grid_processor::Result<RasterWindow> {
            let t = &self.metadata.transform;
            let col0 = bbox.min_x.floor().max(0.0) as usize;
            let col1 = (bbox.max_x.ceil().min(10.0).max(0.0)) as usize;
            let row0 = (10.0 - bbox.max_y).floor().max(0.0) as usize;
            let row1 = ((10.0 - bbox.min_y).ceil().min(10.0).max(0.0)) as usize;
            if col1 <= col0 || row1 <= row0 {
                return Ok(RasterWindow::empty(*t));
            }
            let mut data = Vec::new();
            for r in row0..row1 {
                data.extend_from_slice(&self.data[r * 10 + col0..r * 10 + col1]);
            }
            Ok(RasterWindow {
                data,
                rows: row1 - row0,
                cols: col1 - col0,
                row_off: row0,
                col_off: col0,
                transform: t.offset(col0, row0),
            })
        }

        fn read_pixel(&self, row: usize, col: usize) -> grid_processor::Result<Option<f64>> {
            Ok(self
                .data
                .get(row * 10 + col)
                .copied()
                .filter(|v| self.metadata.is_valid(*v)))
        }
    }

    fn geometry(kind: GeometryKind) -> ReprojectedGeometry {
        let bbox = kind.bbox().unwrap();
        ReprojectedGeometry {
            kind,
            crs: Crs::Geographic,
            bbox,
        }
    }

    fn square(x0: f64, y0: f64, size: f64) -> PolygonRings {
        PolygonRings::new(vec![
            (x0, y0),
            (x0 + size, y0),
            (x0 + size, y0 + size),
            (x0, y0 + size),
            (x0, y0),
        ])
    }

    #[test]
    fn test_point_reads_exact_pixel() {
        let source = GridSource::new(None);
        // (3.5, 6.5) is column 3, row 3
        let out = sample(&source, &geometry(GeometryKind::Point((3.5, 6.5)))).unwrap();
        assert_eq!(out.value, SampledValue::Point(Some(33.0)));
        assert!(out.out_of_bounds.is_empty());

        // On a pixel edge floor indexing picks the pixel to the lower right
        let edge = sample(&source, &geometry(GeometryKind::Point((4.0, 6.0)))).unwrap();
        assert_eq!(edge.value, SampledValue::Point(Some(44.0)));
    }

    #[test]
    fn test_point_outside_and_nodata() {
        let mut source = GridSource::new(Some(-999.0));
        source.set(0, 0, -999.0);

        let outside = sample(&source, &geometry(GeometryKind::Point((12.0, 5.0)))).unwrap();
        assert_eq!(outside.value, SampledValue::Point(None));
        assert_eq!(outside.out_of_bounds, vec![Some(0)]);

        let nodata = sample(&source, &geometry(GeometryKind::Point((0.5, 9.5)))).unwrap();
        assert_eq!(nodata.value, SampledValue::Point(None));
        assert!(nodata.out_of_bounds.is_empty());
    }

    #[test]
    fn test_line_keeps_vertex_order() {
        let source = GridSource::new(None);
        let line = GeometryKind::LineString(vec![(0.5, 9.5), (25.0, 5.0), (9.5, 0.5)]);
        let out = sample(&source, &geometry(line)).unwrap();
        assert_eq!(
            out.value,
            SampledValue::Line(vec![Some(0.0), None, Some(99.0)])
        );
        assert_eq!(out.out_of_bounds, vec![Some(1)]);
    }

    #[test]
    fn test_polygon_stats_over_cell_centres() {
        let mut source = GridSource::new(Some(-1.0));
        // Square covering columns 1..3, rows 1..3 (values 11,12,21,22)
        let poly = square(1.0, 7.0, 2.0);
        let out = sample(&source, &geometry(GeometryKind::Polygon(poly.clone()))).unwrap();
        match out.value {
            SampledValue::Polygon(stats) => {
                assert_eq!(stats.count, 4);
                assert_eq!(stats.min, Some(11.0));
                assert_eq!(stats.max, Some(22.0));
                assert_eq!(stats.mean, Some(16.5));
            }
            other => panic!("expected polygon stats, got {:?}", other),
        }

        // Nodata and NaN are excluded
        source.set(1, 1, -1.0);
        source.set(2, 2, f64::NAN);
        let out = sample(&source, &geometry(GeometryKind::Polygon(poly))).unwrap();
        match out.value {
            SampledValue::Polygon(stats) => {
                assert_eq!(stats.count, 2);
                assert_eq!(stats.mean, Some(16.5));
            }
            other => panic!("expected polygon stats, got {:?}", other),
        }
    }

    #[test]
    fn test_polygon_with_no_valid_cells_is_null() {
        let source = GridSource::new(None);

        // Entirely outside the grid
        let outside = sample(&source, &geometry(GeometryKind::Polygon(square(20.0, 20.0, 5.0)))).unwrap();
        assert_eq!(outside.value, SampledValue::Polygon(ZonalStats::empty()));
        assert_eq!(outside.out_of_bounds, vec![None]);

        // Inside the grid but too small to contain any cell centre
        let sliver = sample(&source, &geometry(GeometryKind::Polygon(square(2.1, 5.1, 0.2)))).unwrap();
        assert_eq!(sliver.value, SampledValue::Polygon(ZonalStats::empty()));
        assert!(sliver.out_of_bounds.is_empty());
    }

    #[test]
    fn test_polygon_hole_is_excluded() {
        let source = GridSource::new(None);
        let mut poly = square(0.0, 0.0, 10.0);
        poly.holes.push(square(0.0, 0.0, 9.0).exterior);
        // Only the L-shaped strip of row 0 and column 9 remains
        let out = sample(&source, &geometry(GeometryKind::Polygon(poly))).unwrap();
        match out.value {
            SampledValue::Polygon(stats) => {
                assert_eq!(stats.count, 19);
                assert_eq!(stats.min, Some(0.0));
                assert_eq!(stats.max, Some(99.0));
            }
            other => panic!("expected polygon stats, got {:?}", other),
        }
    }
}
