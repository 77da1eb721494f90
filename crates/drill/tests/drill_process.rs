//! End-to-end extraction over rasters written to a temporary directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use drill::{
    DrillConfig, DrillError, DrillProcess, DrillRequest, ExtractionResult, ForecastHoursInput,
    SampledValue, ZonalStats,
};
use drill_common::{AffineTransform, Crs, Variable};
use projection::Transformer;
use serde_json::{json, Value};
use storage::{IndexEntry, IndexQuery, MemoryIndex, RasterIndex, StorageResult};
use test_utils::{
    assert_some_approx_eq, create_constant_grid, create_index_grid, set_cells, FixtureGrid,
    RasterFixture, FIXTURE_PARAMETERS,
};

/// Index that counts how often it is queried.
struct CountingIndex {
    inner: MemoryIndex,
    calls: AtomicUsize,
}

#[async_trait]
impl RasterIndex for CountingIndex {
    async fn find_rasters(&self, query: &IndexQuery) -> StorageResult<Vec<IndexEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_rasters(query).await
    }
}

fn process(fixture: &RasterFixture) -> DrillProcess {
    DrillProcess::new(Arc::new(fixture.index()), DrillConfig::default())
}

fn request(hours: &[i64], geometry: Value) -> DrillRequest {
    DrillRequest {
        model: "hrdps".to_string(),
        model_run: "2024-03-01T12:00:00Z".to_string(),
        forecast_hours: ForecastHoursInput::List(hours.to_vec()),
        geometry,
        crs: None,
        format: None,
    }
}

fn point(x: f64, y: f64) -> Value {
    json!({"type": "Point", "coordinates": [x, y]})
}

fn square(x0: f64, y0: f64, size: f64) -> Value {
    json!({"type": "Polygon", "coordinates": [[
        [x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size], [x0, y0]
    ]]})
}

fn polygon_stats(result: &ExtractionResult, record: usize, variable: Variable) -> ZonalStats {
    match result.records()[record].value(variable) {
        Some(SampledValue::Polygon(stats)) => *stats,
        other => panic!("expected polygon stats, got {:?}", other),
    }
}

/// Temperature is the index grid; wind speed and direction are constant.
fn index_fixture(hours: &[u32]) -> RasterFixture {
    let mut fixture = RasterFixture::new().unwrap();
    let FixtureGrid { rows, cols, .. } = fixture.grid().clone();
    for &hour in hours {
        fixture
            .write_hour(
                hour,
                [
                    create_index_grid(rows, cols),
                    create_constant_grid(rows, cols, 10.0 + hour as f32),
                    create_constant_grid(rows, cols, 180.0),
                ],
            )
            .unwrap();
    }
    fixture
}

#[tokio::test]
async fn test_point_returns_raw_pixel_values() {
    let mut fixture = RasterFixture::new().unwrap();
    for hour in [12, 0, 6] {
        fixture.write_constant_hour(hour, [5.2, 12.0, 270.0]).unwrap();
    }

    let (x, y) = fixture.grid().pixel_center(10, 10);
    let result = process(&fixture)
        .execute(&request(&[0, 6, 12], point(x, y)))
        .await
        .unwrap();

    assert_eq!(result.forecast_hours(), vec![0, 6, 12]);
    let hour0 = &result.records()[0];
    assert_eq!(
        hour0.value(Variable::Temperature),
        Some(&SampledValue::Point(Some(5.2_f32 as f64)))
    );
    assert_eq!(
        hour0.value(Variable::WindSpeed),
        Some(&SampledValue::Point(Some(12.0)))
    );
    assert_eq!(
        hour0.value(Variable::WindDirection),
        Some(&SampledValue::Point(Some(270.0)))
    );
    assert!(result.out_of_bounds().is_empty());
    assert!(result.notes().is_empty());
}

#[tokio::test]
async fn test_one_index_query_per_request() {
    let fixture = index_fixture(&[0, 3, 6, 9]);
    let index = Arc::new(CountingIndex {
        inner: fixture.index(),
        calls: AtomicUsize::new(0),
    });
    let process = DrillProcess::new(index.clone(), DrillConfig::default());

    let (x, y) = fixture.grid().pixel_center(4, 4);
    let result = process
        .execute(&request(&[0, 3, 6, 9, 12], point(x, y)))
        .await
        .unwrap();

    assert_eq!(result.forecast_hours(), vec![0, 3, 6, 9]);
    assert_eq!(index.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_hours_sharing_raster_files() {
    let mut fixture = RasterFixture::new().unwrap();
    let FixtureGrid { rows, cols, .. } = fixture.grid().clone();
    let grids = [
        create_index_grid(rows, cols),
        create_constant_grid(rows, cols, 7.5),
        create_constant_grid(rows, cols, 90.0),
    ];
    for (parameter, data) in FIXTURE_PARAMETERS.iter().zip(grids) {
        let path = fixture.write_raster(parameter, 0, data).unwrap();
        fixture.register(parameter, 6, &path.to_string_lossy());
    }

    let config = DrillConfig {
        max_parallel_hours: 2,
        ..DrillConfig::default()
    };
    let process = DrillProcess::new(Arc::new(fixture.index()), config);
    let (x, y) = fixture.grid().pixel_center(3, 5);
    let result = process
        .execute(&request(&[0, 6], point(x, y)))
        .await
        .unwrap();

    assert_eq!(result.forecast_hours(), vec![0, 6]);
    let [first, second] = result.records() else {
        panic!("expected two records, got {}", result.records().len());
    };
    assert_eq!(first.values, second.values);
    assert_eq!(
        first.value(Variable::Temperature),
        Some(&SampledValue::Point(Some(3005.0)))
    );
    assert_eq!(
        second.value(Variable::WindSpeed),
        Some(&SampledValue::Point(Some(7.5)))
    );
    assert!(result.notes().is_empty());
}

#[tokio::test]
async fn test_hours_reported_ascending() {
    let fixture = index_fixture(&[18, 3, 9, 0]);
    let (x, y) = fixture.grid().pixel_center(0, 0);
    let result = process(&fixture)
        .execute(&request(&[18, 9, 0, 3, 9], point(x, y)))
        .await
        .unwrap();
    assert_eq!(result.forecast_hours(), vec![0, 3, 9, 18]);

    let speeds: Vec<_> = result
        .records()
        .iter()
        .map(|r| r.value(Variable::WindSpeed).cloned())
        .collect();
    assert_eq!(speeds[3], Some(SampledValue::Point(Some(28.0))));
}

#[tokio::test]
async fn test_point_outside_raster_is_null() {
    let fixture = index_fixture(&[0]);
    let result = process(&fixture)
        .execute(&request(&[0], point(-100.0, 45.0)))
        .await
        .unwrap();

    for variable in Variable::ALL {
        assert_eq!(
            result.records()[0].value(variable),
            Some(&SampledValue::Point(None))
        );
    }
    assert_eq!(result.out_of_bounds().len(), 3);
    assert_eq!(result.out_of_bounds()[0].vertex, Some(0));
}

#[tokio::test]
async fn test_point_on_nodata_is_null_without_flag() {
    let mut fixture = RasterFixture::new().unwrap();
    let FixtureGrid { rows, cols, .. } = fixture.grid().clone();
    let mut temperature = create_constant_grid(rows, cols, 1.0);
    set_cells(&mut temperature, cols, &[(4, 4)], -9999.0);
    fixture
        .write_hour(
            0,
            [
                temperature,
                create_constant_grid(rows, cols, 2.0),
                create_constant_grid(rows, cols, 3.0),
            ],
        )
        .unwrap();

    let (x, y) = fixture.grid().pixel_center(4, 4);
    let result = process(&fixture)
        .execute(&request(&[0], point(x, y)))
        .await
        .unwrap();
    let record = &result.records()[0];
    assert_eq!(record.value(Variable::Temperature), Some(&SampledValue::Point(None)));
    assert_eq!(record.value(Variable::WindSpeed), Some(&SampledValue::Point(Some(2.0))));
    assert!(result.out_of_bounds().is_empty());
}

#[tokio::test]
async fn test_line_with_vertex_outside() {
    let fixture = index_fixture(&[0]);
    let grid = fixture.grid().clone();
    let a = grid.pixel_center(2, 3);
    let b = grid.pixel_center(15, 15);
    let line = json!({"type": "LineString", "coordinates": [
        [a.0, a.1], [-100.0, 45.0], [b.0, b.1]
    ]});

    let result = process(&fixture).execute(&request(&[0], line)).await.unwrap();
    assert_eq!(
        result.records()[0].value(Variable::Temperature),
        Some(&SampledValue::Line(vec![Some(2003.0), None, Some(15015.0)]))
    );
    let flagged: Vec<_> = result
        .out_of_bounds()
        .iter()
        .filter(|f| f.variable == Variable::Temperature)
        .map(|f| f.vertex)
        .collect();
    assert_eq!(flagged, vec![Some(1)]);
}

#[tokio::test]
async fn test_polygon_zonal_statistics() {
    let fixture = index_fixture(&[0, 6]);
    // Covers the centres of rows 4..=7, cols 4..=7
    let result = process(&fixture)
        .execute(&request(&[0, 6], square(-78.0, 46.0, 2.0)))
        .await
        .unwrap();

    for record in 0..2 {
        let stats = polygon_stats(&result, record, Variable::Temperature);
        assert_eq!(stats.count, 16);
        assert_eq!(stats.min, Some(4004.0));
        assert_eq!(stats.max, Some(7007.0));
        assert_some_approx_eq!(stats.mean, 5505.5, 1e-9);
        for variable in Variable::ALL {
            let s = polygon_stats(&result, record, variable);
            let (min, mean, max) = (s.min.unwrap(), s.mean.unwrap(), s.max.unwrap());
            assert!(min <= mean && mean <= max);
        }
    }
    assert_eq!(
        polygon_stats(&result, 1, Variable::WindSpeed).mean,
        Some(16.0)
    );
}

#[tokio::test]
async fn test_polygon_outside_coverage_is_null() {
    let fixture = index_fixture(&[0]);
    let result = process(&fixture)
        .execute(&request(&[0], square(10.0, 10.0, 1.0)))
        .await
        .unwrap();

    for variable in Variable::ALL {
        let stats = polygon_stats(&result, 0, variable);
        assert_eq!((stats.min, stats.mean, stats.max), (None, None, None));
    }
    assert!(result.out_of_bounds().iter().all(|f| f.vertex.is_none()));
    assert_eq!(result.out_of_bounds().len(), 3);
}

#[tokio::test]
async fn test_polygon_over_nodata_is_null_not_zero() {
    let mut fixture = RasterFixture::new().unwrap();
    let FixtureGrid { rows, cols, .. } = fixture.grid().clone();
    let cells: Vec<(usize, usize)> = (4..8).flat_map(|r| (4..8).map(move |c| (r, c))).collect();
    let mut temperature = create_constant_grid(rows, cols, 0.0);
    set_cells(&mut temperature, cols, &cells, -9999.0);
    fixture
        .write_hour(
            0,
            [
                temperature,
                create_constant_grid(rows, cols, 0.0),
                create_constant_grid(rows, cols, 0.0),
            ],
        )
        .unwrap();

    let result = process(&fixture)
        .execute(&request(&[0], square(-78.0, 46.0, 2.0)))
        .await
        .unwrap();

    let temp = polygon_stats(&result, 0, Variable::Temperature);
    assert_eq!((temp.min, temp.mean, temp.max), (None, None, None));
    let wind = polygon_stats(&result, 0, Variable::WindSpeed);
    assert_eq!((wind.min, wind.mean, wind.max), (Some(0.0), Some(0.0), Some(0.0)));
    assert!(result.out_of_bounds().is_empty());
}

#[tokio::test]
async fn test_incomplete_hour_dropped_with_note() {
    let mut fixture = index_fixture(&[0, 12]);
    let FixtureGrid { rows, cols, .. } = fixture.grid().clone();
    fixture
        .write_raster("TT", 6, create_constant_grid(rows, cols, 1.0))
        .unwrap();
    fixture
        .write_raster("WD", 6, create_constant_grid(rows, cols, 90.0))
        .unwrap();

    let (x, y) = fixture.grid().pixel_center(1, 1);
    let result = process(&fixture)
        .execute(&request(&[0, 6, 12], point(x, y)))
        .await
        .unwrap();

    assert_eq!(result.forecast_hours(), vec![0, 12]);
    assert_eq!(result.notes().len(), 1);
    assert_eq!(result.notes()[0].forecast_hour, 6);
    assert!(result.notes()[0].reason.contains("WSPD"));
}

#[tokio::test]
async fn test_nothing_resolved_is_not_found() {
    let fixture = index_fixture(&[0]);
    let err = process(&fixture)
        .execute(&request(&[48], point(-75.0, 45.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, DrillError::NotFound(_)));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_unreadable_raster_drops_hour() {
    let mut fixture = index_fixture(&[0]);
    let missing = fixture.path().join("never_written.zarr");
    for parameter in ["TT", "WSPD", "WD"] {
        fixture.register(parameter, 6, &missing.to_string_lossy());
    }

    let (x, y) = fixture.grid().pixel_center(3, 3);
    let result = process(&fixture)
        .execute(&request(&[0, 6], point(x, y)))
        .await
        .unwrap();
    assert_eq!(result.forecast_hours(), vec![0]);
    assert_eq!(result.notes()[0].forecast_hour, 6);

    // Every hour unreadable: the failure surfaces as a raster read error
    let err = process(&fixture)
        .execute(&request(&[6], point(x, y)))
        .await
        .unwrap_err();
    assert!(matches!(err, DrillError::RasterRead { .. }));
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn test_raster_with_wrong_variable_is_read_error() {
    let mut fixture = index_fixture(&[0]);
    // Register the hour-0 temperature raster as wind speed for hour 3
    let FixtureGrid { rows, cols, .. } = fixture.grid().clone();
    let tt = fixture
        .write_raster("TT", 3, create_constant_grid(rows, cols, 1.0))
        .unwrap();
    fixture
        .write_raster("WD", 3, create_constant_grid(rows, cols, 1.0))
        .unwrap();
    fixture.register("WSPD", 3, &tt.to_string_lossy());

    let err = process(&fixture)
        .execute(&request(&[3], point(-75.0, 45.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, DrillError::RasterRead { .. }));
}

#[tokio::test]
async fn test_geometry_in_web_mercator() {
    let fixture = index_fixture(&[0]);
    let (lon, lat) = fixture.grid().pixel_center(10, 10);
    let (x, y) = Transformer::new(&Crs::Geographic, &Crs::WebMercator)
        .transform(lon, lat)
        .unwrap();

    let mut req = request(&[0], point(x, y));
    req.crs = Some("EPSG:3857".to_string());
    let result = process(&fixture).execute(&req).await.unwrap();
    assert_eq!(
        result.records()[0].value(Variable::Temperature),
        Some(&SampledValue::Point(Some(10010.0)))
    );
    // The echoed geometry stays in the source CRS
    assert_eq!(result.geometry().crs, Crs::WebMercator);
}

#[tokio::test]
async fn test_raster_in_lambert_conformal() {
    let lcc = Crs::parse("+proj=lcc +lat_1=49 +lat_2=77 +lat_0=49 +lon_0=-95 +R=6371229").unwrap();
    let (lon, lat) = (-74.75, 44.75);
    let (x, y) = Transformer::new(&Crs::Geographic, &lcc)
        .transform(lon, lat)
        .unwrap();
    let cell = 2500.0;
    let grid = FixtureGrid {
        rows: 12,
        cols: 12,
        crs: lcc,
        // (lon, lat) lands on the centre of pixel (5, 5)
        transform: AffineTransform::north_up(x - 5.5 * cell, y + 5.5 * cell, cell, -cell),
        nodata: None,
    };
    let mut fixture = RasterFixture::with_grid(grid).unwrap();
    fixture
        .write_hour(
            0,
            [
                create_index_grid(12, 12),
                create_constant_grid(12, 12, 7.0),
                create_constant_grid(12, 12, 45.0),
            ],
        )
        .unwrap();

    let result = process(&fixture)
        .execute(&request(&[0], point(lon, lat)))
        .await
        .unwrap();
    assert_eq!(
        result.records()[0].value(Variable::Temperature),
        Some(&SampledValue::Point(Some(5005.0)))
    );
}

#[tokio::test]
async fn test_invalid_geometry_fails_fast() {
    let fixture = index_fixture(&[0]);
    let err = process(&fixture)
        .execute(&request(&[0], json!({"type": "MultiPolygon", "coordinates": []})))
        .await
        .unwrap_err();
    assert!(matches!(err, DrillError::InvalidGeometry(_)));
    assert_eq!(err.exit_code(), 2);

    // A pole cannot be expressed in Web Mercator
    let mut fixture = RasterFixture::with_grid(FixtureGrid {
        crs: Crs::WebMercator,
        transform: AffineTransform::north_up(-1.0e6, 1.0e6, 1.0e5, -1.0e5),
        ..FixtureGrid::geographic()
    })
    .unwrap();
    fixture.write_constant_hour(0, [1.0, 2.0, 3.0]).unwrap();
    let err = process(&fixture)
        .execute(&request(&[0], point(0.0, 90.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, DrillError::InvalidGeometry(_)));
}

#[tokio::test]
async fn test_run_encodes_requested_format() {
    let fixture = index_fixture(&[0]);
    let (x, y) = fixture.grid().pixel_center(1, 2);

    let geojson = process(&fixture)
        .run(&request(&[0], point(x, y)))
        .await
        .unwrap();
    assert_eq!(geojson.content_type, "application/geo+json");
    let doc: Value = serde_json::from_str(&geojson.body).unwrap();
    assert_eq!(doc["properties"]["model"], "hrdps");
    assert_eq!(doc["properties"]["forecasts"][0]["temperature"], 1002.0);
    assert_eq!(doc["properties"]["forecasts"][0]["valid_time"], "2024-03-01T12:00:00Z");

    let mut req = request(&[0], point(x, y));
    req.format = Some("csv".to_string());
    let csv = process(&fixture).run(&req).await.unwrap();
    assert_eq!(csv.content_type, "text/csv");
    let rows: Vec<&str> = csv.body.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[1].ends_with(",1002,10,180"));

    req.format = Some("xml".to_string());
    let err = process(&fixture).run(&req).await.unwrap_err();
    assert!(matches!(err, DrillError::InvalidParameter(_)));
}
