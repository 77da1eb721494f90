//! Client-supplied query geometry.
//!
//! Accepts a bare GeoJSON geometry, a `Feature`, or a `FeatureCollection`
//! (whose first feature is used). Supported kinds are `Point`, `LineString`
//! and `Polygon`, with holes. Positions are `[x, y]` in the geometry's CRS
//! (longitude first for geographic input); any further ordinates are ignored.

use drill_common::{BoundingBox, Crs};
use serde_json::{json, Value};

use crate::error::{DrillError, DrillResult};
use crate::polygon::PolygonRings;

/// An `(x, y)` coordinate pair.
pub type Coord = (f64, f64);

/// Geometry payload, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryKind {
    Point(Coord),
    LineString(Vec<Coord>),
    Polygon(PolygonRings),
}

/// Query type reported in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Point,
    LineString,
    Polygon,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Point => "point",
            QueryType::LineString => "linestring",
            QueryType::Polygon => "polygon",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GeometryKind {
    pub fn query_type(&self) -> QueryType {
        match self {
            GeometryKind::Point(_) => QueryType::Point,
            GeometryKind::LineString(_) => QueryType::LineString,
            GeometryKind::Polygon(_) => QueryType::Polygon,
        }
    }

    /// Positions sampled individually (point and line vertices); empty for polygons.
    pub fn sample_points(&self) -> Vec<Coord> {
        match self {
            GeometryKind::Point(p) => vec![*p],
            GeometryKind::LineString(line) => line.clone(),
            GeometryKind::Polygon(_) => Vec::new(),
        }
    }

    /// Bounding box over every coordinate.
    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            GeometryKind::Point(p) => BoundingBox::from_points([*p]),
            GeometryKind::LineString(line) => BoundingBox::from_points(line.iter().copied()),
            GeometryKind::Polygon(poly) => BoundingBox::from_points(poly.exterior.iter().copied()),
        }
    }

    /// Apply a fallible coordinate mapping to every vertex.
    pub fn try_map<E, F>(&self, mut f: F) -> Result<GeometryKind, E>
    where
        F: FnMut(Coord) -> Result<Coord, E>,
    {
        let mut map_ring = |ring: &[Coord]| ring.iter().map(|&c| f(c)).collect::<Result<Vec<_>, E>>();
        Ok(match self {
            GeometryKind::Point(p) => GeometryKind::Point(map_ring(&[*p])?[0]),
            GeometryKind::LineString(line) => GeometryKind::LineString(map_ring(line)?),
            GeometryKind::Polygon(poly) => {
                let exterior = map_ring(&poly.exterior)?;
                let holes = poly
                    .holes
                    .iter()
                    .map(|h| map_ring(h))
                    .collect::<Result<Vec<_>, E>>()?;
                GeometryKind::Polygon(PolygonRings { exterior, holes })
            }
        })
    }

    /// GeoJSON geometry object for this payload.
    pub fn to_geojson(&self) -> Value {
        let ring = |r: &[Coord]| r.iter().map(|(x, y)| json!([x, y])).collect::<Vec<_>>();
        match self {
            GeometryKind::Point((x, y)) => json!({"type": "Point", "coordinates": [x, y]}),
            GeometryKind::LineString(line) => {
                json!({"type": "LineString", "coordinates": ring(line)})
            }
            GeometryKind::Polygon(poly) => {
                let mut rings = vec![ring(&poly.exterior)];
                rings.extend(poly.holes.iter().map(|h| ring(h)));
                json!({"type": "Polygon", "coordinates": rings})
            }
        }
    }
}

/// A validated geometry in its source CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryGeometry {
    pub kind: GeometryKind,
    pub crs: Crs,
}

impl QueryGeometry {
    /// Parse GeoJSON input.
    ///
    /// # Arguments
    /// * `input` - geometry, Feature or FeatureCollection
    /// * `explicit_crs` - CRS request parameter; wins over any `crs` member
    /// * `default_crs` - used when neither names a CRS
    /// * `ring_tolerance` - closure snapping distance for polygon rings
    pub fn from_geojson(
        input: &Value,
        explicit_crs: Option<&str>,
        default_crs: &Crs,
        ring_tolerance: f64,
    ) -> DrillResult<Self> {
        let mut crs_name = crs_member(input);

        let feature = match type_of(input)? {
            "FeatureCollection" => {
                let first = input
                    .get("features")
                    .and_then(Value::as_array)
                    .and_then(|features| features.first())
                    .ok_or_else(|| invalid("FeatureCollection has no features"))?;
                if let Some(crs) = crs_member(first) {
                    crs_name = Some(crs);
                }
                first
            }
            _ => input,
        };

        let geometry = match type_of(feature)? {
            "Feature" => {
                let geometry = feature
                    .get("geometry")
                    .filter(|g| !g.is_null())
                    .ok_or_else(|| invalid("Feature has no geometry"))?;
                if let Some(crs) = crs_member(geometry) {
                    crs_name = Some(crs);
                }
                geometry
            }
            _ => feature,
        };

        let crs = match explicit_crs.filter(|s| !s.trim().is_empty()).or(crs_name.as_deref()) {
            Some(name) => Crs::parse(name)
                .map_err(|e| DrillError::InvalidGeometry(format!("geometry CRS: {}", e)))?,
            None => default_crs.clone(),
        };

        let coordinates = geometry
            .get("coordinates")
            .ok_or_else(|| invalid("geometry has no coordinates"))?;

        let kind = match type_of(geometry)? {
            "Point" => GeometryKind::Point(parse_position(coordinates)?),
            "LineString" => {
                let line = parse_positions(coordinates)?;
                if line.len() < 2 {
                    return Err(invalid("LineString needs at least 2 positions"));
                }
                GeometryKind::LineString(line)
            }
            "Polygon" => {
                let rings = coordinates
                    .as_array()
                    .ok_or_else(|| invalid("Polygon coordinates must be an array of rings"))?;
                let mut closed = rings
                    .iter()
                    .map(|r| parse_positions(r).and_then(|ring| close_ring(ring, ring_tolerance)));
                let exterior = closed
                    .next()
                    .ok_or_else(|| invalid("Polygon has no rings"))??;
                let holes = closed.collect::<DrillResult<Vec<_>>>()?;
                GeometryKind::Polygon(PolygonRings { exterior, holes })
            }
            other => {
                return Err(invalid(&format!("unsupported geometry type '{}'", other)));
            }
        };

        Ok(Self { kind, crs })
    }

    pub fn query_type(&self) -> QueryType {
        self.kind.query_type()
    }

    /// The geometry as a GeoJSON object in its source CRS.
    pub fn to_geojson(&self) -> Value {
        self.kind.to_geojson()
    }
}

/// Close a ring: snap a last vertex within `tolerance` of the first, otherwise
/// append the first vertex. A closed ring needs at least four positions.
pub fn close_ring(mut ring: Vec<Coord>, tolerance: f64) -> DrillResult<Vec<Coord>> {
    let (first, last) = match (ring.first(), ring.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return Err(invalid("Polygon ring is empty")),
    };

    let near = (first.0 - last.0).abs() <= tolerance && (first.1 - last.1).abs() <= tolerance;
    if ring.len() > 1 && near {
        if let Some(end) = ring.last_mut() {
            *end = first;
        }
    } else {
        ring.push(first);
    }

    if ring.len() < 4 {
        return Err(invalid(&format!(
            "Polygon ring needs at least 4 positions after closing, got {}",
            ring.len()
        )));
    }
    Ok(ring)
}

fn invalid(msg: &str) -> DrillError {
    DrillError::InvalidGeometry(msg.to_string())
}

fn type_of(value: &Value) -> DrillResult<&str> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("GeoJSON object has no 'type'"))
}

/// CRS named by a `crs` member, either a string or `{"type":"name","properties":{"name":..}}`.
fn crs_member(value: &Value) -> Option<String> {
    match value.get("crs")? {
        Value::String(s) => Some(s.clone()),
        obj => obj
            .get("properties")
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .map(String::from),
    }
}

fn parse_position(value: &Value) -> DrillResult<Coord> {
    let arr = value
        .as_array()
        .ok_or_else(|| invalid("position must be an array of numbers"))?;
    if arr.len() < 2 {
        return Err(invalid("position needs at least 2 ordinates"));
    }
    let x = arr[0].as_f64();
    let y = arr[1].as_f64();
    match (x, y) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok((x, y)),
        _ => Err(invalid(&format!("position {} is not a pair of finite numbers", value))),
    }
}

fn parse_positions(value: &Value) -> DrillResult<Vec<Coord>> {
    value
        .as_array()
        .ok_or_else(|| invalid("coordinates must be an array of positions"))?
        .iter()
        .map(parse_position)
        .collect()
}
