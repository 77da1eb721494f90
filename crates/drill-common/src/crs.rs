//! Coordinate Reference System identifiers.
//!
//! Rasters and query geometries name their CRS with an EPSG code, an OGC URN/URL
//! or a PROJ-style definition string. All of them are parsed into [`Crs`], which
//! carries the projection parameters needed by the `projection` crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sphere radius used when a definition does not give one (meters).
pub const DEFAULT_EARTH_RADIUS: f64 = 6371229.0;

/// Radius of the Web Mercator sphere (meters).
pub const WEB_MERCATOR_RADIUS: f64 = 6378137.0;

/// A supported coordinate reference system.
///
/// Equality is structural: two definitions are the same CRS only if every
/// parameter matches exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "proj", rename_all = "snake_case")]
pub enum Crs {
    /// WGS84 geographic, x = longitude, y = latitude (degrees).
    Geographic,
    /// Spherical Web Mercator (EPSG:3857), meters.
    WebMercator,
    /// Spherical Lambert Conformal Conic, meters.
    LambertConformal(LambertParams),
    /// Spherical polar stereographic, meters.
    PolarStereographic(StereographicParams),
}

/// Lambert Conformal Conic parameters (degrees, meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LambertParams {
    pub lat_1: f64,
    pub lat_2: f64,
    pub lat_0: f64,
    pub lon_0: f64,
    pub x_0: f64,
    pub y_0: f64,
    pub radius: f64,
}

/// Polar stereographic parameters (degrees, meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StereographicParams {
    /// Either 90 (north polar) or -90 (south polar).
    pub lat_0: f64,
    /// Latitude of true scale.
    pub lat_ts: f64,
    pub lon_0: f64,
    pub x_0: f64,
    pub y_0: f64,
    pub radius: f64,
}

impl Crs {
    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326", "CRS:84", "OGC:CRS84"
    /// - "urn:ogc:def:crs:EPSG::3857", "urn:ogc:def:crs:OGC:1.3:CRS84"
    /// - "http://www.opengis.net/def/crs/EPSG/0/4326"
    /// - "+proj=lcc +lat_1=49 +lat_2=77 +lon_0=-95"
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CrsParseError::Empty);
        }
        if trimmed.starts_with('+') {
            return Self::from_proj_string(trimmed);
        }

        let normalized = trimmed.to_lowercase();
        let code = if let Some(rest) = normalized.strip_prefix("urn:ogc:def:crs:") {
            // urn:ogc:def:crs:{authority}:{version}:{code}
            let mut parts = rest.split(':');
            let authority = parts.next().unwrap_or_default();
            let code = parts.last().unwrap_or_default();
            format!("{}:{}", authority, code)
        } else if let Some(idx) = normalized.find("/def/crs/") {
            // http(s)://www.opengis.net/def/crs/{authority}/{version}/{code}
            let rest = &normalized[idx + "/def/crs/".len()..];
            let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
            match (parts.first(), parts.last()) {
                (Some(authority), Some(code)) if parts.len() >= 2 => {
                    format!("{}:{}", authority, code)
                }
                _ => return Err(CrsParseError::Unsupported(s.to_string())),
            }
        } else {
            normalized
        };

        match code.as_str() {
            "epsg:4326" | "epsg:4269" | "crs:84" | "ogc:crs84" => Ok(Crs::Geographic),
            "epsg:3857" | "epsg:900913" | "epsg:3785" => Ok(Crs::WebMercator),
            _ => Err(CrsParseError::Unsupported(s.to_string())),
        }
    }

    /// Parse a PROJ-style `+key=value` definition.
    fn from_proj_string(s: &str) -> Result<Self, CrsParseError> {
        let mut proj: Option<String> = None;
        let mut params = std::collections::HashMap::new();

        for token in s.split_whitespace() {
            let token = token.trim_start_matches('+');
            match token.split_once('=') {
                Some(("proj", value)) => proj = Some(value.to_lowercase()),
                Some((key, value)) => {
                    params.insert(key.to_lowercase(), value.to_string());
                }
                None => {
                    params.insert(token.to_lowercase(), String::new());
                }
            }
        }

        let number = |key: &str| -> Result<Option<f64>, CrsParseError> {
            match params.get(key) {
                None => Ok(None),
                Some(raw) => raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Some)
                    .ok_or_else(|| CrsParseError::InvalidParameter {
                        name: key.to_string(),
                        value: raw.clone(),
                    }),
            }
        };

        let radius = match (number("r")?, number("a")?, number("b")?) {
            (Some(r), _, _) => r,
            (None, Some(a), None) => a,
            (None, Some(a), Some(b)) if a == b => a,
            (None, Some(_), Some(_)) => {
                return Err(CrsParseError::Unsupported(format!(
                    "{} (only spherical earth models are supported)",
                    s
                )))
            }
            _ => DEFAULT_EARTH_RADIUS,
        };

        match proj.as_deref() {
            Some("longlat") | Some("latlong") | Some("lonlat") | Some("latlon") => {
                Ok(Crs::Geographic)
            }
            Some("merc") => Ok(Crs::WebMercator),
            Some("lcc") => {
                let lat_1 = number("lat_1")?.ok_or_else(|| CrsParseError::MissingParameter {
                    name: "lat_1".to_string(),
                })?;
                let lat_2 = number("lat_2")?.unwrap_or(lat_1);
                Ok(Crs::LambertConformal(LambertParams {
                    lat_1,
                    lat_2,
                    lat_0: number("lat_0")?.unwrap_or(lat_1),
                    lon_0: number("lon_0")?.unwrap_or(0.0),
                    x_0: number("x_0")?.unwrap_or(0.0),
                    y_0: number("y_0")?.unwrap_or(0.0),
                    radius,
                }))
            }
            Some("stere") | Some("sterea") | Some("ups") => {
                let lat_0 = number("lat_0")?.unwrap_or(90.0);
                if lat_0.abs() != 90.0 {
                    return Err(CrsParseError::Unsupported(format!(
                        "{} (only polar stereographic is supported)",
                        s
                    )));
                }
                Ok(Crs::PolarStereographic(StereographicParams {
                    lat_0,
                    lat_ts: number("lat_ts")?.unwrap_or(lat_0),
                    lon_0: number("lon_0")?.unwrap_or(0.0),
                    x_0: number("x_0")?.unwrap_or(0.0),
                    y_0: number("y_0")?.unwrap_or(0.0),
                    radius,
                }))
            }
            Some(other) => Err(CrsParseError::Unsupported(format!("+proj={}", other))),
            None => Err(CrsParseError::MissingParameter {
                name: "proj".to_string(),
            }),
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Geographic)
    }

    /// Stable textual key, used to cache per-CRS work.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::Geographic
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Geographic => write!(f, "EPSG:4326"),
            Crs::WebMercator => write!(f, "EPSG:3857"),
            Crs::LambertConformal(p) => write!(
                f,
                "+proj=lcc +lat_1={} +lat_2={} +lat_0={} +lon_0={} +x_0={} +y_0={} +R={}",
                p.lat_1, p.lat_2, p.lat_0, p.lon_0, p.x_0, p.y_0, p.radius
            ),
            Crs::PolarStereographic(p) => write!(
                f,
                "+proj=stere +lat_0={} +lat_ts={} +lon_0={} +x_0={} +y_0={} +R={}",
                p.lat_0, p.lat_ts, p.lon_0, p.x_0, p.y_0, p.radius
            ),
        }
    }
}

impl std::str::FromStr for Crs {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Crs::parse(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Empty CRS identifier")]
    Empty,

    #[error("Unsupported CRS: {0}")]
    Unsupported(String),

    #[error("Missing CRS parameter: {name}")]
    MissingParameter { name: String },

    #[error("Invalid value for CRS parameter '{name}': {value}")]
    InvalidParameter { name: String, value: String },
}
