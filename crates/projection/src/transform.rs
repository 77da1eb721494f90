//! Transformation between any two supported CRSs.

use drill_common::Crs;
use thiserror::Error;

use crate::{wrap_degrees, LambertConformal, PolarStereographic, Projection, WebMercator};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProjectionError {
    #[error("Coordinate ({x}, {y}) is not finite")]
    NonFinite { x: f64, y: f64 },

    #[error("Coordinate ({x}, {y}) is outside the domain of {crs}")]
    OutOfDomain { x: f64, y: f64, crs: String },
}

/// One side of a transformation, resolved to its projection.
enum Side {
    Geographic,
    Projected(Box<dyn Projection>),
}

impl Side {
    fn for_crs(crs: &Crs) -> Self {
        match crs {
            Crs::Geographic => Side::Geographic,
            Crs::WebMercator => Side::Projected(Box::new(WebMercator::new())),
            Crs::LambertConformal(p) => Side::Projected(Box::new(LambertConformal::new(p))),
            Crs::PolarStereographic(p) => Side::Projected(Box::new(PolarStereographic::new(p))),
        }
    }
}

/// Converts coordinates from a source CRS into a target CRS.
///
/// Construction resolves both projections once, so a transformer can be
/// reused for every vertex of a geometry.
pub struct Transformer {
    source: Side,
    target: Side,
    target_name: String,
    identity: bool,
}

impl Transformer {
    pub fn new(source: &Crs, target: &Crs) -> Self {
        Self {
            identity: source == target,
            source: Side::for_crs(source),
            target: Side::for_crs(target),
            target_name: target.to_string(),
        }
    }

    /// True when source and target are the same CRS and no math is done.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Transform one (x, y) pair.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::NonFinite { x, y });
        }
        if self.identity {
            return Ok((x, y));
        }

        let (lon, lat) = match &self.source {
            Side::Geographic => (x, y),
            Side::Projected(p) => p.inverse(x, y),
        };
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
            return Err(ProjectionError::OutOfDomain {
                x,
                y,
                crs: self.target_name.clone(),
            });
        }

        let (tx, ty) = match &self.target {
            Side::Geographic => (wrap_degrees(lon), lat),
            Side::Projected(p) => p.forward(lon, lat),
        };
        if !tx.is_finite() || !ty.is_finite() {
            return Err(ProjectionError::OutOfDomain {
                x,
                y,
                crs: self.target_name.clone(),
            });
        }
        Ok((tx, ty))
    }

    /// Transform a sequence of points, failing on the first bad one.
    pub fn transform_all(&self, points: &[(f64, f64)]) -> Result<Vec<(f64, f64)>, ProjectionError> {
        if self.identity {
            return points
                .iter()
                .map(|&(x, y)| {
                    if x.is_finite() && y.is_finite() {
                        Ok((x, y))
                    } else {
                        Err(ProjectionError::NonFinite { x, y })
                    }
                })
                .collect();
        }
        points.iter().map(|&(x, y)| self.transform(x, y)).collect()
    }
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("target", &self.target_name)
            .field("identity", &self.identity)
            .finish()
    }
}
