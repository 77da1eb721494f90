//! Coordinate reference system transformations.
//!
//! Implements map projections from scratch without external dependencies.
//! Every projection maps geographic longitude/latitude in degrees to projected
//! coordinates in meters and back; [`Transformer`] chains two of them to go
//! from any supported CRS to any other.

pub mod lambert;
pub mod mercator;
pub mod polar;
pub mod transform;

pub use lambert::LambertConformal;
pub use mercator::WebMercator;
pub use polar::PolarStereographic;
pub use transform::{ProjectionError, Transformer};

/// A forward/inverse map projection on the sphere.
pub trait Projection: Send + Sync {
    /// Geographic (lon, lat) in degrees to projected (x, y).
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64);

    /// Projected (x, y) to geographic (lon, lat) in degrees.
    fn inverse(&self, x: f64, y: f64) -> (f64, f64);
}

/// Wrap a longitude difference (radians) into [-π, π].
pub(crate) fn wrap_radians(mut dlon: f64) -> f64 {
    use std::f64::consts::PI;
    if !dlon.is_finite() {
        return dlon;
    }
    while dlon > PI {
        dlon -= 2.0 * PI;
    }
    while dlon < -PI {
        dlon += 2.0 * PI;
    }
    dlon
}

/// Wrap a longitude (degrees) into [-180, 180].
pub(crate) fn wrap_degrees(lon: f64) -> f64 {
    wrap_radians(lon.to_radians()).to_degrees()
}
