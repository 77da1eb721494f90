//! Lambert Conformal Conic projection.
//!
//! This projection is commonly used for regional weather models.
//! It maps a cone tangent or secant to the Earth's surface onto a flat plane.
//!
//! The projection parameters include:
//! - Latitude of origin (lat_0) and central meridian (lon_0)
//! - Standard parallel(s): lat_1 and lat_2 (equal for a tangent cone)
//! - False easting/northing (x_0, y_0) in meters

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use drill_common::LambertParams;

use crate::{wrap_degrees, wrap_radians, Projection};

/// Spherical Lambert Conformal Conic projection.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Central meridian in radians
    lon0: f64,
    x0: f64,
    y0: f64,
    earth_radius: f64,
    /// Cone constant (n)
    n: f64,
    /// F constant
    f: f64,
    /// Rho at the latitude of origin
    rho0: f64,
}

impl LambertConformal {
    pub fn new(params: &LambertParams) -> Self {
        let latin1 = params.lat_1.to_radians();
        let latin2 = params.lat_2.to_radians();
        let lat0 = params.lat_0.to_radians();

        // Compute cone constant n
        let n = if (latin1 - latin2).abs() < 1e-10 {
            // Tangent cone (single standard parallel)
            latin1.sin()
        } else {
            // Secant cone (two standard parallels)
            let ln_ratio = (latin1.cos() / latin2.cos()).ln();
            let tan_ratio =
                ((FRAC_PI_4 + latin2 / 2.0).tan() / (FRAC_PI_4 + latin1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };

        let f = (latin1.cos() * (FRAC_PI_4 + latin1 / 2.0).tan().powf(n)) / n;
        let rho0 = params.radius * f / (FRAC_PI_4 + lat0 / 2.0).tan().powf(n);

        Self {
            lon0: params.lon_0.to_radians(),
            x0: params.x_0,
            y0: params.y_0,
            earth_radius: params.radius,
            n,
            f,
            rho0,
        }
    }

    /// Cone constant, negative for a cone opening towards the south pole.
    pub fn cone_constant(&self) -> f64 {
        self.n
    }
}

impl Projection for LambertConformal {
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lat = lat.to_radians();
        let dlon = wrap_radians(lon.to_radians() - self.lon0);

        // The pole opposite the cone apex projects to infinity
        let rho = self.earth_radius * self.f / (FRAC_PI_4 + lat / 2.0).tan().powf(self.n);
        let theta = self.n * dlon;

        let x = rho * theta.sin();
        let y = self.rho0 - rho * theta.cos();

        (x + self.x0, y + self.y0)
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let x = x - self.x0;
        let dy = self.rho0 - (y - self.y0);
        let sign = self.n.signum();

        let rho = sign * (x * x + dy * dy).sqrt();
        let theta = (sign * x).atan2(sign * dy);

        let lat = if rho == 0.0 {
            sign * FRAC_PI_2
        } else {
            2.0 * (self.earth_radius * self.f / rho).powf(1.0 / self.n).atan() - FRAC_PI_2
        };
        let lon = self.lon0 + theta / self.n;

        (wrap_degrees(lon.to_degrees()), lat.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> LambertParams {
        LambertParams {
            lat_1: 49.0,
            lat_2: 77.0,
            lat_0: 49.0,
            lon_0: -95.0,
            x_0: 0.0,
            y_0: 0.0,
            radius: drill_common::DEFAULT_EARTH_RADIUS,
        }
    }

    #[test]
    fn test_origin_maps_to_false_origin() {
        let proj = LambertConformal::new(&LambertParams {
            x_0: 1000.0,
            y_0: -500.0,
            ..params()
        });
        let (x, y) = proj.forward(-95.0, 49.0);
        assert!((x - 1000.0).abs() < 1e-6, "x = {}", x);
        assert!((y + 500.0).abs() < 1e-6, "y = {}", y);
    }

    #[test]
    fn test_roundtrip() {
        let proj = LambertConformal::new(&params());
        for (lon, lat) in [(-75.7, 45.4), (-123.1, 49.3), (-63.6, 44.6), (-114.4, 62.4)] {
            let (x, y) = proj.forward(lon, lat);
            let (lon2, lat2) = proj.inverse(x, y);
            assert!((lon - lon2).abs() < 1e-9, "lon {} vs {}", lon, lon2);
            assert!((lat - lat2).abs() < 1e-9, "lat {} vs {}", lat, lat2);
        }
    }

    #[test]
    fn test_tangent_cone() {
        let proj = LambertConformal::new(&LambertParams {
            lat_1: 38.5,
            lat_2: 38.5,
            lat_0: 38.5,
            lon_0: -97.5,
            ..params()
        });
        assert!((proj.cone_constant() - 38.5f64.to_radians().sin()).abs() < 1e-12);

        // East of the central meridian is positive x; north of origin is positive y
        let (x, y) = proj.forward(-90.0, 45.0);
        assert!(x > 0.0);
        assert!(y > 0.0);
    }

    #[test]
    fn test_southern_cone_roundtrip() {
        let proj = LambertConformal::new(&LambertParams {
            lat_1: -30.0,
            lat_2: -60.0,
            lat_0: -45.0,
            lon_0: 140.0,
            ..params()
        });
        assert!(proj.cone_constant() < 0.0);
        let (x, y) = proj.forward(150.0, -40.0);
        let (lon, lat) = proj.inverse(x, y);
        assert!((lon - 150.0).abs() < 1e-9);
        assert!((lat + 40.0).abs() < 1e-9);
    }
}
