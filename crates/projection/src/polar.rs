//! Spherical polar stereographic projection (north or south pole aspect).

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use drill_common::StereographicParams;

use crate::{wrap_degrees, wrap_radians, Projection};

#[derive(Debug, Clone)]
pub struct PolarStereographic {
    north: bool,
    lon0: f64,
    x0: f64,
    y0: f64,
    /// 2 * R * k0, where k0 gives true scale at lat_ts
    scale: f64,
}

impl PolarStereographic {
    pub fn new(params: &StereographicParams) -> Self {
        let k0 = (1.0 + params.lat_ts.to_radians().abs().sin()) / 2.0;
        Self {
            north: params.lat_0 >= 0.0,
            lon0: params.lon_0.to_radians(),
            x0: params.x_0,
            y0: params.y_0,
            scale: 2.0 * params.radius * k0,
        }
    }
}

impl Projection for PolarStereographic {
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lat = lat.to_radians();
        let dlon = wrap_radians(lon.to_radians() - self.lon0);

        if self.north {
            let rho = self.scale * (FRAC_PI_4 - lat / 2.0).tan();
            (self.x0 + rho * dlon.sin(), self.y0 - rho * dlon.cos())
        } else {
            let rho = self.scale * (FRAC_PI_4 + lat / 2.0).tan();
            (self.x0 + rho * dlon.sin(), self.y0 + rho * dlon.cos())
        }
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let x = x - self.x0;
        let y = y - self.y0;
        let rho = (x * x + y * y).sqrt();
        let c = 2.0 * (rho / self.scale).atan();

        if self.north {
            let lat = FRAC_PI_2 - c;
            let lon = self.lon0 + x.atan2(-y);
            (wrap_degrees(lon.to_degrees()), lat.to_degrees())
        } else {
            let lat = c - FRAC_PI_2;
            let lon = self.lon0 + x.atan2(y);
            (wrap_degrees(lon.to_degrees()), lat.to_degrees())
        }
    }
}
