//! Spherical Web Mercator (EPSG:3857).

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use drill_common::crs::WEB_MERCATOR_RADIUS;

use crate::{wrap_degrees, Projection};

/// Latitude beyond which Web Mercator is conventionally clipped.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone)]
pub struct WebMercator {
    radius: f64,
}

impl WebMercator {
    pub fn new() -> Self {
        Self {
            radius: WEB_MERCATOR_RADIUS,
        }
    }
}

impl Default for WebMercator {
    fn default() -> Self {
        Self::new()
    }
}

impl Projection for WebMercator {
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = self.radius * lon.to_radians();
        // Poles map to +/- infinity; callers check for non-finite output
        if lat.abs() >= 90.0 {
            return (x, lat.signum() * f64::INFINITY);
        }
        let y = self.radius * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
        (x, y)
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / self.radius).to_degrees();
        let lat = 2.0 * (y / self.radius).exp().atan() - FRAC_PI_2;
        (wrap_degrees(lon), lat.to_degrees())
    }
}
