//! GDAL-style affine geotransforms mapping pixel space to CRS coordinates.

use serde::{Deserialize, Serialize};

/// A six-coefficient affine transform in GDAL order.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// `(col, row) = (0, 0)` is the outer top-left corner of the first pixel, so the
/// centre of pixel `(c, r)` sits at `(c + 0.5, r + 0.5)` in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl AffineTransform {
    /// North-up transform without rotation terms.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height,
        }
    }

    /// Build from the `[c, a, b, f, d, e]` array used by GDAL.
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            row_rotation: gt[2],
            origin_y: gt[3],
            col_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// A transform is usable only if it is finite and invertible.
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        self.to_gdal().iter().all(|v| v.is_finite()) && det.is_finite() && det != 0.0
    }

    /// Pixel space to CRS coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// CRS coordinates to fractional pixel space, `None` if not invertible.
    pub fn to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        Some((col, row))
    }

    /// Index of the pixel covering `(x, y)`, using floor of the pixel-space
    /// coordinate. A point on a shared edge belongs to the pixel to its right/below.
    pub fn pixel_index(&self, x: f64, y: f64) -> Option<(i64, i64)> {
        let (col, row) = self.to_pixel(x, y)?;
        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        Some((col.floor() as i64, row.floor() as i64))
    }

    /// CRS coordinates of the centre of pixel `(col, row)`.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Transform of a window whose top-left pixel is `(col_off, row_off)`.
    pub fn offset(&self, col_off: usize, row_off: usize) -> Self {
        let (origin_x, origin_y) = self.apply(col_off as f64, row_off as f64);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }
}
