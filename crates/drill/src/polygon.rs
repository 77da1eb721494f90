//! Polygon rings and zonal statistics.

use drill_common::BoundingBox;
use serde::Serialize;

use crate::geometry::Coord;

/// A polygon: one closed exterior ring plus zero or more closed holes.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonRings {
    pub exterior: Vec<Coord>,
    pub holes: Vec<Vec<Coord>>,
}

impl PolygonRings {
    pub fn new(exterior: Vec<Coord>) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    /// Whether `(x, y)` is inside the exterior ring and outside every hole.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        ring_contains(&self.exterior, x, y) && !self.holes.iter().any(|h| ring_contains(h, x, y))
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.exterior.iter().copied())
    }

    /// Area-weighted centroid of the exterior ring.
    ///
    /// Degenerate (zero-area) rings fall back to the mean of their distinct vertices.
    pub fn centroid(&self) -> Option<Coord> {
        let ring = &self.exterior;
        if ring.is_empty() {
            return None;
        }

        let mut area2 = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for pair in ring.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            let cross = x0 * y1 - x1 * y0;
            area2 += cross;
            cx += (x0 + x1) * cross;
            cy += (y0 + y1) * cross;
        }

        if area2.abs() > f64::EPSILON {
            return Some((cx / (3.0 * area2), cy / (3.0 * area2)));
        }

        let distinct = if ring.len() > 1 && ring.first() == ring.last() {
            &ring[..ring.len() - 1]
        } else {
            &ring[..]
        };
        let n = distinct.len() as f64;
        let (sx, sy) = distinct
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
        Some((sx / n, sy / n))
    }
}

/// Even-odd ray casting. The ring may be open or closed.
fn ring_contains(ring: &[Coord], x: f64, y: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Min / mean / max over the valid cells of a polygon mask.
///
/// All three are `None` when no valid cell was found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZonalStats {
    pub min: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub count: usize,
}

impl ZonalStats {
    pub fn empty() -> Self {
        Self {
            min: None,
            mean: None,
            max: None,
            count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Statistics over every value yielded by `values`.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut acc = StatsAccumulator::default();
        for v in values {
            acc.push(v);
        }
        acc.finish()
    }
}

/// Running f64 accumulator behind [`ZonalStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsAccumulator {
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

impl StatsAccumulator {
    pub(crate) fn push(&mut self, v: f64) {
        if self.count == 0 {
            self.min = v;
            self.max = v;
        } else {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
        self.sum += v;
        self.count += 1;
    }

    pub(crate) fn finish(self) -> ZonalStats {
        if self.count == 0 {
            return ZonalStats::empty();
        }
        // Summation rounding can leave the mean a few ulps outside the range.
        let mean = (self.sum / self.count as f64).clamp(self.min, self.max);
        ZonalStats {
            min: Some(self.min),
            mean: Some(mean),
            max: Some(self.max),
            count: self.count,
        }
    }
}
