//! Geometry reprojection with a request-scoped cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use drill_common::{BoundingBox, Crs};
use projection::Transformer;
use tracing::debug;

use crate::error::{DrillError, DrillResult};
use crate::geometry::{GeometryKind, QueryGeometry};

/// A query geometry expressed in a raster's CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectedGeometry {
    pub kind: GeometryKind,
    pub crs: Crs,
    pub bbox: BoundingBox,
}

/// Reprojects one query geometry, computing each target CRS at most once.
///
/// Shared between the workers of a single request.
#[derive(Debug)]
pub struct GeometryNormalizer {
    geometry: QueryGeometry,
    cache: Mutex<HashMap<String, Arc<ReprojectedGeometry>>>,
}

impl GeometryNormalizer {
    pub fn new(geometry: QueryGeometry) -> Self {
        Self {
            geometry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn geometry(&self) -> &QueryGeometry {
        &self.geometry
    }

    /// The geometry in `target`.
    ///
    /// Fails with `InvalidGeometry` if any vertex leaves the target's domain or
    /// transforms to a non-finite coordinate.
    pub fn reproject(&self, target: &Crs) -> DrillResult<Arc<ReprojectedGeometry>> {
        let key = target.cache_key();
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(&key) {
                return Ok(Arc::clone(hit));
            }
        }

        let computed = Arc::new(self.compute(target)?);

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        // A concurrent worker may have inserted first; either copy is identical.
        let entry = cache.entry(key).or_insert(computed);
        Ok(Arc::clone(entry))
    }

    /// Number of distinct target CRSs computed so far.
    pub fn cached_targets(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn compute(&self, target: &Crs) -> DrillResult<ReprojectedGeometry> {
        let transformer = Transformer::new(&self.geometry.crs, target);
        debug!(
            source = %self.geometry.crs,
            target = %target,
            identity = transformer.is_identity(),
            "Reprojecting query geometry"
        );

        let kind = if transformer.is_identity() {
            self.geometry.kind.clone()
        } else {
            self.geometry
                .kind
                .try_map(|(x, y)| transformer.transform(x, y))
                .map_err(|e| DrillError::InvalidGeometry(format!("reprojection failed: {}", e)))?
        };

        let bbox = kind
            .bbox()
            .ok_or_else(|| DrillError::InvalidGeometry("geometry has no coordinates".to_string()))?;

        Ok(ReprojectedGeometry {
            kind,
            crs: target.clone(),
            bbox,
        })
    }
}
