//! Bounded, most-recently-used cache of generated meshes.
//!
//! Meshes are expensive to build and read-only afterwards, so the cache
//! hands out shared handles and reuses a mesh whenever the intersection
//! count it would deliver at the requested height is within tolerance.
//! Construction runs outside the lock: a slow build must not serialise
//! every other caller, at the cost of an occasional duplicate build that
//! the second scan resolves.

use crate::mesh::{Mesh, MeshError, MeshOptions};
use crate::shape::Shape;
use log::debug;
use std::sync::{Arc, Mutex};

/// Default lower bound on the angular sampling resolution of built meshes.
pub const DEFAULT_MIN_ANGULAR_RES: f32 = 1e-3;

/// A bounded cache of meshes, most recently used first.
///
/// Eviction drops the cache's handle only; handles already returned stay
/// valid for as long as the caller keeps them.
pub struct MeshCache {
    min_angular_res: f32,
    entries: Mutex<Vec<Arc<Mesh>>>,
}

impl Default for MeshCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshCache {
    pub fn new() -> Self {
        Self {
            min_angular_res: DEFAULT_MIN_ANGULAR_RES,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Overrides the angular resolution floor used for meshes built by
    /// this cache.
    pub fn with_min_angular_res(mut self, min_angular_res: f32) -> Self {
        self.min_angular_res = min_angular_res;
        self
    }

    /// Returns a mesh for `shape` at `height` whose intersection-count
    /// drift stays within `tolerance`, building one if no cached mesh
    /// qualifies.
    ///
    /// A cached mesh built for height `h` delivers
    /// `intersections · shape.k(h, height)` intersections at the
    /// requested height; the absolute drift from `intersections` is the
    /// reuse error. Only meshes generated with the same `max_distance`
    /// are considered. After a build the cache is scanned again before
    /// inserting, so concurrent callers converge on a single mesh.
    ///
    /// The cache is trimmed to `capacity` entries from the least recently
    /// used end; a capacity of zero disables insertion entirely.
    pub fn get_or_build<S: Shape>(
        &self,
        shape: &S,
        height: f32,
        intersections: f32,
        tolerance: f32,
        capacity: usize,
        max_distance: f32,
    ) -> Result<Arc<Mesh>, MeshError> {
        {
            let mut entries = self.lock();
            if let Some(mesh) = promote(&mut entries, shape, height, intersections, tolerance, max_distance) {
                debug!("mesh cache hit: height={height}");
                return Ok(mesh);
            }
        }

        // Build without holding the lock; other callers may race us here.
        let options = MeshOptions {
            intersections,
            max_distance,
            min_angular_res: self.min_angular_res,
        };
        let built = Arc::new(Mesh::generate(shape, height, &options)?);

        let mut entries = self.lock();
        // Another thread may have finished an equivalent build while ours
        // ran; prefer the cached one so callers share a single mesh.
        if let Some(mesh) = promote(&mut entries, shape, height, intersections, tolerance, max_distance) {
            debug!("mesh cache hit after concurrent build: height={height}");
            return Ok(mesh);
        }

        if capacity > 0 {
            while entries.len() >= capacity {
                entries.pop();
            }
            entries.insert(0, Arc::clone(&built));
            debug!(
                "mesh cache insert: height={height} k={intersections} nodes={}",
                built.nodes().len()
            );
        }
        Ok(built)
    }

    /// Number of cached meshes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the cached handles, most recently used first.
    pub fn snapshot(&self) -> Vec<Arc<Mesh>> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<Mesh>>> {
        // A poisoning panic cannot leave the entry list half-updated, so
        // the cache keeps serving.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Scans for the closest qualifying entry and promotes it to the front.
fn promote<S: Shape>(
    entries: &mut Vec<Arc<Mesh>>,
    shape: &S,
    height: f32,
    intersections: f32,
    tolerance: f32,
    max_distance: f32,
) -> Option<Arc<Mesh>> {
    let best = entries
        .iter()
        .enumerate()
        .filter(|(_, mesh)| mesh.max_distance() == max_distance)
        .map(|(index, mesh)| {
            let drift = intersections - intersections * shape.k(mesh.height(), height);
            (index, drift.abs())
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    if best.1 <= tolerance {
        let mesh = entries.remove(best.0);
        entries.insert(0, Arc::clone(&mesh));
        Some(mesh)
    } else {
        None
    }
}
