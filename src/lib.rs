#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod cache;
pub mod lens;
pub mod mesh;
pub mod shape;

// Shared angle helpers; public for callers converting lookup output back
// into azimuths, but considered unstable internals.
pub mod angle;

// --- High-level re-exports -------------------------------------------------

// Main entry points: the mesh, its builder options, and the cache.
pub use crate::cache::MeshCache;
pub use crate::mesh::{Mesh, MeshError, MeshOptions, Node, Row};

// Geometry inputs.
pub use crate::lens::{Lens, LensError, Projection};
pub use crate::shape::{Circle, Shape, ShapeError, Sphere};

// Recoverable per-row lookup failure, for callers that drive the frustum
// primitives directly instead of `Mesh::lookup`.
pub use crate::mesh::FrustumRowError;

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use visual_mesh::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let shape = Sphere::new(0.075)?;
/// let mesh = Mesh::generate(&shape, 1.2, &MeshOptions::default())?;
/// println!("rows={} nodes={}", mesh.rows().len(), mesh.nodes().len());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::cache::MeshCache;
    pub use crate::lens::{Lens, Projection};
    pub use crate::mesh::{Mesh, MeshOptions};
    pub use crate::shape::{Circle, Shape, Sphere};
}
