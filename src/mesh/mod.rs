//! The visual mesh: node table, phi rows, builder and frustum lookup.
//!
//! Overview
//! - A mesh is generated once per (shape, camera height) pair: phi rows are
//!   sampled so one object spans a constant number of rows, each row is
//!   sampled uniformly in azimuth, and every node is wired to its six
//!   hexagonal neighbours with wrap-safe relative offsets.
//! - At runtime, [`Mesh::lookup`] intersects each row's viewing cone with
//!   the camera frustum and returns half-open node index ranges, ready for
//!   per-sample projection by an external engine.
//!
//! Modules
//! - `builder` – phi sampling, ray generation and neighbour stitching.
//! - `frustum` – per-lens theta limits and range conversion.
//!
//! Key ideas
//! - Neighbour offsets are stored relative to the owning node, keeping the
//!   node table position-independent for device upload.
//! - Rows partition the node table in ascending phi; a row is entirely
//!   above or entirely below the horizon.

mod builder;
mod frustum;

pub use frustum::{EquirectangularFrustum, FrustumRowError, RadialFrustum};

use serde::{Deserialize, Serialize};

/// Neighbour slots of a node, in storage order.
pub mod neighbour {
    pub const TOP_LEFT: usize = 0;
    pub const TOP_RIGHT: usize = 1;
    pub const LEFT: usize = 2;
    pub const RIGHT: usize = 3;
    pub const BOTTOM_LEFT: usize = 4;
    pub const BOTTOM_RIGHT: usize = 5;
}

/// One mesh sample: a unit ray and six signed offsets to its neighbours.
///
/// The ray points from the observation-plane origin through the sample and
/// carries a fourth padding component so the record stays 16-byte aligned
/// for device upload. Offsets are relative to the node's own index.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Node {
    pub ray: [f32; 4],
    pub neighbours: [i32; 6],
}

impl Node {
    /// Absolute index of the neighbour in the given slot, for a node
    /// stored at `own`.
    #[inline]
    pub fn neighbour_index(&self, own: usize, slot: usize) -> usize {
        (own as isize + self.neighbours[slot] as isize) as usize
    }
}

/// Contiguous run of nodes sharing one polar angle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Row {
    /// Polar angle from straight down shared by every node in the row.
    pub phi: f32,
    /// Index of the first node of the row in the node table.
    pub begin: usize,
    /// One past the last node of the row.
    pub end: usize,
}

impl Row {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// A generated visual mesh for one camera height.
///
/// Immutable after construction; lookups may run concurrently against a
/// shared reference.
#[derive(Clone, Debug)]
pub struct Mesh {
    nodes: Vec<Node>,
    rows: Vec<Row>,
    height: f32,
    intersections: f32,
    max_distance: f32,
}

impl Mesh {
    /// The node table, row-major in ascending phi.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Phi rows partitioning the node table, ascending in phi.
    #[inline]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Camera height this mesh was generated for.
    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Designed intersection count per object.
    #[inline]
    pub fn intersections(&self) -> f32 {
        self.intersections
    }

    /// Ground-distance cap the sampling was generated with.
    #[inline]
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }
}

/// Options controlling mesh generation.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    /// Target number of mesh samples across one object in any direction.
    pub intersections: f32,
    /// Ground distance beyond which the plane is not sampled. Infinity
    /// extends sampling to the horizon.
    pub max_distance: f32,
    /// Smallest angular step the sampling may take, bounding both the row
    /// spacing and the per-row azimuthal spacing from below.
    pub min_angular_res: f32,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            intersections: 4.0,
            max_distance: f32::INFINITY,
            min_angular_res: 1e-3,
        }
    }
}

/// Reasons why a mesh cannot be generated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MeshError {
    InvalidHeight { height: f32 },
    InvalidIntersections { intersections: f32 },
    InvalidMaxDistance { max_distance: f32 },
    InvalidAngularResolution { min_angular_res: f32 },
}

impl std::fmt::Display for MeshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshError::InvalidHeight { height } => {
                write!(f, "camera height must be positive and finite, got {height}")
            }
            MeshError::InvalidIntersections { intersections } => {
                write!(f, "intersection count must be positive and finite, got {intersections}")
            }
            MeshError::InvalidMaxDistance { max_distance } => {
                write!(f, "max distance must be positive, got {max_distance}")
            }
            MeshError::InvalidAngularResolution { min_angular_res } => write!(
                f,
                "minimum angular resolution must be positive and finite, got {min_angular_res}"
            ),
        }
    }
}

impl std::error::Error for MeshError {}

/// Signed offset from one absolute node index to another.
#[inline]
pub(crate) fn offset_between(from: usize, to: usize) -> i32 {
    (to as isize - from as isize) as i32
}
