//! Frustum lookup: which mesh nodes can the camera currently see.
//!
//! Every mesh row is a circle of constant polar angle on the viewing
//! sphere, i.e. a cone about the down axis. Intersecting that cone with
//! the frustum boundary yields the azimuth intervals of the row that are
//! visible, which convert directly to node index ranges.
//!
//! For an equirectangular lens the frustum is a rectangular pyramid and
//! the boundary is four corner-to-corner segments; the cone/segment
//! intersection reduces to one quadratic per edge whose coefficients are
//! linear in `tan²(phi)`, so the pose-dependent parts are computed once
//! per lookup. For a radial lens the frustum is a cone about the principal
//! axis and the intersection has a closed form after rotating the axis
//! into the x/z plane.

use super::{Mesh, Row};
use crate::angle::normalize_two_pi;
use crate::lens::{Lens, LensError, Projection};
use log::warn;
use nalgebra::{Matrix3, Matrix4, Vector3};
use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::ops::Range;

const EPS: f32 = 1e-6;

/// A row whose frustum crossings cannot be paired into intervals.
///
/// An odd crossing count means the cone/edge solutions are geometrically
/// inconsistent (a grazing contact split by rounding, typically).
/// [`Mesh::lookup`] skips such rows; callers driving
/// [`EquirectangularFrustum::theta_limits`] directly may choose otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct FrustumRowError {
    /// Polar angle of the offending row.
    pub phi: f32,
    /// The unpaired crossing azimuths, sorted ascending.
    pub crossings: Vec<f32>,
}

impl std::fmt::Display for FrustumRowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "odd number of frustum crossings ({}) for row at phi {}",
            self.crossings.len(),
            self.phi
        )
    }
}

impl std::error::Error for FrustumRowError {}

/// Pose-dependent invariants of a rectangular-pyramid frustum.
pub struct EquirectangularFrustum {
    /// Corner rays in the observation frame, clockwise about the axis.
    corners: [Vector3<f32>; 4],
    /// Corner-to-corner edge vectors; their length parametrises each edge
    /// so solutions are valid exactly for `t` in [0, 1].
    edge_dirs: [Vector3<f32>; 4],
    /// Inward normals of the four frustum faces.
    normals: [Vector3<f32>; 4],
    /// Per-edge quadratic coefficients, each pair contracted against
    /// `tan²(phi)`: numerator, discriminant and denominator parts.
    eq: [[f32; 6]; 4],
    /// Principal axis in the observation frame.
    cam: Vector3<f32>,
}

impl EquirectangularFrustum {
    pub fn new(roc: &Matrix3<f32>, fov: [f32; 2]) -> Self {
        let cam = roc.column(0).into_owned();
        let y_extent = (0.5 * fov[0]).tan();
        let z_extent = (0.5 * fov[1]).tan();

        // Corners at unit focal length in the camera frame, rotated out.
        let corners = [
            Vector3::new(1.0, y_extent, z_extent),
            Vector3::new(1.0, -y_extent, z_extent),
            Vector3::new(1.0, -y_extent, -z_extent),
            Vector3::new(1.0, y_extent, -z_extent),
        ]
        .map(|corner| roc * corner);

        // Corner-to-corner directions are axis-aligned in the camera
        // frame, so they are scaled columns of the rotation.
        let ey = roc.column(1).into_owned();
        let ez = roc.column(2).into_owned();
        let edge_dirs = [
            -ey * (2.0 * y_extent),
            -ez * (2.0 * z_extent),
            ey * (2.0 * y_extent),
            ez * (2.0 * z_extent),
        ];

        let normals = [
            corners[0].cross(&corners[1]),
            corners[1].cross(&corners[2]),
            corners[2].cross(&corners[3]),
            corners[3].cross(&corners[0]),
        ];

        // A point o + t·d lies on the cone x² + y² = tan²(phi)·z². With
        // c² = tan²(phi) the solutions are
        //   t = (c²·eq[0] + eq[1] ± sqrt(c²·eq[2] + eq[3])) / (c²·eq[4] + eq[5])
        // and only the six contractions below depend on the pose.
        let mut eq = [[0.0f32; 6]; 4];
        for i in 0..4 {
            let o = corners[i];
            let d = edge_dirs[i];
            eq[i][0] = d.z * o.z;
            eq[i][1] = -d.y * o.y - d.x * o.x;
            eq[i][2] = d.x * d.x * o.z * o.z - 2.0 * d.x * d.z * o.x * o.z
                + d.y * d.y * o.z * o.z
                - 2.0 * d.y * d.z * o.y * o.z
                + d.z * d.z * o.x * o.x
                + d.z * d.z * o.y * o.y;
            eq[i][3] =
                -d.x * d.x * o.y * o.y + 2.0 * d.x * d.y * o.x * o.y - d.y * d.y * o.x * o.x;
            eq[i][4] = -d.z * d.z;
            eq[i][5] = d.x * d.x + d.y * d.y;
        }

        Self {
            corners,
            edge_dirs,
            normals,
            eq,
            cam,
        }
    }

    /// Whether a direction lies inside all four frustum faces.
    fn contains(&self, v: &Vector3<f32>) -> bool {
        self.normals.iter().all(|n| n.dot(v) >= 0.0)
    }

    /// Azimuth intervals of the circle at polar angle `phi` that lie
    /// inside the frustum.
    pub fn theta_limits(&self, phi: f32) -> Result<Vec<(f32, f32)>, FrustumRowError> {
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();
        let c2 = tan_phi * tan_phi;

        let mut crossings: Vec<f32> = Vec::new();
        let mut complex = 0;
        for i in 0..4 {
            let o = &self.corners[i];
            let d = &self.edge_dirs[i];
            let num = c2 * self.eq[i][0] + self.eq[i][1];
            let disc = c2 * self.eq[i][2] + self.eq[i][3];
            let denom = c2 * self.eq[i][4] + self.eq[i][5];

            // A non-positive discriminant means the edge misses both
            // nappes of the cone; a grazing contact is ignored too.
            if disc <= 0.0 {
                complex += 1;
            } else if denom != 0.0 {
                let root = disc.sqrt();
                for t in [(num + root) / denom, (num - root) / denom] {
                    if (0.0..=1.0).contains(&t) {
                        // Keep only the solution on the row's hemisphere;
                        // the squared cone admits its mirror image.
                        let z = o.z + d.z * t;
                        if (z > 0.0) == (phi > FRAC_PI_2) {
                            let x = o.x + d.x * t;
                            let y = o.y + d.y * t;
                            crossings.push(normalize_two_pi(y.atan2(x)));
                        }
                    }
                }
            }
        }

        // No edge touches the cone: the circle is either fully inside or
        // fully outside. Probing is only meaningful when the principal
        // axis points at the row's hemisphere.
        if complex == 4 && ((cos_phi > 0.0) == (self.cam.z < 0.0)) {
            let probe = Vector3::new(sin_phi, 0.0, -cos_phi);
            if self.contains(&probe) {
                return Ok(vec![(0.0, TAU)]);
            }
            return Ok(Vec::new());
        }

        if crossings.is_empty() {
            return Ok(Vec::new());
        }
        if crossings.len() % 2 != 0 {
            crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            return Err(FrustumRowError { phi, crossings });
        }

        crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        // Probe between the first two crossings to learn whether that gap
        // is inside the frustum; if not, the intervals pair off one
        // crossing later and the last wraps onto the first.
        let mid = 0.5 * (crossings[0] + crossings[1]);
        let probe = Vector3::new(mid.cos() * sin_phi, mid.sin() * sin_phi, -cos_phi);
        let first_is_end = !self.contains(&probe);

        let mut intervals = Vec::with_capacity(crossings.len() / 2 + 1);
        let mut i = usize::from(first_is_end);
        while i + 1 < crossings.len() {
            intervals.push((crossings[i], crossings[i + 1]));
            i += 2;
        }
        if first_is_end {
            intervals.push((*crossings.last().unwrap(), crossings[0]));
        }
        Ok(intervals)
    }
}

/// Pose-dependent invariants of a radial (conical) frustum.
pub struct RadialFrustum {
    /// Principal axis in the observation frame.
    cam: Vector3<f32>,
    half_fov: f32,
    cos_half_fov: f32,
    /// Inclination of the principal axis from straight down, the same
    /// reference as phi.
    cam_inclination: f32,
}

impl RadialFrustum {
    pub fn new(roc: &Matrix3<f32>, fov: f32) -> Self {
        let cam = roc.column(0).into_owned();
        let half_fov = 0.5 * fov;
        Self {
            cam,
            half_fov,
            cos_half_fov: half_fov.cos(),
            cam_inclination: (-cam.z).clamp(-1.0, 1.0).acos(),
        }
    }

    /// Azimuth interval of the circle at polar angle `phi` inside the view
    /// cone, `None` when the circle misses it entirely. The interval may
    /// wrap past 2π; index conversion splits it.
    pub fn theta_limits(&self, phi: f32) -> Option<(f32, f32)> {
        // Angular distance from the axis to the nearest and farthest
        // points of the circle. Both forms hold on either side of the
        // horizon and for any axis orientation.
        let nearest = (phi - self.cam_inclination).abs();
        let farthest = PI - (PI - (phi + self.cam_inclination)).abs();
        if self.half_fov >= farthest {
            return Some((0.0, TAU));
        }
        if self.half_fov < nearest {
            return None;
        }

        // Rotate the axis into the x/z plane, solve there and carry the
        // azimuth offset back. The early-outs above make a vertical axis
        // unreachable here, but rounding at the boundary still needs the
        // guard.
        let offset = self.cam.y.atan2(self.cam.x);
        let r_x = self.cam.x.hypot(self.cam.y);
        if r_x <= EPS {
            return None;
        }

        let z = -phi.cos();
        let x = (self.cos_half_fov - self.cam.z * z) / r_x;
        let y_disc = 1.0 - z * z - x * x;
        if y_disc < 0.0 {
            return None;
        }
        let y = y_disc.sqrt();

        let begin = normalize_two_pi(offset + (-y).atan2(x));
        let end = normalize_two_pi(offset + y.atan2(x));
        Some((begin, end))
    }
}

impl Mesh {
    /// Returns the half-open node index ranges whose rays lie inside the
    /// camera frustum for the given pose and lens.
    ///
    /// `hoc` transforms camera-frame vectors into the observation frame;
    /// its first rotation column is the principal axis. Rows whose
    /// frustum crossings are inconsistent are skipped with a warning. An
    /// empty result is valid.
    pub fn lookup(
        &self,
        hoc: &Matrix4<f32>,
        lens: &Lens,
    ) -> Result<Vec<Range<usize>>, LensError> {
        lens.validate()?;
        let roc: Matrix3<f32> = hoc.fixed_view::<3, 3>(0, 0).into_owned();

        let ranges = match lens.projection {
            Projection::Equirectangular { fov, .. } => {
                let frustum = EquirectangularFrustum::new(&roc, fov);
                self.collect_ranges(|phi| frustum.theta_limits(phi))
            }
            Projection::Radial { fov, .. } => {
                let frustum = RadialFrustum::new(&roc, fov);
                self.collect_ranges(|phi| Ok(frustum.theta_limits(phi).into_iter().collect()))
            }
        };
        Ok(ranges)
    }

    fn collect_ranges<F>(&self, mut theta_limits: F) -> Vec<Range<usize>>
    where
        F: FnMut(f32) -> Result<Vec<(f32, f32)>, FrustumRowError>,
    {
        let mut ranges = Vec::new();
        for row in &self.rows {
            match theta_limits(row.phi) {
                Ok(intervals) => {
                    for (begin, end) in intervals {
                        push_row_range(row, begin, end, &mut ranges);
                    }
                }
                Err(err) => warn!("skipping row: {err}"),
            }
        }
        ranges
    }
}

/// Converts one azimuth interval of `row` into node index ranges.
fn push_row_range(row: &Row, theta_begin: f32, theta_end: f32, out: &mut Vec<Range<usize>>) {
    let size = row.len();
    let scale = size as f32 / TAU;
    let mut begin = (theta_begin * scale).ceil() as usize;
    let mut end = (theta_end * scale).ceil() as usize;

    // tan/atan round-trips can push an azimuth a hair past 2π; an index
    // past the row is the wrap, not a longer row.
    if begin > size {
        begin = 0;
    }
    if end > size {
        end = size;
    }

    if begin == end {
        return;
    }
    if begin < end {
        out.push(row.begin + begin..row.begin + end);
    } else {
        out.push(row.begin..row.begin + end);
        out.push(row.begin + begin..row.end);
    }
}
