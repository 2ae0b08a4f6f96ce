//! Mesh generation: phi sampling, ray generation and neighbour stitching.

use super::{neighbour, offset_between, Mesh, MeshError, MeshOptions, Node, Row};
use crate::shape::Shape;
use log::debug;
use std::f32::consts::{PI, TAU};

/// A phi row accepted by the sampling passes, before node generation.
struct PhiRow {
    phi: f32,
    steps: usize,
}

impl Mesh {
    /// Generates a mesh for `shape` seen from a camera `height` above the
    /// observation plane.
    ///
    /// The two sampling passes walk away from the poles towards the
    /// horizon, one below and one above, subdividing the shape's
    /// one-object steps by the target intersection count. A shape that
    /// yields no finite samples produces an empty mesh, which is a valid
    /// result; only nonsensical inputs fail.
    pub fn generate<S: Shape>(
        shape: &S,
        height: f32,
        options: &MeshOptions,
    ) -> Result<Mesh, MeshError> {
        if !height.is_finite() || height <= 0.0 {
            return Err(MeshError::InvalidHeight { height });
        }
        let k = options.intersections;
        if !k.is_finite() || k <= 0.0 {
            return Err(MeshError::InvalidIntersections { intersections: k });
        }
        if options.max_distance.is_nan() || options.max_distance <= 0.0 {
            return Err(MeshError::InvalidMaxDistance {
                max_distance: options.max_distance,
            });
        }
        let min_res = options.min_angular_res;
        if !min_res.is_finite() || min_res <= 0.0 {
            return Err(MeshError::InvalidAngularResolution {
                min_angular_res: min_res,
            });
        }

        // One-object step from `phi`, subdivided into k samples.
        let sample_step = |phi: f32| (shape.phi_next(phi, height) - phi) / k;

        // Polar angle at which the viewing ray meets the ground
        // `max_distance` out; sampling stops there on both sides of the
        // horizon. Infinite max_distance caps both passes at the horizon.
        let phi_cap = (options.max_distance / height).atan();

        let mut phis: Vec<PhiRow> = Vec::new();
        let accept = |phi: f32, phis: &mut Vec<PhiRow>| {
            let theta = shape.theta(phi, height) / k;
            if !theta.is_nan() {
                let theta = theta.max(min_res);
                phis.push(PhiRow {
                    phi,
                    steps: (TAU / theta).ceil() as usize,
                });
            }
        };

        // Below the horizon: half a step from straight down avoids a
        // singular pole sample.
        let mut phi = 0.5 * sample_step(0.0);
        while phi.is_finite() && phi < phi_cap {
            accept(phi, &mut phis);
            let step = sample_step(phi);
            if step.is_nan() {
                break;
            }
            phi += step.max(min_res);
        }

        // Above the horizon: mirrored walk down from straight up.
        let phi_floor = PI - phi_cap;
        let mut phi = PI + 0.5 * (sample_step(PI));
        while phi.is_finite() && phi > phi_floor {
            accept(phi, &mut phis);
            let step = sample_step(phi);
            if step.is_nan() {
                break;
            }
            phi += step.min(-min_res);
        }

        phis.sort_by(|a, b| a.phi.partial_cmp(&b.phi).unwrap_or(std::cmp::Ordering::Equal));

        let total: usize = phis.iter().map(|row| row.steps).sum();
        let mut nodes: Vec<Node> = Vec::with_capacity(total);
        let mut rows: Vec<Row> = Vec::with_capacity(phis.len());

        // Generate each row's rays and its wrap-around horizontal links.
        for &PhiRow { phi, steps } in &phis {
            let (sin_phi, cos_phi) = phi.sin_cos();
            let dtheta = TAU / steps as f32;
            rows.push(Row {
                phi,
                begin: nodes.len(),
                end: nodes.len() + steps,
            });
            for i in 0..steps {
                let theta = i as f32 * dtheta;
                let left = if i == 0 { steps - 1 } else { i - 1 };
                let right = if i == steps - 1 { 0 } else { i + 1 };
                let mut neighbours = [0i32; 6];
                neighbours[neighbour::LEFT] = offset_between(i, left);
                neighbours[neighbour::RIGHT] = offset_between(i, right);
                nodes.push(Node {
                    ray: [
                        theta.cos() * sin_phi,
                        theta.sin() * sin_phi,
                        -cos_phi,
                        0.0,
                    ],
                    neighbours,
                });
            }
        }

        stitch(&mut nodes, &rows);

        debug!(
            "generated mesh: height={height} k={k} rows={} nodes={}",
            rows.len(),
            nodes.len()
        );

        Ok(Mesh {
            nodes,
            rows,
            height,
            intersections: k,
            max_distance: options.max_distance,
        })
    }
}

/// Wires the vertical neighbour slots of every node.
fn stitch(nodes: &mut [Node], rows: &[Row]) {
    match rows.len() {
        0 => {}
        1 => {
            // A single ring wraps both vertical directions onto itself.
            pole_link(nodes, &rows[0], neighbour::TOP_LEFT);
            pole_link(nodes, &rows[0], neighbour::BOTTOM_LEFT);
        }
        n => {
            for r in 1..n - 1 {
                let row = rows[r];
                for i in row.begin..row.end {
                    let pos = (i - row.begin) as f32 / row.len() as f32;
                    link(nodes, i, pos, &rows[r - 1], neighbour::TOP_LEFT);
                    link(nodes, i, pos, &rows[r + 1], neighbour::BOTTOM_LEFT);
                }
            }

            // The outermost rows have no row beyond them; they wrap onto
            // the antipodal nodes of their own ring and link inward
            // normally.
            let first = rows[0];
            pole_link(nodes, &first, neighbour::TOP_LEFT);
            for i in first.begin..first.end {
                let pos = (i - first.begin) as f32 / first.len() as f32;
                link(nodes, i, pos, &rows[1], neighbour::BOTTOM_LEFT);
            }

            let last = rows[n - 1];
            pole_link(nodes, &last, neighbour::BOTTOM_LEFT);
            for i in last.begin..last.end {
                let pos = (i - last.begin) as f32 / last.len() as f32;
                link(nodes, i, pos, &rows[n - 2], neighbour::TOP_LEFT);
            }
        }
    }
}

/// Links node `i` (at fractional row position `pos`) to its two nearest
/// nodes in `target`, writing the pair at `slot` and `slot + 1`.
///
/// Indexing the target row directly with floor arithmetic can land on the
/// wrap seam when `pos` is near 0 or 1. Instead the index half a cell
/// inward is taken first, and the second node is reached through that
/// node's own wrap-safe horizontal link.
fn link(nodes: &mut [Node], i: usize, pos: f32, target: &Row, slot: usize) {
    let size = target.len();
    let left = pos > 0.5;
    let inward = if left { 0.0 } else { 1.0 };
    // The clamp keeps two-node (and smaller) target rows in bounds, where
    // moving one node inward already reaches the far side of the row.
    let o1 = (target.begin + (pos * size as f32 + inward) as usize).min(target.end - 1);
    let sideways = if left {
        nodes[o1].neighbours[neighbour::RIGHT]
    } else {
        nodes[o1].neighbours[neighbour::LEFT]
    };
    let o2 = (o1 as isize + sideways as isize) as usize;

    let (l, r) = if left { (o1, o2) } else { (o2, o1) };
    nodes[i].neighbours[slot] = offset_between(i, l);
    nodes[i].neighbours[slot + 1] = offset_between(i, r);
}

/// Wraps a pole row onto its own antipodal nodes: the node across the
/// pole and that node's right-hand neighbour.
///
/// For odd row sizes the antipode falls between two nodes; floor and
/// floor + 1 are used.
fn pole_link(nodes: &mut [Node], row: &Row, slot: usize) {
    let size = row.len();
    for i in row.begin..row.end {
        let p = i - row.begin;
        let across = (p + size / 2) % size;
        nodes[i].neighbours[slot] = offset_between(i, row.begin + across);
        nodes[i].neighbours[slot + 1] = offset_between(i, row.begin + (across + 1) % size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angle::wrapped_difference;
    use crate::shape::{Circle, Shape, Sphere};
    use std::f32::consts::FRAC_PI_2;

    /// Shape stub with a constant phi step and row width, for exercising
    /// the builder independently of real object geometry.
    struct FixedStep {
        step: f32,
        theta: f32,
        mirrored: bool,
    }

    impl Shape for FixedStep {
        fn phi_next(&self, phi: f32, _h: f32) -> f32 {
            if phi > FRAC_PI_2 {
                if self.mirrored {
                    phi - self.step
                } else {
                    f32::NAN
                }
            } else {
                phi + self.step
            }
        }

        fn theta(&self, _phi: f32, _h: f32) -> f32 {
            self.theta
        }

        fn k(&self, _h0: f32, _h1: f32) -> f32 {
            1.0
        }
    }

    fn options(k: f32, min_res: f32) -> MeshOptions {
        MeshOptions {
            intersections: k,
            max_distance: f32::INFINITY,
            min_angular_res: min_res,
        }
    }

    fn sphere_mesh() -> Mesh {
        let shape = Sphere::new(0.1).unwrap();
        Mesh::generate(&shape, 1.0, &options(4.0, 0.01)).unwrap()
    }

    fn circle_mesh() -> Mesh {
        let shape = Circle::new(0.05).unwrap();
        Mesh::generate(&shape, 1.0, &options(2.0, 0.02)).unwrap()
    }

    #[test]
    fn rejects_invalid_input() {
        let shape = Sphere::new(0.1).unwrap();
        assert_eq!(
            Mesh::generate(&shape, 0.0, &MeshOptions::default()).unwrap_err(),
            MeshError::InvalidHeight { height: 0.0 }
        );
        assert!(Mesh::generate(&shape, f32::NAN, &MeshOptions::default()).is_err());
        assert!(matches!(
            Mesh::generate(&shape, 1.0, &options(0.0, 0.01)),
            Err(MeshError::InvalidIntersections { .. })
        ));
        assert!(matches!(
            Mesh::generate(
                &shape,
                1.0,
                &MeshOptions {
                    max_distance: -1.0,
                    ..MeshOptions::default()
                }
            ),
            Err(MeshError::InvalidMaxDistance { .. })
        ));
        assert!(matches!(
            Mesh::generate(&shape, 1.0, &options(4.0, 0.0)),
            Err(MeshError::InvalidAngularResolution { .. })
        ));
    }

    #[test]
    fn empty_sampling_is_a_valid_mesh() {
        // Camera below the sphere top: no finite samples at all.
        let shape = Sphere::new(0.5).unwrap();
        let mesh = Mesh::generate(&shape, 0.3, &MeshOptions::default()).unwrap();
        assert!(mesh.nodes().is_empty());
        assert!(mesh.rows().is_empty());
    }

    #[test]
    fn nan_theta_discards_rows() {
        let shape = FixedStep {
            step: 0.4,
            theta: f32::NAN,
            mirrored: false,
        };
        let mesh = Mesh::generate(&shape, 1.0, &options(1.0, 0.01)).unwrap();
        assert!(mesh.nodes().is_empty());
    }

    #[test]
    fn rows_partition_nodes_in_ascending_phi() {
        for mesh in [sphere_mesh(), circle_mesh()] {
            let rows = mesh.rows();
            assert!(!rows.is_empty());
            assert_eq!(rows[0].begin, 0);
            assert_eq!(rows.last().unwrap().end, mesh.nodes().len());
            for pair in rows.windows(2) {
                assert!(pair[0].phi < pair[1].phi, "rows not strictly ascending");
                assert_eq!(pair[0].end, pair[1].begin, "rows must be contiguous");
            }
            for row in rows {
                assert!(!row.is_empty());
                // A row never crosses the horizon.
                assert!(row.phi != FRAC_PI_2);
            }
        }
    }

    #[test]
    fn rays_are_unit_length() {
        for mesh in [sphere_mesh(), circle_mesh()] {
            for node in mesh.nodes() {
                let [x, y, z, w] = node.ray;
                let norm = (x * x + y * y + z * z).sqrt();
                assert!((norm - 1.0).abs() < 1e-6, "ray norm {norm}");
                assert_eq!(w, 0.0);
            }
        }
    }

    #[test]
    fn rows_span_the_azimuth_uniformly() {
        let mesh = sphere_mesh();
        for row in mesh.rows() {
            let dtheta = TAU / row.len() as f32;
            for (i, node) in mesh.nodes()[row.begin..row.end].iter().enumerate() {
                let azimuth = node.ray[1].atan2(node.ray[0]);
                assert!(
                    wrapped_difference(azimuth, i as f32 * dtheta) < 1e-4,
                    "node {i} in row at phi {} off its grid position",
                    row.phi
                );
            }
        }
    }

    #[test]
    fn horizontal_links_close_each_ring() {
        let mesh = sphere_mesh();
        for row in mesh.rows() {
            for i in row.begin..row.end {
                let node = &mesh.nodes()[i];
                let l = node.neighbour_index(i, neighbour::LEFT);
                let r = node.neighbour_index(i, neighbour::RIGHT);
                assert!((row.begin..row.end).contains(&l));
                assert!((row.begin..row.end).contains(&r));
                // Left/right links are exactly reciprocal.
                assert_eq!(mesh.nodes()[l].neighbour_index(l, neighbour::RIGHT), i);
                assert_eq!(mesh.nodes()[r].neighbour_index(r, neighbour::LEFT), i);
            }
        }
    }

    #[test]
    fn pole_rows_wrap_onto_their_antipodes() {
        let mesh = sphere_mesh();
        let rows = mesh.rows();
        let checks = [
            (rows[0], neighbour::TOP_LEFT),
            (*rows.last().unwrap(), neighbour::BOTTOM_LEFT),
        ];
        for (row, slot) in checks {
            let size = row.len();
            for i in row.begin..row.end {
                let p = i - row.begin;
                let across = row.begin + (p + size / 2) % size;
                let node = &mesh.nodes()[i];
                assert_eq!(node.neighbour_index(i, slot), across);
                assert_eq!(
                    node.neighbour_index(i, slot + 1),
                    row.begin + (p + size / 2 + 1) % size
                );
            }
        }
    }

    #[test]
    fn vertical_links_land_on_the_adjacent_row() {
        let mesh = sphere_mesh();
        let rows = mesh.rows();
        for (r, row) in rows.iter().enumerate() {
            for i in row.begin..row.end {
                let node = &mesh.nodes()[i];
                let own_azimuth = (i - row.begin) as f32 * TAU / row.len() as f32;
                let mut targets = Vec::new();
                if r + 1 < rows.len() {
                    targets.push((rows[r + 1], neighbour::BOTTOM_LEFT));
                }
                if r > 0 {
                    targets.push((rows[r - 1], neighbour::TOP_LEFT));
                }
                for (target, slot) in targets {
                    let dtheta = TAU / target.len() as f32;
                    for s in [slot, slot + 1] {
                        let j = node.neighbour_index(i, s);
                        assert!(
                            (target.begin..target.end).contains(&j),
                            "link left its target row"
                        );
                        let target_azimuth = (j - target.begin) as f32 * dtheta;
                        assert!(
                            wrapped_difference(own_azimuth, target_azimuth) <= 2.5 * dtheta,
                            "vertical link strays too far in azimuth"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn most_vertical_links_reciprocate() {
        // Rows of different sizes cannot pair up two-for-two, so exact
        // symmetry is impossible; the bulk of links must still be mutual.
        let mesh = sphere_mesh();
        let rows = mesh.rows();
        let mut total = 0usize;
        let mut mutual = 0usize;
        for (r, row) in rows.iter().enumerate() {
            let pairs: &[(usize, usize)] = if r + 1 < rows.len() {
                &[(neighbour::BOTTOM_LEFT, neighbour::TOP_LEFT)]
            } else {
                &[]
            };
            for &(down, up) in pairs {
                for i in row.begin..row.end {
                    for s in [down, down + 1] {
                        let j = mesh.nodes()[i].neighbour_index(i, s);
                        total += 1;
                        let back = &mesh.nodes()[j];
                        if back.neighbour_index(j, up) == i || back.neighbour_index(j, up + 1) == i
                        {
                            mutual += 1;
                        }
                    }
                }
            }
        }
        assert!(total > 0);
        let fraction = mutual as f32 / total as f32;
        assert!(fraction > 0.75, "only {fraction} of vertical links mutual");
    }

    #[test]
    fn single_ring_wraps_both_ways() {
        let shape = FixedStep {
            step: 2.0,
            theta: 1.0,
            mirrored: false,
        };
        let mesh = Mesh::generate(&shape, 1.0, &options(1.0, 0.01)).unwrap();
        assert_eq!(mesh.rows().len(), 1);
        let row = mesh.rows()[0];
        let size = row.len();
        assert_eq!(size, 7); // ceil(2π / 1.0)
        for i in 0..size {
            let node = &mesh.nodes()[i];
            let across = (i + size / 2) % size;
            assert_eq!(node.neighbour_index(i, neighbour::TOP_LEFT), across);
            assert_eq!(node.neighbour_index(i, neighbour::BOTTOM_LEFT), across);
        }
    }

    #[test]
    fn mirrored_stub_builds_both_hemispheres() {
        let shape = FixedStep {
            step: 0.4,
            theta: 0.8,
            mirrored: true,
        };
        let mesh = Mesh::generate(&shape, 1.0, &options(1.0, 0.01)).unwrap();
        let below = mesh.rows().iter().filter(|r| r.phi < FRAC_PI_2).count();
        let above = mesh.rows().iter().filter(|r| r.phi > FRAC_PI_2).count();
        assert_eq!(below, above);
        assert!(below >= 3);
    }

    #[test]
    fn max_distance_caps_both_passes() {
        let shape = Sphere::new(0.1).unwrap();
        let capped = Mesh::generate(
            &shape,
            1.0,
            &MeshOptions {
                intersections: 4.0,
                max_distance: 2.0,
                min_angular_res: 0.01,
            },
        )
        .unwrap();
        let cap = 2.0f32.atan();
        for row in capped.rows() {
            let folded = if row.phi > FRAC_PI_2 {
                PI - row.phi
            } else {
                row.phi
            };
            assert!(
                folded < cap + 1e-5,
                "row at phi {} beyond the distance cap",
                row.phi
            );
        }
        let unbounded = sphere_mesh();
        assert!(capped.rows().len() < unbounded.rows().len());
    }

    #[test]
    fn min_angular_res_bounds_row_sizes() {
        let mesh = sphere_mesh();
        let max_steps = (TAU / 0.01).ceil() as usize;
        for row in mesh.rows() {
            assert!(row.len() <= max_steps);
        }
    }
}
