//! Shared poses, lenses and meshes for the end-to-end scenarios.

use nalgebra::{Matrix3, Matrix4};
use visual_mesh::{Lens, Mesh, MeshOptions, Projection, Sphere};

/// Assembles a camera pose from a rotation block and a height.
pub fn hoc_from(rotation: &Matrix3<f32>, height: f32) -> Matrix4<f32> {
    let mut pose = Matrix4::identity();
    pose.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    pose[(2, 3)] = height;
    pose
}

/// Identity rotation: the principal axis lies on the horizon, along +x.
pub fn horizon_pose(height: f32) -> Matrix4<f32> {
    hoc_from(&Matrix3::identity(), height)
}

/// Principal axis pointing exactly straight down.
pub fn downward_pose(height: f32) -> Matrix4<f32> {
    // camera x -> -z, camera y -> y, camera z -> x
    let rotation = Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0);
    hoc_from(&rotation, height)
}

pub fn radial(fov: f32) -> Lens {
    Lens {
        projection: Projection::Radial {
            fov,
            pixels_per_radian: 400.0,
        },
        dimensions: [640, 480],
        centre: [320.0, 240.0],
    }
}

pub fn equirectangular(fov: [f32; 2]) -> Lens {
    Lens {
        projection: Projection::Equirectangular {
            fov,
            focal_length_px: 420.0,
        },
        dimensions: [640, 480],
        centre: [320.0, 240.0],
    }
}

/// The reference mesh of the scenarios: a ball seen from one metre up.
pub fn ball_mesh() -> Mesh {
    let shape = Sphere::new(0.1).expect("valid radius");
    let options = MeshOptions {
        intersections: 4.0,
        max_distance: f32::INFINITY,
        min_angular_res: 0.01,
    };
    Mesh::generate(&shape, 1.0, &options).expect("valid generation input")
}
