//! Camera lens models and their parameter validation.
//!
//! The core only consumes the projection family and field of view when
//! intersecting the mesh with the frustum; the remaining parameters
//! (dimensions, optical centre, focal scale) travel with the lens for the
//! downstream projection engine.

use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Projection family and the scalars specific to it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum Projection {
    /// Rectilinear projection with a rectangular-pyramid frustum.
    Equirectangular {
        /// Field of view about the camera y and z axes, in radians.
        fov: [f32; 2],
        focal_length_px: f32,
    },
    /// Axially symmetric fisheye projection with a conical frustum.
    Radial {
        /// Full opening angle of the view cone, in radians.
        fov: f32,
        pixels_per_radian: f32,
    },
}

/// A camera lens: projection parameters plus the shared image geometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lens {
    pub projection: Projection,
    /// Image width and height in pixels.
    pub dimensions: [u32; 2],
    /// Optical centre in pixel coordinates.
    pub centre: [f32; 2],
}

/// Reasons why a lens cannot be used for a frustum lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LensError {
    /// Each equirectangular fov component must lie in (0, π): the frustum
    /// corners are built from `tan(fov/2)`.
    InvalidEquirectangularFov { fov: [f32; 2] },
    /// A radial fov must lie in (0, 2π].
    InvalidRadialFov { fov: f32 },
    InvalidFocalLength { focal_length_px: f32 },
    InvalidPixelsPerRadian { pixels_per_radian: f32 },
    InvalidDimensions { dimensions: [u32; 2] },
}

impl std::fmt::Display for LensError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensError::InvalidEquirectangularFov { fov } => write!(
                f,
                "equirectangular fov components must lie in (0, pi), got ({}, {})",
                fov[0], fov[1]
            ),
            LensError::InvalidRadialFov { fov } => {
                write!(f, "radial fov must lie in (0, 2*pi], got {fov}")
            }
            LensError::InvalidFocalLength { focal_length_px } => {
                write!(f, "focal length must be positive and finite, got {focal_length_px}")
            }
            LensError::InvalidPixelsPerRadian { pixels_per_radian } => write!(
                f,
                "pixels per radian must be positive and finite, got {pixels_per_radian}"
            ),
            LensError::InvalidDimensions { dimensions } => {
                write!(f, "image dimensions must be non-zero, got {}x{}", dimensions[0], dimensions[1])
            }
        }
    }
}

impl std::error::Error for LensError {}

impl Lens {
    /// Checks every scalar parameter, failing fast on nonsensical input.
    pub fn validate(&self) -> Result<(), LensError> {
        if self.dimensions[0] == 0 || self.dimensions[1] == 0 {
            return Err(LensError::InvalidDimensions {
                dimensions: self.dimensions,
            });
        }
        match self.projection {
            Projection::Equirectangular {
                fov,
                focal_length_px,
            } => {
                if fov.iter().any(|&f| !f.is_finite() || f <= 0.0 || f >= PI) {
                    return Err(LensError::InvalidEquirectangularFov { fov });
                }
                if !focal_length_px.is_finite() || focal_length_px <= 0.0 {
                    return Err(LensError::InvalidFocalLength { focal_length_px });
                }
            }
            Projection::Radial {
                fov,
                pixels_per_radian,
            } => {
                if !fov.is_finite() || fov <= 0.0 || fov > TAU {
                    return Err(LensError::InvalidRadialFov { fov });
                }
                if !pixels_per_radian.is_finite() || pixels_per_radian <= 0.0 {
                    return Err(LensError::InvalidPixelsPerRadian { pixels_per_radian });
                }
            }
        }
        Ok(())
    }
}
