//! Flat circular object lying on the observation plane.

use super::{fold_to_lower, Shape, ShapeError};
use std::f32::consts::FRAC_PI_2;

/// A disc of fixed radius flat on the plane, e.g. a field marking.
///
/// A viewing ray at polar angle `phi` meets the plane `h·tan(phi)` from the
/// point under the camera; consecutive discs tile the plane along that
/// ground line, so the next disc edge sits at `atan(tan(phi) + 2r/h)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    radius: f32,
}

impl Circle {
    pub fn new(radius: f32) -> Result<Self, ShapeError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ShapeError::InvalidRadius { radius });
        }
        Ok(Self { radius })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

impl Shape for Circle {
    fn phi_next(&self, phi: f32, h: f32) -> f32 {
        if !(h > 0.0) {
            return f32::NAN;
        }
        let folded = fold_to_lower(phi);
        let next = (folded.tan() + 2.0 * self.radius / h).atan();
        if phi > FRAC_PI_2 {
            std::f32::consts::PI - next
        } else {
            next
        }
    }

    fn theta(&self, phi: f32, h: f32) -> f32 {
        if !(h > 0.0) {
            return f32::NAN;
        }
        // Ground distance from the point under the camera to the disc centre.
        let d = h * fold_to_lower(phi).tan();
        if d.is_nan() {
            return f32::NAN;
        }
        if d <= self.radius {
            // The disc straddles the axis and covers every azimuth.
            return std::f32::consts::TAU;
        }
        2.0 * (self.radius / d).asin()
    }

    fn k(&self, h0: f32, h1: f32) -> f32 {
        h0 / h1
    }
}
