//! Spherical object resting on the observation plane.

use super::{fold_to_lower, Shape, ShapeError};
use std::f32::consts::FRAC_PI_2;

/// A sphere of fixed radius sitting on the plane, e.g. a ball.
///
/// All sphere centres lie in a plane `radius` above the observation plane,
/// which is `h - radius` below the camera. A sphere whose centre sits on
/// the viewing ray at polar angle `phi` is at distance
/// `(h - radius) / cos(phi)` and subtends `2·asin(radius·cos(phi) / (h - radius))`
/// in the polar direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    radius: f32,
}

impl Sphere {
    pub fn new(radius: f32) -> Result<Self, ShapeError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ShapeError::InvalidRadius { radius });
        }
        Ok(Self { radius })
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Camera height above the plane of sphere centres, or NaN when the
    /// camera sits at or below it and the plane cannot be tiled.
    fn centre_height(&self, h: f32) -> f32 {
        let hc = h - self.radius;
        if hc > 0.0 {
            hc
        } else {
            f32::NAN
        }
    }
}

impl Shape for Sphere {
    fn phi_next(&self, phi: f32, h: f32) -> f32 {
        let hc = self.centre_height(h);
        let folded = fold_to_lower(phi);
        let arg = self.radius * folded.cos() / hc;
        if !(arg < 1.0) {
            // One sphere fills the whole view down the axis.
            return f32::NAN;
        }
        let step = 2.0 * arg.asin();
        if phi > FRAC_PI_2 {
            phi - step
        } else {
            phi + step
        }
    }

    fn theta(&self, phi: f32, h: f32) -> f32 {
        let hc = self.centre_height(h);
        // Distance of the sphere centre from the vertical axis, measured
        // in the plane of centres.
        let rho = hc * fold_to_lower(phi).tan();
        if rho.is_nan() {
            return f32::NAN;
        }
        if rho <= self.radius {
            // The sphere straddles the axis and covers every azimuth.
            return std::f32::consts::TAU;
        }
        2.0 * (self.radius / rho).asin()
    }

    fn k(&self, h0: f32, h1: f32) -> f32 {
        (h0 - self.radius) / (h1 - self.radius)
    }
}
