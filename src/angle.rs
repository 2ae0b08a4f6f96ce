//! Angle utilities shared by the mesh builder and the frustum lookup.

/// Normalizes an angle into the range [0, 2π).
#[inline]
pub fn normalize_two_pi(angle: f32) -> f32 {
    let norm = angle.rem_euclid(std::f32::consts::TAU);
    if norm >= std::f32::consts::TAU {
        0.0
    } else {
        norm
    }
}

/// Computes the smallest unsigned angular difference between two azimuths,
/// accounting for the wrap at 2π. Returns a value in [0, π].
#[inline]
pub fn wrapped_difference(a: f32, b: f32) -> f32 {
    let diff = (a - b).abs().rem_euclid(std::f32::consts::TAU);
    if diff > std::f32::consts::PI {
        std::f32::consts::TAU - diff
    } else {
        diff
    }
}
