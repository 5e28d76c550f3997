//! Ray projection onto a wire plane.
//!
//! A focal-plane ray is defined at the reference position z = 0:
//!
//! ```text
//! x(z) = x + z * xp
//! y(z) = y + z * yp
//! ray  = [x, y, xp, yp]
//! ```
//!
//! Each plane carries nine coefficients describing the coordinate it
//! measures as a rational function of the ray.

use nalgebra::Vector4;

/// Focal-plane ray `[x, y, xp, yp]`.
pub type Ray = Vector4<f64>;

/// Number of projection coefficients per plane.
pub const NUM_PLANE_COEFFS: usize = 9;

/// Value returned when the projection denominator vanishes.
pub const INFINITY: f64 = 1.0e20;

/// Denominator magnitude below which the projection saturates.
pub const CINFINITY: f64 = 1.0 / INFINITY;

/// Coordinate at which `ray` crosses a plane with coefficients `coeffs`.
///
/// ```text
/// num   = xp*y*c0 + yp*x*c1 + xp*c2 + yp*c3 + x*c4 + y*c5
/// denom = xp*c6 + yp*c7 + c8
/// ```
///
/// Returns [`INFINITY`] when `|denom| < CINFINITY`. Pure: identical inputs
/// always give bit-identical output.
pub fn dpsi(ray: &Ray, coeffs: &[f64; NUM_PLANE_COEFFS]) -> f64 {
    let (x, y, xp, yp) = (ray[0], ray[1], ray[2], ray[3]);

    let numerator = xp * y * coeffs[0]
        + yp * x * coeffs[1]
        + xp * coeffs[2]
        + yp * coeffs[3]
        + x * coeffs[4]
        + y * coeffs[5];
    let denominator = xp * coeffs[6] + yp * coeffs[7] + coeffs[8];

    if denominator.abs() < CINFINITY {
        INFINITY
    } else {
        numerator / denominator
    }
}
