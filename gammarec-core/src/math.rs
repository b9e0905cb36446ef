//! Small geometric helpers shared across the reconstruction.

use nalgebra::Vector3;

/// Angle between two vectors in radians, clamped against rounding.
///
/// Returns 0 when either vector has zero length.
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let norms = a.norm() * b.norm();
    if norms == 0.0 {
        return 0.0;
    }
    (a.dot(b) / norms).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_angle_between() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 2.0, 0.0);
        assert_relative_eq!(angle_between(&x, &y), FRAC_PI_2);
        assert_relative_eq!(angle_between(&x, &x), 0.0);
    }

    #[test]
    fn test_angle_between_zero_vector() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(angle_between(&x, &Vector3::zeros()), 0.0);
    }
}
