//! Helper functions

use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use crate::kinematic_traits::Pose;

/// Pose from translation and roll, pitch, yaw angles (fixed axes x, y, z, the URDF convention).
pub fn origin(xyz: [f64; 3], rpy: [f64; 3]) -> Pose {
    Isometry3::from_parts(
        Translation3::new(xyz[0], xyz[1], xyz[2]),
        UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
    )
}

/// Checks if all elements in the slice are finite
pub fn is_valid(qs: &[f64]) -> bool {
    qs.iter().all(|&q| q.is_finite())
}

/// Format joint values, converting radians to degrees.
pub fn format_joints(joints: &[f64]) -> String {
    let row: Vec<String> = joints.iter()
        .map(|q| format!("{:5.2}", q.to_degrees()))
        .collect();
    format!("[{}]", row.join(" "))
}

/// formatting for YAML output
pub(crate) fn deg(x: &f64) -> String {
    if *x == 0.0 {
        return "0".to_string();
    }
    format!("deg({:.4})", x.to_degrees())
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use super::*;

    #[test]
    fn test_is_valid_with_all_finite() {
        let qs = [0.0, 1.0, -1.0, 0.5, -0.5, PI, 2.0];
        assert!(is_valid(&qs));
    }

    #[test]
    fn test_is_valid_with_nan() {
        let qs = [0.0, f64::NAN, 1.0];
        assert!(!is_valid(&qs));
    }

    #[test]
    fn test_is_valid_with_infinity() {
        let qs = [0.0, f64::INFINITY, 1.0, -1.0];
        assert!(!is_valid(&qs));
    }

    #[test]
    fn test_format() {
        assert_eq!(format_joints(&[0.0, PI / 2.0]), "[ 0.00 90.00]");
        assert_eq!(deg(&0.0), "0");
        assert_eq!(deg(&(PI / 4.0)), "deg(45.0000)");
    }

    #[test]
    fn test_origin() {
        let pose = origin([1.0, 2.0, 3.0], [0.0, 0.0, PI / 2.0]);
        assert_eq!(pose.translation.vector, nalgebra::Vector3::new(1.0, 2.0, 3.0));
        // Yaw of 90 degrees turns x into y
        let x = pose.rotation * nalgebra::Vector3::x();
        assert!((x - nalgebra::Vector3::y()).norm() < 1e-12);
    }
}
