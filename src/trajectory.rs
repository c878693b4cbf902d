//! Analytic reference motion of the end effector.

use std::f64::consts::PI;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use crate::kinematic_traits::{twist, Reference, ReferenceTrajectory};

/// Periodic oscillation of the end effector around its initial pose. The position moves
/// along `linear_amplitude` and the orientation rotates around the fixed axis
/// `angular_amplitude`, both as `amplitude * sin(2π f t)`. The feed-forward velocity is the
/// exact time derivative, `amplitude * 2π f * cos(2π f t)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinusoidalReference {
    /// Oscillation frequency, Hz
    pub frequency: f64,

    /// Peak displacement, meters
    pub linear_amplitude: Vector3<f64>,

    /// Peak rotation as scaled axis, radians
    pub angular_amplitude: Vector3<f64>,
}

impl SinusoidalReference {
    /// One oscillation per second: `z = sin(2πt) / 4π` and rotation around x by
    /// `sin(2πt) / 2π`. Peak velocities are 0.5 m/s and 1 rad/s.
    pub fn new() -> Self {
        SinusoidalReference {
            frequency: 1.0,
            linear_amplitude: Vector3::new(0.0, 0.0, 1.0 / (4.0 * PI)),
            angular_amplitude: Vector3::new(1.0 / (2.0 * PI), 0.0, 0.0),
        }
    }

    /// Oscillation period, seconds
    pub fn period(&self) -> f64 {
        1.0 / self.frequency
    }
}

impl Default for SinusoidalReference {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceTrajectory for SinusoidalReference {
    fn reference(&self, t: f64) -> Reference {
        let omega = 2.0 * PI * self.frequency;
        let (s, c) = (omega * t).sin_cos();

        let offset = Isometry3::from_parts(
            Translation3::from(self.linear_amplitude * s),
            UnitQuaternion::from_scaled_axis(self.angular_amplitude * s),
        );
        let velocity = twist(
            &(self.angular_amplitude * (omega * c)),
            &(self.linear_amplitude * (omega * c)),
        );
        Reference { offset, velocity }
    }
}
