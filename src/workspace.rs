//! Cartesian feedback, nullspace joint centering and integration of joint velocities.

use nalgebra::{DVector, UnitQuaternion, Vector3};
use crate::kinematic_traits::{Pose, Twist, TWIST_V, TWIST_W};
use crate::kinematic_tree::KinematicTree;
use crate::kinematics_error::{check_length, KinematicsError};
use crate::options::WorkspaceOptions;
use crate::sub_chain::SubChain;

/// Below this norm of the quaternion vector part the logarithm uses the series expansion.
const SMALL_ANGLE: f64 = 1e-8;

/// Logarithm of the unit quaternion as the rotation vector (axis * angle), taking the
/// shorter way around. Well defined for the identity and near it.
///
/// `UnitQuaternion::scaled_axis` derives the angle from `acos(w)`, which rounds angles below
/// about 1e-8 to zero. The feedback acts on exactly these small errors, so the angle here is
/// taken from `atan2` of the vector part, with the series expansion once it vanishes.
pub fn rotation_log(rotation: &UnitQuaternion<f64>) -> Vector3<f64> {
    let q = rotation.quaternion();
    // q and -q are the same rotation, choose the one with non-negative w (angle <= π)
    let (w, v) = if q.w < 0.0 { (-q.w, -q.imag()) } else { (q.w, q.imag()) };
    let sin_half = v.norm();
    if sin_half < SMALL_ANGLE {
        // angle / sin(angle / 2) -> 2 / w as the angle vanishes
        v * (2.0 / w)
    } else {
        let angle = 2.0 * sin_half.atan2(w);
        v * (angle / sin_half)
    }
}

/// Add the proportional correction that drives the actual pose `e_act` to the reference
/// `e_ref` into the twist `dx`, which normally already holds the feed-forward velocity.
///
/// The orientation error is the rotation vector of `q_ref * q_act⁻¹`, the position error is
/// the difference of translations, both in the global frame.
pub fn dx_pos(options: &WorkspaceOptions, e_act: &Pose, e_ref: &Pose, dx: &mut Twist) {
    let angular = rotation_log(&(e_ref.rotation * e_act.rotation.inverse()));
    let linear = e_ref.translation.vector - e_act.translation.vector;

    let mut w = dx.fixed_rows_mut::<3>(TWIST_W);
    w += angular * options.gain_angle;
    let mut v = dx.fixed_rows_mut::<3>(TWIST_V);
    v += linear * options.gain_trans;
}

/// Joint velocities pulling every chain joint toward the middle of its range, scaled by
/// `gain_np`. Joints without limits have no preferred position and get zero.
/// This is only a hint for the nullspace projection, never applied to the robot directly.
pub fn dq_center(tree: &KinematicTree, chain: &SubChain, options: &WorkspaceOptions,
                 q_subset: &DVector<f64>) -> Result<DVector<f64>, KinematicsError> {
    let mut dq = DVector::zeros(chain.config_count());
    dq_center_into(tree, chain, options, q_subset, &mut dq)?;
    Ok(dq)
}

/// Same as [dq_center] but writes into the existing vector.
pub fn dq_center_into(tree: &KinematicTree, chain: &SubChain, options: &WorkspaceOptions,
                      q_subset: &DVector<f64>, dq: &mut DVector<f64>) -> Result<(), KinematicsError> {
    check_length(chain.config_count(), q_subset.len())?;
    check_length(chain.config_count(), dq.len())?;
    for (i, &config) in chain.configs().iter().enumerate() {
        dq[i] = match tree.limits(config) {
            Some(limits) => options.gain_np * (limits.center() - q_subset[i]),
            None => 0.0,
        };
    }
    Ok(())
}

/// Explicit Euler step `q += dt * dq`. Joint limits are not enforced.
pub fn integrate(q_subset: &mut DVector<f64>, dq: &DVector<f64>, dt: f64) -> Result<(), KinematicsError> {
    check_length(q_subset.len(), dq.len())?;
    q_subset.axpy(dt, dq, 1.0);
    Ok(())
}
