use nalgebra::Isometry3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::kinematic_tree::KinematicTree;
use crate::robots::{self, SEVEN_DOF_JOINTS, SEVEN_DOF_START};

/// Compare two isometries with separate tolerances.
/// - `trans_tol_m`: max allowed Euclidean distance in meters
/// - `rot_tol_rad`: max allowed rotation angle difference in radians
pub fn are_isometries_close(a: &Isometry3<f64>, b: &Isometry3<f64>, trans_tol_m: f64, rot_tol_rad: f64) -> bool {
    let tdiff = (a.translation.vector - b.translation.vector).norm();
    if tdiff > trans_tol_m {
        return false;
    }
    // Relative rotation a⁻¹ ∘ b ∈ SO(3)
    let rdiff = a.rotation.inverse() * b.rotation;
    let mut angle = rdiff.angle(); // in [0, π]
    // Be tolerant to tiny numerical drift
    if angle.is_nan() {
        angle = 0.0;
    }
    angle <= rot_tol_rad
}

/// Single `tolerance` for both meters and radians.
#[inline]
pub fn are_isometries_approx_equal(a: &Isometry3<f64>, b: &Isometry3<f64>, tolerance: f64) -> bool {
    are_isometries_close(a, b, tolerance, tolerance)
}

/// The built-in seven joint arm with its full configuration at the start position.
pub(crate) fn seven_dof_at_start() -> (KinematicTree, Vec<f64>) {
    let tree = robots::seven_dof_arm();
    let q = robots::configuration(&tree, &SEVEN_DOF_JOINTS, &SEVEN_DOF_START)
        .expect("start configuration");
    (tree, q)
}

/// Random configuration inside the joint limits of the tree (or ±π for unlimited joints).
pub(crate) fn random_configuration(tree: &KinematicTree, rng: &mut StdRng) -> Vec<f64> {
    (0..tree.config_count())
        .map(|i| match tree.limits(i) {
            Some(limits) => rng.gen_range(limits.lower..=limits.upper),
            None => rng.gen_range(-std::f64::consts::PI..=std::f64::consts::PI),
        })
        .collect()
}

pub(crate) fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(42)
}
