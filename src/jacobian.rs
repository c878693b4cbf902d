extern crate nalgebra as na;

use na::{DMatrix, DVector, Vector3};
use crate::kinematic_traits::{twist, Twist, TWIST_V, TWIST_W};
use crate::kinematic_tree::{JointMotion, KinematicTree, TransformSet};
use crate::kinematics_error::{check_length, KinematicsError};
use crate::options::{LinearSolver, WorkspaceOptions};
use crate::sub_chain::SubChain;

/// Struct representing the Jacobian matrix of the chain tip
pub struct Jacobian {
    /// A 6 x n matrix, n being the number of joints in the chain.
    ///
    /// The Jacobian matrix maps the joint velocities to the twist of the tip frame.
    /// Each column corresponds to a joint. The first three rows are angular velocity,
    /// the last three rows linear velocity of the tip origin, both in the global frame.
    matrix: DMatrix<f64>,
}

impl Jacobian {
    /// Constructs a new Jacobian for the chain, using the absolute poses that are already
    /// computed for the current configuration.
    pub fn new(tree: &KinematicTree, chain: &SubChain, transforms: &TransformSet) -> Self {
        Self { matrix: compute_jacobian(tree, chain, transforms) }
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Number of joints (columns)
    pub fn joint_count(&self) -> usize {
        self.matrix.ncols()
    }

    /// Twist of the tip produced by the joint velocities `dq`.
    pub fn twist(&self, dq: &DVector<f64>) -> Result<Twist, KinematicsError> {
        check_length(self.joint_count(), dq.len())?;
        let product = &self.matrix * dq;
        Ok(Twist::from_iterator(product.iter().copied()))
    }

    /// Damped pseudo-inverse (n x 6) of the Jacobian.
    ///
    /// With [LinearSolver::Lu] this is `Jᵀ (J Jᵀ + k I)⁻¹`, the damping `k` being `k_dls`.
    /// With [LinearSolver::Svd], singular values with `σ² < s2min` are inverted as
    /// `σ / (σ² + k)`, larger ones exactly.
    ///
    /// Near singularities this damps instead of failing. An error is only returned if the
    /// decomposition itself is not possible (for instance, zero damping at a singularity).
    pub fn damped_pseudo_inverse(&self, options: &WorkspaceOptions) -> Result<DMatrix<f64>, KinematicsError> {
        match options.linear_solver {
            LinearSolver::Lu => self.dls_lu(options.k_dls),
            LinearSolver::Svd => self.dls_svd(options.k_dls, options.s2min),
        }
    }

    fn dls_lu(&self, k: f64) -> Result<DMatrix<f64>, KinematicsError> {
        let rows = self.matrix.nrows();
        let a = &self.matrix * self.matrix.transpose() + DMatrix::identity(rows, rows) * k;
        // A is symmetric, so (A⁻¹ J)ᵀ = Jᵀ A⁻¹
        let solved = a.lu().solve(&self.matrix)
            .ok_or_else(|| KinematicsError::Numerical(
                "Unable to factor the damped Jacobian product".to_string()))?;
        Ok(solved.transpose())
    }

    fn dls_svd(&self, k: f64, s2min: f64) -> Result<DMatrix<f64>, KinematicsError> {
        let svd = self.matrix.clone().svd(true, true);
        let u = svd.u.ok_or_else(|| KinematicsError::Numerical(
            "SVD of the Jacobian did not produce U".to_string()))?;
        let v_t = svd.v_t.ok_or_else(|| KinematicsError::Numerical(
            "SVD of the Jacobian did not produce V".to_string()))?;

        let inverted = svd.singular_values.map(|s| {
            let s2 = s * s;
            if s2 < s2min {
                let denominator = s2 + k;
                if denominator > 0.0 { s / denominator } else { 0.0 }
            } else {
                1.0 / s
            }
        });
        Ok(v_t.transpose() * DMatrix::from_diagonal(&inverted) * u.transpose())
    }

    /// Joint velocities that produce the given tip twist (in the damped least squares sense).
    pub fn velocities_from_vector(&self, dx: &Twist, options: &WorkspaceOptions)
                                  -> Result<DVector<f64>, KinematicsError> {
        let pinv = self.damped_pseudo_inverse(options)?;
        Ok(pinv * DVector::from_column_slice(dx.as_slice()))
    }
}

/// Projector `I - J⁺ J` onto the nullspace of the Jacobian. Joint velocities multiplied by it
/// (approximately, because of damping) do not move the tip.
pub fn nullspace_projector(jacobian: &Jacobian, pinv: &DMatrix<f64>) -> DMatrix<f64> {
    let n = jacobian.joint_count();
    DMatrix::identity(n, n) - pinv * jacobian.matrix()
}

/// Compute the geometric Jacobian of the chain tip from absolute poses of the frames.
///
/// For a revolute joint with the axis `a` through the point `o` (both in the global
/// frame) the column is `[a; a × (p - o)]` where `p` is the tip position.
/// For a prismatic joint the column is `[0; a]`.
pub fn compute_jacobian(tree: &KinematicTree, chain: &SubChain, transforms: &TransformSet) -> DMatrix<f64> {
    let mut jacobian = DMatrix::zeros(6, chain.config_count());
    let tip = transforms.absolute[chain.tip()].translation.vector;

    let joints = chain.frames().iter()
        .filter_map(|&frame| tree.frame(frame).joint.as_ref().map(|joint| (frame, joint)));

    for (column, (frame, joint)) in joints.enumerate() {
        let pose = &transforms.absolute[frame];
        let axis = pose.rotation * joint.axis.into_inner();
        let col = match joint.motion {
            JointMotion::Revolute => twist(&axis, &axis.cross(&(tip - pose.translation.vector))),
            JointMotion::Prismatic => twist(&Vector3::zeros(), &axis),
        };
        jacobian.fixed_view_mut::<3, 1>(TWIST_W, column).copy_from(&col.fixed_rows::<3>(TWIST_W));
        jacobian.fixed_view_mut::<3, 1>(TWIST_V, column).copy_from(&col.fixed_rows::<3>(TWIST_V));
    }

    jacobian
}
