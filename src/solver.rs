//! Differential inverse kinematics: strategies that map the desired twist of the chain tip
//! into joint velocities.

use nalgebra::DVector;
use tracing::trace;
use crate::jacobian::{nullspace_projector, Jacobian};
use crate::kinematic_traits::{DifferentialSolver, SolveInput};
use crate::kinematics_error::{check_length, KinematicsError};
use crate::options::{SolverKind, WorkspaceOptions};
use crate::utils::is_valid;

/// Plain damped least squares, `dq = J⁺ dx`. Ignores the nullspace bias.
pub struct DampedLeastSquares {
    options: WorkspaceOptions,
}

/// Damped least squares with the nullspace bias, `dq = J⁺ dx + (I - J⁺J) dq_center`.
pub struct NullspaceProjection {
    options: WorkspaceOptions,
}

/// Damped least squares with the nullspace velocity filtered over frames.
///
/// The task part is solved as by [NullspaceProjection]. The nullspace part does not jump to
/// the centering bias but follows it from the previous velocities through a first order
/// filter with the time constant `tau_np`:
///
/// `dq_n = dq_prev + α (dq_center - dq_prev)`, `α = dt / (tau_np + dt)`,
/// `dq = J⁺ dx + (I - J⁺J) dq_n`.
///
/// The redundant joints therefore accelerate smoothly even when the centering bias changes
/// abruptly (for instance, on the first solved frame). With `tau_np = 0` this is the same as
/// [NullspaceProjection].
pub struct RecursiveSolver {
    options: WorkspaceOptions,
}

impl DampedLeastSquares {
    pub fn new(options: &WorkspaceOptions) -> Self {
        DampedLeastSquares { options: *options }
    }
}

impl NullspaceProjection {
    pub fn new(options: &WorkspaceOptions) -> Self {
        NullspaceProjection { options: *options }
    }
}

impl RecursiveSolver {
    pub fn new(options: &WorkspaceOptions) -> Self {
        RecursiveSolver { options: *options }
    }
}

/// Create the solver for the given strategy.
pub fn create_solver(kind: SolverKind, options: &WorkspaceOptions) -> Box<dyn DifferentialSolver> {
    match kind {
        SolverKind::Dls => Box::new(DampedLeastSquares::new(options)),
        SolverKind::Nullspace => Box::new(NullspaceProjection::new(options)),
        SolverKind::Recursive => Box::new(RecursiveSolver::new(options)),
    }
}

fn check_input(input: &SolveInput) -> Result<(), KinematicsError> {
    let n = input.chain.config_count();
    check_length(n, input.q_subset.len())?;
    check_length(n, input.dq_prev.len())?;
    check_length(n, input.dq_center.len())?;
    check_length(input.tree.frame_count(), input.transforms.len())
}

/// Reject output that is not usable as a velocity command.
fn checked(dq: DVector<f64>, n: usize) -> Result<DVector<f64>, KinematicsError> {
    check_length(n, dq.len())?;
    if !is_valid(dq.as_slice()) {
        return Err(KinematicsError::Numerical(format!("Non-finite joint velocities: {:?}", dq.as_slice())));
    }
    trace!("dq = {:?}", dq.as_slice());
    Ok(dq)
}

fn as_dvector(input: &SolveInput) -> DVector<f64> {
    DVector::from_column_slice(input.dx.as_slice())
}

/// Weight of the new value in the first order filter with time constant `tau` over the step `dt`.
fn filter_weight(tau: f64, dt: f64) -> f64 {
    if tau <= 0.0 {
        1.0
    } else {
        dt.max(0.0) / (tau + dt.max(0.0))
    }
}

impl DifferentialSolver for DampedLeastSquares {
    fn solve(&mut self, input: &SolveInput) -> Result<DVector<f64>, KinematicsError> {
        check_input(input)?;
        let jacobian = Jacobian::new(input.tree, input.chain, input.transforms);
        let dq = jacobian.velocities_from_vector(input.dx, &self.options)?;
        checked(dq, input.chain.config_count())
    }
}

impl DifferentialSolver for NullspaceProjection {
    fn solve(&mut self, input: &SolveInput) -> Result<DVector<f64>, KinematicsError> {
        check_input(input)?;
        let jacobian = Jacobian::new(input.tree, input.chain, input.transforms);
        let pinv = jacobian.damped_pseudo_inverse(&self.options)?;
        let projector = nullspace_projector(&jacobian, &pinv);
        let dq = &pinv * as_dvector(input) + projector * input.dq_center;
        checked(dq, input.chain.config_count())
    }
}

impl DifferentialSolver for RecursiveSolver {
    fn solve(&mut self, input: &SolveInput) -> Result<DVector<f64>, KinematicsError> {
        check_input(input)?;
        let jacobian = Jacobian::new(input.tree, input.chain, input.transforms);
        let pinv = jacobian.damped_pseudo_inverse(&self.options)?;
        let projector = nullspace_projector(&jacobian, &pinv);

        let alpha = filter_weight(self.options.tau_np, input.dt);
        let dq_n = input.dq_prev + (input.dq_center - input.dq_prev) * alpha;
        let dq = &pinv * as_dvector(input) + projector * dq_n;
        checked(dq, input.chain.config_count())
    }
}
