//! Options of the workspace controller

use std::fmt;
use std::str::FromStr;
use crate::kinematics_error::KinematicsError;

/// How the damped least squares system is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearSolver {
    /// LU decomposition of `J Jᵀ + k I`, damping `k_dls` always applied.
    Lu,
    /// Singular value decomposition, damping applied only to small singular values.
    Svd,
}

/// Strategy of the differential solver, selected once when the controller is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// Plain damped least squares, no nullspace motion.
    Dls,
    /// Damped least squares with joint centering projected into the nullspace.
    Nullspace,
    /// Damped least squares relative to the previous joint velocities, with joint centering
    /// in the nullspace. This is the default.
    Recursive,
}

impl FromStr for LinearSolver {
    type Err = KinematicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lu" => Ok(LinearSolver::Lu),
            "svd" => Ok(LinearSolver::Svd),
            other => Err(KinematicsError::ParseError(format!("Unknown linear solver: {}", other))),
        }
    }
}

impl fmt::Display for LinearSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolver::Lu => write!(f, "lu"),
            LinearSolver::Svd => write!(f, "svd"),
        }
    }
}

impl FromStr for SolverKind {
    type Err = KinematicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dls" => Ok(SolverKind::Dls),
            "nullspace" | "np" => Ok(SolverKind::Nullspace),
            "recursive" => Ok(SolverKind::Recursive),
            other => Err(KinematicsError::ParseError(format!("Unknown solver: {}", other))),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::Dls => write!(f, "dls"),
            SolverKind::Nullspace => write!(f, "nullspace"),
            SolverKind::Recursive => write!(f, "recursive"),
        }
    }
}

/// Options for the workspace control. Created once and never changed while the controller runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkspaceOptions {
    /// Damping constant of the least squares solve. Added to `σ²` (or to the diagonal
    /// of `J Jᵀ`), so it has units of squared singular value.
    pub k_dls: f64,

    /// Squared singular values below this threshold are damped when solving with SVD.
    pub s2min: f64,

    /// Gain of the joint centering velocity projected into the nullspace.
    pub gain_np: f64,

    /// Proportional gain on the orientation error.
    pub gain_angle: f64,

    /// Proportional gain on the position error.
    pub gain_trans: f64,

    /// Time constant (seconds) of the recursive solver. Its nullspace velocity follows the
    /// centering bias through the first order filter with this time constant. Zero disables
    /// the filtering.
    pub tau_np: f64,

    pub linear_solver: LinearSolver,
}

impl WorkspaceOptions {
    pub fn new() -> Self {
        WorkspaceOptions {
            k_dls: 5e-5,
            s2min: 5e-3,
            gain_np: 1.0,
            gain_angle: 5.0,
            gain_trans: 5.0,
            tau_np: 0.1,
            linear_solver: LinearSolver::Lu,
        }
    }

    /// Check that all values are finite and non-negative.
    pub fn validate(&self) -> Result<(), KinematicsError> {
        for (name, value) in [
            ("k_dls", self.k_dls), ("s2min", self.s2min), ("gain_np", self.gain_np),
            ("gain_angle", self.gain_angle), ("gain_trans", self.gain_trans),
            ("tau_np", self.tau_np),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(KinematicsError::ParseError(format!(
                    "option '{}' must be finite and non-negative (got {})", name, value)));
            }
        }
        Ok(())
    }

    /// Convert to string yaml representation (quick viewing, etc).
    pub fn to_yaml(&self) -> String {
        format!(
            "options:\n  \
              k_dls: {:e}\n  \
              s2min: {:e}\n  \
              gain_np: {}\n  \
              gain_angle: {}\n  \
              gain_trans: {}\n  \
              tau_np: {}\n  \
              linear_solver: {}\n",
            self.k_dls, self.s2min, self.gain_np, self.gain_angle, self.gain_trans,
            self.tau_np, self.linear_solver
        )
    }
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self::new()
    }
}
