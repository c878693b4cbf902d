extern crate nalgebra as na;

use na::{DVector, Isometry3, Vector3, Vector6};

use crate::kinematic_tree::{KinematicTree, TransformSet};
use crate::kinematics_error::KinematicsError;
use crate::sub_chain::SubChain;

/// Pose is a rigid transform of one frame relative to another. It contains both Cartesian
/// translation and rotation quaternion. Poses compose as `parent * child`.
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// let rotation = UnitQuaternion::from_quaternion(na::Quaternion::new(1.0, 0.0, 0.0, 1.0).normalize());
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Spatial velocity (twist) in the global frame. The first three values are the angular
/// velocity, the last three are the linear velocity of the frame origin.
pub type Twist = Vector6<f64>;

/// Offset of the angular part in the [Twist].
pub const TWIST_W: usize = 0;

/// Offset of the linear part in the [Twist].
pub const TWIST_V: usize = 3;

/// Index of the frame in the kinematic tree.
pub type FrameId = usize;

/// Index of the configuration variable (joint value) in the configuration vector.
pub type ConfigId = usize;

/// Angular part of the twist
pub fn twist_angular(dx: &Twist) -> Vector3<f64> {
    dx.fixed_rows::<3>(TWIST_W).into_owned()
}

/// Linear part of the twist
pub fn twist_linear(dx: &Twist) -> Vector3<f64> {
    dx.fixed_rows::<3>(TWIST_V).into_owned()
}

/// Assemble the twist from angular and linear velocity.
pub fn twist(angular: &Vector3<f64>, linear: &Vector3<f64>) -> Twist {
    let mut dx = Twist::zeros();
    dx.fixed_rows_mut::<3>(TWIST_W).copy_from(angular);
    dx.fixed_rows_mut::<3>(TWIST_V).copy_from(linear);
    dx
}

/// Desired pose offset together with the feed-forward velocity at some moment of time.
#[derive(Debug, Clone, Copy)]
pub struct Reference {
    /// Offset relative to the initial end-effector pose
    pub offset: Pose,

    /// Feed-forward twist, the time derivative of the offset
    pub velocity: Twist,
}

/// Time parameterized motion of the end effector. Implementations must be deterministic and
/// have no side effects, as the reference may be requested more than once for the same time.
pub trait ReferenceTrajectory {
    /// Reference at `t` seconds since the first frame.
    fn reference(&self, t: f64) -> Reference;
}

/// Everything the differential solver may need to map the Cartesian velocity to joint
/// velocities. All references live only for one call.
pub struct SolveInput<'a> {
    pub tree: &'a KinematicTree,
    pub chain: &'a SubChain,

    /// Absolute and relative poses of all frames at the current configuration.
    pub transforms: &'a TransformSet,

    /// Desired twist of the chain tip.
    pub dx: &'a Twist,

    /// Seconds since the previous frame.
    pub dt: f64,

    /// Current configuration of the chain joints.
    pub q_subset: &'a DVector<f64>,

    /// Joint velocities from the previous frame.
    pub dq_prev: &'a DVector<f64>,

    /// Joint velocity bias applied in the nullspace of the Jacobian only.
    pub dq_center: &'a DVector<f64>,
}

/// Maps the desired Cartesian velocity into joint velocities for the chain. The returned
/// vector always has as many entries as there are joints in the chain. Near singularities
/// the solver must damp rather than fail; an error means contract violation.
pub trait DifferentialSolver {
    fn solve(&mut self, input: &SolveInput) -> Result<DVector<f64>, KinematicsError>;
}
