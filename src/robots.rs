//! Hardcoded kinematic trees for a few robots

use std::f64::consts::PI;
use crate::kinematic_tree::{JointSpec, KinematicTree};
use crate::kinematics_error::KinematicsError;
use crate::utils::origin;
use nalgebra::Vector3;

/// Joint names of [seven_dof_arm], from the shoulder to the wrist.
pub const SEVEN_DOF_JOINTS: [&str; 7] = ["s0", "s1", "e0", "e1", "w0", "w1", "w2"];

/// Base frame of [seven_dof_arm]
pub const SEVEN_DOF_ROOT: &str = "torso";

/// Frame moved by the last joint of [seven_dof_arm]
pub const SEVEN_DOF_TIP: &str = "wrist";

/// Initial configuration of [seven_dof_arm] for the joints in [SEVEN_DOF_JOINTS] order,
/// elbow bent and away from singularities. The elbow roll `e0` starts slightly past its
/// limit; joint limits are not enforced and the centering bias pulls it back.
pub const SEVEN_DOF_START: [f64; 7] = [-0.25 * PI, 0.0, PI, 0.5 * PI, 0.0, 0.0, 0.0];

/// Redundant seven joint arm, the right arm of the Rethink Baxter. All joints rotate around
/// their local z axis. Frames from the base: torso, upper_shoulder (s0), lower_shoulder (s1),
/// upper_elbow (e0), lower_elbow (e1), upper_forearm (w0), lower_forearm (w1), wrist (w2)
/// and the fixed hand.
pub fn seven_dof_arm() -> KinematicTree {
    // The geometry below is constant and valid, building it cannot fail.
    build_seven_dof_arm().expect("Built-in seven joint arm must be valid")
}

fn build_seven_dof_arm() -> Result<KinematicTree, KinematicsError> {
    let z = Vector3::z();
    let mut tree = KinematicTree::new();

    tree.add_fixed("torso", None, origin([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]))?;
    tree.add_frame("upper_shoulder", Some("torso"),
                   origin([0.064, -0.259, 0.13], [0.0, 0.0, -0.25 * PI]),
                   Some(JointSpec::revolute("s0", z).with_limits(-1.7016, 1.7016)))?;
    tree.add_frame("lower_shoulder", Some("upper_shoulder"),
                   origin([0.069, 0.0, 0.27035], [-0.5 * PI, 0.0, 0.0]),
                   Some(JointSpec::revolute("s1", z).with_limits(-2.147, 1.047)))?;
    tree.add_frame("upper_elbow", Some("lower_shoulder"),
                   origin([0.102, 0.0, 0.0], [0.5 * PI, 0.0, 0.5 * PI]),
                   Some(JointSpec::revolute("e0", z).with_limits(-3.0541, 3.0541)))?;
    tree.add_frame("lower_elbow", Some("upper_elbow"),
                   origin([0.069, 0.0, 0.26242], [-0.5 * PI, -0.5 * PI, 0.0]),
                   Some(JointSpec::revolute("e1", z).with_limits(-0.05, 2.618)))?;
    tree.add_frame("upper_forearm", Some("lower_elbow"),
                   origin([0.10359, 0.0, 0.0], [0.5 * PI, 0.0, 0.5 * PI]),
                   Some(JointSpec::revolute("w0", z).with_limits(-3.059, 3.059)))?;
    tree.add_frame("lower_forearm", Some("upper_forearm"),
                   origin([0.01, 0.0, 0.2707], [-0.5 * PI, -0.5 * PI, 0.0]),
                   Some(JointSpec::revolute("w1", z).with_limits(-1.5707, 2.094)))?;
    tree.add_frame("wrist", Some("lower_forearm"),
                   origin([0.115975, 0.0, 0.0], [0.5 * PI, 0.0, 0.5 * PI]),
                   Some(JointSpec::revolute("w2", z).with_limits(-3.059, 3.059)))?;
    tree.add_fixed("hand", Some("wrist"), origin([0.0, 0.0, 0.11355], [0.0, 0.0, 0.0]))?;

    Ok(tree)
}

/// Full configuration vector of the tree with the named joints set to `values`, all other
/// joints at zero.
pub fn configuration(tree: &KinematicTree, names: &[&str], values: &[f64]) -> Result<Vec<f64>, KinematicsError> {
    let ids = tree.config_ids(names)?;
    let mut q = vec![0.0; tree.config_count()];
    tree.config_set(&ids, values, &mut q)?;
    Ok(q)
}
