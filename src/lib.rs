//! Resolved-rate (differential) inverse kinematics for redundant serial manipulators.
//!
//! Every frame of the control loop the controller computes where the tip of the controlled
//! chain should be and how fast it should move, then solves for the joint velocities that
//! achieve this motion and integrates them into the robot configuration. Surplus degrees of
//! freedom are used to keep the joints near the middle of their ranges, by projecting the
//! joint-centering velocity into the nullspace of the Jacobian.
//!
//! # Features
//!
//! - Kinematic tree of named frames with revolute, prismatic and fixed joints; forward
//!   kinematics of all frames in a single pass.
//! - Subchain selection between any ancestor frame and the tip, with the geometric Jacobian
//!   of the tip.
//! - Damped least squares pseudo-inverse, solved either with LU (damping always applied) or
//!   with SVD (damping applied only to small singular values), so the solve stays finite at
//!   kinematic singularities.
//! - Three solver strategies: plain damped least squares, nullspace projection of the
//!   centering bias, and the recursive solver that filters the nullspace velocity over frames.
//! - Sinusoidal reference trajectory with feed-forward velocity and proportional pose feedback.
//! - Headless fixed-rate frame loop driving the controller through the display callback.
//! - Built-in seven joint redundant arm; optional reading of the robot from URDF and of the
//!   controller setup from YAML.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use rs_workspace_control::controller::WorkspaceController;
//! use rs_workspace_control::display_loop::HeadlessLoop;
//! use rs_workspace_control::options::{SolverKind, WorkspaceOptions};
//! use rs_workspace_control::robots::{self, SEVEN_DOF_JOINTS, SEVEN_DOF_ROOT, SEVEN_DOF_START, SEVEN_DOF_TIP};
//! use rs_workspace_control::sub_chain::SubChain;
//!
//! let tree = robots::seven_dof_arm();
//! let chain = SubChain::chain_by_name(&tree, Some(SEVEN_DOF_ROOT), SEVEN_DOF_TIP).unwrap();
//! let q = robots::configuration(&tree, &SEVEN_DOF_JOINTS, &SEVEN_DOF_START).unwrap();
//! let mut controller = WorkspaceController::new(
//!     &tree, chain, WorkspaceOptions::new(), SolverKind::Recursive, q).unwrap();
//!
//! let summary = HeadlessLoop::new(100.0, Duration::from_millis(200)).run(&mut controller).unwrap();
//! assert_eq!(summary.frames, 21);
//! ```

pub mod kinematic_traits;
pub mod kinematics_error;

pub mod kinematic_tree;
pub mod sub_chain;
pub mod jacobian;

pub mod options;
pub mod trajectory;
pub mod workspace;
pub mod solver;
pub mod controller;
pub mod display_loop;

pub mod robots;

#[path = "utils/utils.rs"]
pub mod utils;

#[cfg(feature = "allow_filesystem")]
pub mod urdf;

#[cfg(feature = "allow_filesystem")]
pub mod config;

#[cfg(test)]
mod tests;
