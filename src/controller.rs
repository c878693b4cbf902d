//! Per-frame workspace control loop.
//!
//! Every frame the controller computes forward kinematics, takes the reference pose and
//! velocity from the trajectory, adds the proportional correction, solves for joint velocities
//! with the joint-centering bias in the nullspace and integrates the chain joints. The very
//! first frame has no previous velocity estimate and commands zero velocity.

use nalgebra::DVector;
use tracing::{debug, error, info, warn};
use crate::display_loop::{DisplayCallback, DisplayParams, FrameTick};
use crate::kinematic_traits::{DifferentialSolver, Pose, ReferenceTrajectory, SolveInput, Twist};
use crate::kinematic_tree::{KinematicTree, TransformSet};
use crate::kinematics_error::{check_length, KinematicsError};
use crate::options::{SolverKind, WorkspaceOptions};
use crate::solver::create_solver;
use crate::sub_chain::SubChain;
use crate::trajectory::SinusoidalReference;
use crate::utils::format_joints;
use crate::workspace::{dq_center_into, dx_pos, integrate};

/// Tip position error (meters) above which the frame is reported as poorly tracked.
const LARGE_POSITION_ERROR: f64 = 0.05;

/// Tip orientation error (radians) above which the frame is reported as poorly tracked.
const LARGE_ANGLE_ERROR: f64 = 0.25;

/// State of the differential solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverPhase {
    /// No previous velocity estimate yet, the next frame commands zero velocity.
    Cold,
    /// Velocities are solved every frame.
    Warm,
}

/// What the controller did in one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Seconds since the first frame
    pub t: f64,
    /// Seconds since the previous frame
    pub dt: f64,
    /// Phase in which the frame was computed
    pub phase: SolverPhase,
    /// Desired twist of the tip: feed-forward plus proportional correction
    pub dx: Twist,
    /// Commanded chain joint velocities
    pub dq: DVector<f64>,
    /// Distance between the actual and reference tip positions before the step
    pub position_error: f64,
    /// Angle between the actual and reference tip orientations before the step
    pub angle_error: f64,
}

/// Buffers rewritten every frame, sized once when the controller is created.
struct FrameScratch {
    transforms: TransformSet,
    q_subset: DVector<f64>,
    dq_center: DVector<f64>,
}

/// The workspace controller owns everything that changes between frames: the configuration
/// vector, the previous joint velocities and the solver. The kinematic tree is only borrowed.
pub struct WorkspaceController<'a> {
    tree: &'a KinematicTree,
    chain: SubChain,
    options: WorkspaceOptions,
    solver: Box<dyn DifferentialSolver>,
    trajectory: Box<dyn ReferenceTrajectory>,

    /// Full configuration vector
    q: Vec<f64>,

    /// Chain joint velocities of the previous frame
    dq_prev: DVector<f64>,

    /// Tip pose at the initial configuration, origin of the reference trajectory
    e0: Pose,

    phase: SolverPhase,
    scratch: FrameScratch,
    last_report: Option<FrameReport>,
}

impl<'a> WorkspaceController<'a> {
    /// Creates the controller for the chain, starting from the configuration `q`.
    /// The tip pose at `q` becomes the origin of the reference trajectory.
    pub fn new(tree: &'a KinematicTree, chain: SubChain, options: WorkspaceOptions,
               kind: SolverKind, q: Vec<f64>) -> Result<Self, KinematicsError> {
        options.validate()?;
        check_length(tree.config_count(), q.len())?;
        if chain.tip() >= tree.frame_count()
            || chain.configs().iter().any(|&c| c >= tree.config_count()) {
            return Err(KinematicsError::InvalidTree(
                "Subchain does not belong to this kinematic tree".to_string()));
        }

        let transforms = tree.transforms(&q)?;
        let e0 = transforms.absolute[chain.tip()];
        let n = chain.config_count();

        info!("Workspace control of {} joints out of {} (tip {}), solver {}",
              n, tree.config_count(), tree.frame(chain.tip()).name, kind);
        debug!("Initial tip pose: {:?}", e0);

        Ok(WorkspaceController {
            tree,
            chain,
            options,
            solver: create_solver(kind, &options),
            trajectory: Box::new(SinusoidalReference::new()),
            q,
            dq_prev: DVector::zeros(n),
            e0,
            phase: SolverPhase::Cold,
            scratch: FrameScratch {
                transforms,
                q_subset: DVector::zeros(n),
                dq_center: DVector::zeros(n),
            },
            last_report: None,
        })
    }

    /// Replace the differential solver.
    pub fn with_solver(mut self, solver: Box<dyn DifferentialSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Replace the reference trajectory.
    pub fn with_trajectory(mut self, trajectory: Box<dyn ReferenceTrajectory>) -> Self {
        self.trajectory = trajectory;
        self
    }

    /// Current full configuration vector
    pub fn configuration(&self) -> &[f64] {
        &self.q
    }

    /// Chain joint velocities commanded in the previous frame
    pub fn previous_velocities(&self) -> &DVector<f64> {
        &self.dq_prev
    }

    /// Origin of the reference trajectory
    pub fn initial_pose(&self) -> &Pose {
        &self.e0
    }

    pub fn phase(&self) -> SolverPhase {
        self.phase
    }

    pub fn chain(&self) -> &SubChain {
        &self.chain
    }

    pub fn options(&self) -> &WorkspaceOptions {
        &self.options
    }

    /// Report of the most recent frame, if any
    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    /// Absolute reference pose of the tip at `t` seconds.
    pub fn reference_pose(&self, t: f64) -> Pose {
        self.e0 * self.trajectory.reference(t).offset
    }

    /// Run one control frame. Frames must be called in time order; an error means the
    /// velocity could not be computed and the loop must stop.
    pub fn step(&mut self, tick: &FrameTick) -> Result<FrameReport, KinematicsError> {
        let t = tick.elapsed();
        let dt = tick.delta();
        let n = self.chain.config_count();

        self.tree.transforms_into(&self.q, &mut self.scratch.transforms)?;
        self.tree.config_get(self.chain.configs(), &self.q, self.scratch.q_subset.as_mut_slice())?;

        // Reference velocity and pose, then proportional control on the pose error
        let reference = self.trajectory.reference(t);
        let e_ref = self.e0 * reference.offset;
        let e_act = self.scratch.transforms.absolute[self.chain.tip()];
        let mut dx = reference.velocity;
        dx_pos(&self.options, &e_act, &e_ref, &mut dx);

        // Joint-centering velocity for the nullspace projection
        dq_center_into(self.tree, &self.chain, &self.options,
                       &self.scratch.q_subset, &mut self.scratch.dq_center)?;

        let phase = self.phase;
        let dq = match phase {
            SolverPhase::Cold => {
                self.phase = SolverPhase::Warm;
                DVector::zeros(n)
            }
            SolverPhase::Warm => {
                let input = SolveInput {
                    tree: self.tree,
                    chain: &self.chain,
                    transforms: &self.scratch.transforms,
                    dx: &dx,
                    dt,
                    q_subset: &self.scratch.q_subset,
                    dq_prev: &self.dq_prev,
                    dq_center: &self.scratch.dq_center,
                };
                self.solver.solve(&input).map_err(|e| {
                    error!("Differential solve failed at t = {:.4}: {}", t, e);
                    e
                })?
            }
        };

        if tick.now < tick.last {
            warn!("Frame time went backwards by {:?}, integrating with dt = 0", tick.last - tick.now);
        }
        integrate(&mut self.scratch.q_subset, &dq, dt)?;
        self.tree.config_set(self.chain.configs(), self.scratch.q_subset.as_slice(), &mut self.q)?;
        self.dq_prev.copy_from(&dq);

        let report = FrameReport {
            t,
            dt,
            phase,
            dx,
            dq,
            position_error: (e_ref.translation.vector - e_act.translation.vector).norm(),
            angle_error: e_act.rotation.angle_to(&e_ref.rotation),
        };
        debug!("t = {:.3}, dt = {:.4}, position error {:.5}, angle error {:.5}, q = {}",
               t, dt, report.position_error, report.angle_error,
               format_joints(self.scratch.q_subset.as_slice()));
        if report.position_error > LARGE_POSITION_ERROR || report.angle_error > LARGE_ANGLE_ERROR {
            warn!("Large tracking error at t = {:.3}: {:.4} m, {:.4} rad",
                  t, report.position_error, report.angle_error);
        }
        self.last_report = Some(report.clone());
        Ok(report)
    }
}

impl DisplayCallback for WorkspaceController<'_> {
    fn display(&mut self, params: &mut DisplayParams) -> Result<(), KinematicsError> {
        let tick = *params.tick();
        self.step(&tick)?;
        params.set_update();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use nalgebra::Vector3;
    use crate::kinematic_tree::JointSpec;

    /// Two revolute joints in a plane and the tip one meter out.
    fn arm() -> (KinematicTree, SubChain) {
        let mut tree = KinematicTree::new();
        tree.add_frame("a", None, Pose::identity(),
                       Some(JointSpec::revolute("ja", Vector3::z()))).unwrap();
        tree.add_frame("b", Some("a"), Pose::translation(1.0, 0.0, 0.0),
                       Some(JointSpec::revolute("jb", Vector3::z()))).unwrap();
        tree.add_fixed("tip", Some("b"), Pose::translation(1.0, 0.0, 0.0)).unwrap();
        let chain = SubChain::chain_by_name(&tree, None, "tip").unwrap();
        (tree, chain)
    }

    #[test]
    fn test_first_frame_is_cold() {
        let (tree, chain) = arm();
        let q0 = vec![0.3, 0.6];
        let mut controller = WorkspaceController::new(
            &tree, chain, WorkspaceOptions::new(), SolverKind::Recursive, q0.clone()).unwrap();
        assert_eq!(controller.phase(), SolverPhase::Cold);

        let tick = FrameTick { now: Duration::from_millis(20), first: Duration::ZERO, last: Duration::ZERO };
        let report = controller.step(&tick).unwrap();
        assert_eq!(report.phase, SolverPhase::Cold);
        assert_eq!(report.dq.as_slice(), &[0.0, 0.0]);
        assert_eq!(controller.configuration(), q0.as_slice());
        assert_eq!(controller.phase(), SolverPhase::Warm);
    }

    /// Always commands the same velocities.
    struct ConstantVelocity(DVector<f64>);

    impl DifferentialSolver for ConstantVelocity {
        fn solve(&mut self, _input: &SolveInput) -> Result<DVector<f64>, KinematicsError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl DifferentialSolver for Failing {
        fn solve(&mut self, _input: &SolveInput) -> Result<DVector<f64>, KinematicsError> {
            Err(KinematicsError::Numerical("singular".to_string()))
        }
    }

    #[test]
    fn test_warm_frame_integrates() {
        let (tree, chain) = arm();
        let v = DVector::from_vec(vec![1.0, -2.0]);
        let mut controller = WorkspaceController::new(
            &tree, chain, WorkspaceOptions::new(), SolverKind::Dls, vec![0.3, 0.6]).unwrap()
            .with_solver(Box::new(ConstantVelocity(v.clone())));

        let first = FrameTick::first(Duration::ZERO);
        controller.step(&first).unwrap();
        let second = first.next(Duration::from_millis(10));
        let report = controller.step(&second).unwrap();

        assert_eq!(report.phase, SolverPhase::Warm);
        assert!((report.dt - 0.01).abs() < 1e-12);
        let q = controller.configuration();
        assert!((q[0] - 0.31).abs() < 1e-12, "{:?}", q);
        assert!((q[1] - 0.58).abs() < 1e-12, "{:?}", q);
        assert_eq!(controller.previous_velocities(), &v);
        assert_eq!(controller.last_report().map(|r| r.phase), Some(SolverPhase::Warm));
    }

    /// Commands the frame time as the velocity of the first joint.
    struct EchoDt;

    impl DifferentialSolver for EchoDt {
        fn solve(&mut self, input: &SolveInput) -> Result<DVector<f64>, KinematicsError> {
            Ok(DVector::from_vec(vec![input.dt, 0.0]))
        }
    }

    #[test]
    fn test_clock_going_backwards() {
        let (tree, chain) = arm();
        let q0 = vec![0.3, 0.6];
        let mut controller = WorkspaceController::new(
            &tree, chain, WorkspaceOptions::new(), SolverKind::Dls, q0.clone()).unwrap()
            .with_solver(Box::new(EchoDt));

        let first = FrameTick::first(Duration::from_millis(50));
        controller.step(&first).unwrap();
        let back = first.next(Duration::from_millis(40));
        let report = controller.step(&back).unwrap();
        assert_eq!(report.dt, 0.0);
        assert_eq!(report.dq.as_slice(), &[0.0, 0.0]);
        assert_eq!(controller.configuration(), q0.as_slice());

        let report = controller.step(&back.next(Duration::from_millis(60))).unwrap();
        assert!((report.dq[0] - 0.02).abs() < 1e-12, "solver got dt {}", report.dq[0]);
    }

    #[test]
    fn test_solver_failure_propagates() {
        let (tree, chain) = arm();
        let q0 = vec![0.3, 0.6];
        let mut controller = WorkspaceController::new(
            &tree, chain, WorkspaceOptions::new(), SolverKind::Dls, q0.clone()).unwrap()
            .with_solver(Box::new(Failing));
        let first = FrameTick::first(Duration::ZERO);
        controller.step(&first).unwrap();
        let result = controller.step(&first.next(Duration::from_millis(10)));
        assert!(matches!(result, Err(KinematicsError::Numerical(_))));
        assert_eq!(controller.configuration(), q0.as_slice());
    }

    #[test]
    fn test_reference_starts_at_initial_pose() {
        let (tree, chain) = arm();
        let controller = WorkspaceController::new(
            &tree, chain, WorkspaceOptions::new(), SolverKind::Nullspace, vec![0.3, 0.6]).unwrap();
        let e0 = *controller.initial_pose();
        let reference = controller.reference_pose(0.0);
        assert!((reference.translation.vector - e0.translation.vector).norm() < 1e-12);
        assert!(reference.rotation.angle_to(&e0.rotation) < 1e-12);
    }

    #[test]
    fn test_rejects_foreign_chain() {
        let (tree, _) = arm();
        let mut bigger = KinematicTree::new();
        bigger.add_fixed("x", None, Pose::identity()).unwrap();
        bigger.add_fixed("y", Some("x"), Pose::identity()).unwrap();
        bigger.add_fixed("z", Some("y"), Pose::identity()).unwrap();
        bigger.add_frame("w", Some("z"), Pose::identity(),
                         Some(JointSpec::revolute("jw", Vector3::z()))).unwrap();
        let foreign = SubChain::chain_by_name(&bigger, None, "w").unwrap();
        let result = WorkspaceController::new(
            &tree, foreign, WorkspaceOptions::new(), SolverKind::Dls, vec![0.0, 0.0]);
        assert!(matches!(result, Err(KinematicsError::InvalidTree(_))));
    }

    #[test]
    fn test_rejects_wrong_configuration() {
        let (tree, chain) = arm();
        let result = WorkspaceController::new(
            &tree, chain, WorkspaceOptions::new(), SolverKind::Dls, vec![0.0]);
        assert!(matches!(result, Err(KinematicsError::InvalidLength { .. })));
    }
}
