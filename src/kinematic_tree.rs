//! Kinematic tree of named frames connected by joints. The tree is built once (by hand,
//! from the built-in robot models or from URDF) and is only queried afterwards: configuration
//! and frame counts, name resolution, forward kinematics and projection of the configuration
//! vector to the subset of joints and back.

use std::collections::HashMap;
use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use crate::kinematic_traits::{ConfigId, FrameId, Pose};
use crate::kinematics_error::{check_length, KinematicsError};

/// How the joint moves the child frame relative to the parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointMotion {
    /// Rotation around the axis, configuration value in radians.
    Revolute,
    /// Translation along the axis, configuration value in meters.
    Prismatic,
}

/// Position limits of the joint. Only used to find the center of the joint range, the limits
/// are never enforced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub lower: f64,
    pub upper: f64,
}

impl JointLimits {
    pub fn new(lower: f64, upper: f64) -> Self {
        JointLimits { lower, upper }
    }

    /// Middle of the allowed range
    pub fn center(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }
}

/// Joint description used when adding the frame.
#[derive(Debug, Clone)]
pub struct JointSpec {
    pub name: String,
    pub motion: JointMotion,
    pub axis: Vector3<f64>,
    pub limits: Option<JointLimits>,
}

impl JointSpec {
    pub fn revolute(name: &str, axis: Vector3<f64>) -> Self {
        JointSpec { name: name.to_string(), motion: JointMotion::Revolute, axis, limits: None }
    }

    pub fn prismatic(name: &str, axis: Vector3<f64>) -> Self {
        JointSpec { name: name.to_string(), motion: JointMotion::Prismatic, axis, limits: None }
    }

    pub fn with_limits(mut self, lower: f64, upper: f64) -> Self {
        self.limits = Some(JointLimits::new(lower, upper));
        self
    }
}

/// Joint that moves the frame, owning exactly one configuration variable.
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub motion: JointMotion,
    pub axis: Unit<Vector3<f64>>,
    pub config: ConfigId,
    pub limits: Option<JointLimits>,
}

impl Joint {
    /// Transform the joint contributes for the given configuration value.
    pub fn motion_pose(&self, value: f64) -> Pose {
        match self.motion {
            JointMotion::Revolute => Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&self.axis, value),
            ),
            JointMotion::Prismatic => Isometry3::from_parts(
                Translation3::from(self.axis.into_inner() * value),
                UnitQuaternion::identity(),
            ),
        }
    }
}

/// Frame of the tree. Its pose relative to the parent is `offset * joint motion`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub name: String,

    /// Parent frame, None for frames attached to the global root.
    pub parent: Option<FrameId>,

    /// Fixed transform from the parent frame, at zero joint value.
    pub offset: Pose,

    /// None for fixed frames.
    pub joint: Option<Joint>,
}

/// Relative (frame to parent) and absolute (frame to root) poses of every frame.
#[derive(Debug, Clone, Default)]
pub struct TransformSet {
    pub relative: Vec<Pose>,
    pub absolute: Vec<Pose>,
}

impl TransformSet {
    /// Transform set for `n` frames, all at identity.
    pub fn new(n: usize) -> Self {
        TransformSet {
            relative: vec![Pose::identity(); n],
            absolute: vec![Pose::identity(); n],
        }
    }

    pub fn len(&self) -> usize {
        self.absolute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.absolute.is_empty()
    }

    fn resize(&mut self, n: usize) {
        self.relative.resize(n, Pose::identity());
        self.absolute.resize(n, Pose::identity());
    }
}

/// Tree of frames, stored so that every parent precedes all its children.
#[derive(Debug, Clone, Default)]
pub struct KinematicTree {
    frames: Vec<Frame>,

    /// Frame that owns each configuration variable
    configs: Vec<FrameId>,

    frame_names: HashMap<String, FrameId>,
    config_names: HashMap<String, ConfigId>,
}

impl KinematicTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the frame that does not move relative to its parent.
    pub fn add_fixed(&mut self, name: &str, parent: Option<&str>, offset: Pose)
                     -> Result<FrameId, KinematicsError> {
        self.add_frame(name, parent, offset, None)
    }

    /// Add the frame under the given parent (None for the global root). The parent must
    /// already be in the tree, this keeps frames in parent-before-child order. If the joint
    /// is given, it receives the next configuration index.
    pub fn add_frame(&mut self, name: &str, parent: Option<&str>, offset: Pose,
                     joint: Option<JointSpec>) -> Result<FrameId, KinematicsError> {
        if self.frame_names.contains_key(name) {
            return Err(KinematicsError::InvalidTree(format!("Duplicate frame name: {}", name)));
        }
        let parent = match parent {
            Some(parent_name) => Some(self.frame_id(parent_name)?),
            None => None,
        };

        let joint = match joint {
            Some(spec) => Some(self.make_joint(spec)?),
            None => None,
        };

        let id = self.frames.len();
        if let Some(joint) = &joint {
            self.config_names.insert(joint.name.clone(), joint.config);
            self.configs.push(id);
        }
        self.frame_names.insert(name.to_string(), id);
        self.frames.push(Frame {
            name: name.to_string(),
            parent,
            offset,
            joint,
        });
        Ok(id)
    }

    fn make_joint(&self, spec: JointSpec) -> Result<Joint, KinematicsError> {
        if self.config_names.contains_key(&spec.name) {
            return Err(KinematicsError::InvalidTree(format!("Duplicate joint name: {}", spec.name)));
        }
        let axis = Unit::try_new(spec.axis, 1E-9).ok_or_else(|| KinematicsError::InvalidTree(
            format!("Joint {} has zero axis", spec.name)))?;
        if let Some(limits) = spec.limits {
            if !(limits.lower <= limits.upper) {
                return Err(KinematicsError::InvalidTree(format!(
                    "Joint {} has lower limit {} above upper limit {}",
                    spec.name, limits.lower, limits.upper)));
            }
        }
        Ok(Joint {
            name: spec.name,
            motion: spec.motion,
            axis,
            config: self.configs.len(),
            limits: spec.limits,
        })
    }

    /// Number of configuration variables (movable joints)
    pub fn config_count(&self) -> usize {
        self.configs.len()
    }

    /// Number of frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id]
    }

    pub fn frame_id(&self, name: &str) -> Result<FrameId, KinematicsError> {
        self.frame_names.get(name).copied()
            .ok_or_else(|| KinematicsError::NotFound(format!("frame {}", name)))
    }

    pub fn config_id(&self, name: &str) -> Result<ConfigId, KinematicsError> {
        self.config_names.get(name).copied()
            .ok_or_else(|| KinematicsError::NotFound(format!("joint {}", name)))
    }

    /// Resolve several joint names at once, keeping the order.
    pub fn config_ids(&self, names: &[&str]) -> Result<Vec<ConfigId>, KinematicsError> {
        names.iter().map(|name| self.config_id(name)).collect()
    }

    /// The joint that owns the given configuration variable.
    pub fn joint(&self, config: ConfigId) -> &Joint {
        let frame = &self.frames[self.configs[config]];
        frame.joint.as_ref().expect("configuration always belongs to a movable frame")
    }

    pub fn config_name(&self, config: ConfigId) -> &str {
        &self.joint(config).name
    }

    pub fn limits(&self, config: ConfigId) -> Option<JointLimits> {
        self.joint(config).limits
    }

    /// Compute relative and absolute poses of all frames for the configuration `q`.
    pub fn transforms(&self, q: &[f64]) -> Result<TransformSet, KinematicsError> {
        let mut tf = TransformSet::new(self.frame_count());
        self.transforms_into(q, &mut tf)?;
        Ok(tf)
    }

    /// Same as [KinematicTree::transforms] but reuses the buffers of `tf`.
    pub fn transforms_into(&self, q: &[f64], tf: &mut TransformSet) -> Result<(), KinematicsError> {
        check_length(self.config_count(), q.len())?;
        tf.resize(self.frame_count());

        for (i, frame) in self.frames.iter().enumerate() {
            let relative = match &frame.joint {
                Some(joint) => frame.offset * joint.motion_pose(q[joint.config]),
                None => frame.offset,
            };
            // Parent index is always less than i, its absolute pose is already known.
            tf.absolute[i] = match frame.parent {
                Some(parent) => tf.absolute[parent] * relative,
                None => relative,
            };
            tf.relative[i] = relative;
        }
        Ok(())
    }

    /// Read the named entries of the configuration vector `q` into `subset`, in the order
    /// of `ids`.
    pub fn config_get(&self, ids: &[ConfigId], q: &[f64], subset: &mut [f64]) -> Result<(), KinematicsError> {
        check_length(self.config_count(), q.len())?;
        check_length(ids.len(), subset.len())?;
        for (value, &id) in subset.iter_mut().zip(ids) {
            *value = *q.get(id).ok_or_else(|| KinematicsError::NotFound(format!("config {}", id)))?;
        }
        Ok(())
    }

    /// Write `subset` back into the named entries of `q`. Other entries are untouched.
    pub fn config_set(&self, ids: &[ConfigId], subset: &[f64], q: &mut [f64]) -> Result<(), KinematicsError> {
        check_length(self.config_count(), q.len())?;
        check_length(ids.len(), subset.len())?;
        for (&value, &id) in subset.iter().zip(ids) {
            let slot = q.get_mut(id).ok_or_else(|| KinematicsError::NotFound(format!("config {}", id)))?;
            *slot = value;
        }
        Ok(())
    }
}
