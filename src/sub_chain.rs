//! Kinematic subchain: the joints between the root frame and the end-effector frame that the
//! controller is allowed to move.

use crate::kinematic_traits::{ConfigId, FrameId};
use crate::kinematic_tree::KinematicTree;
use crate::kinematics_error::KinematicsError;

/// Ordered path through the tree from the root (exclusive) to the tip (inclusive).
#[derive(Debug, Clone, PartialEq)]
pub struct SubChain {
    root: Option<FrameId>,
    tip: FrameId,

    /// Frames on the path, root to tip
    frames: Vec<FrameId>,

    /// Configuration variables of movable frames on the path, root to tip
    configs: Vec<ConfigId>,
}

impl SubChain {
    /// Build the chain from `root` (None for the global root) to `tip`. Fails with
    /// [KinematicsError::NoPath] if the tip does not descend from the root.
    pub fn chain(tree: &KinematicTree, root: Option<FrameId>, tip: FrameId) -> Result<Self, KinematicsError> {
        let no_path = || KinematicsError::NoPath {
            root: root.map_or_else(|| "<root>".to_string(), |r| frame_name(tree, r)),
            tip: frame_name(tree, tip),
        };
        if tip >= tree.frame_count() || root.is_some_and(|r| r >= tree.frame_count()) {
            return Err(no_path());
        }

        // Walk from the tip up, collecting frames until the root is reached.
        let mut frames = Vec::new();
        let mut current = Some(tip);
        while current != root {
            match current {
                Some(frame) => {
                    frames.push(frame);
                    current = tree.frame(frame).parent;
                }
                // Reached the global root without meeting the requested root.
                None => return Err(no_path()),
            }
        }
        if frames.is_empty() {
            // Tip is the root itself
            return Err(no_path());
        }
        frames.reverse();

        let configs = frames.iter()
            .filter_map(|&f| tree.frame(f).joint.as_ref().map(|j| j.config))
            .collect();

        Ok(SubChain { root, tip, frames, configs })
    }

    /// Same as [SubChain::chain] but takes frame names.
    pub fn chain_by_name(tree: &KinematicTree, root: Option<&str>, tip: &str) -> Result<Self, KinematicsError> {
        let root = match root {
            Some(name) => Some(tree.frame_id(name)?),
            None => None,
        };
        let tip = tree.frame_id(tip)?;
        Self::chain(tree, root, tip)
    }

    pub fn root(&self) -> Option<FrameId> {
        self.root
    }

    /// The end-effector frame
    pub fn tip(&self) -> FrameId {
        self.tip
    }

    pub fn frames(&self) -> &[FrameId] {
        &self.frames
    }

    /// Configuration indices of the chain joints in root-to-tip order.
    pub fn configs(&self) -> &[ConfigId] {
        &self.configs
    }

    /// Number of joints in the chain
    pub fn config_count(&self) -> usize {
        self.configs.len()
    }
}

fn frame_name(tree: &KinematicTree, id: FrameId) -> String {
    if id < tree.frame_count() {
        tree.frame(id).name.clone()
    } else {
        format!("#{}", id)
    }
}
