//! Builds the kinematic tree from URDF (optional)

extern crate sxd_document;

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::read_to_string;
use std::path::Path;
use nalgebra::Vector3;
use regex::Regex;
use sxd_document::{dom, parser, QName};
use tracing::{debug, warn};
use crate::kinematic_traits::Pose;
use crate::kinematic_tree::{JointSpec, KinematicTree};
use crate::kinematics_error::KinematicsError;
use crate::utils::origin;

/// Read the kinematic tree from the URDF file. See [from_urdf].
///
/// # Example
/// ```
/// let tree = rs_workspace_control::urdf::from_urdf_file("src/tests/data/seven_dof_arm.urdf")
///     .expect("URDF file must be readable");
/// assert_eq!(tree.config_count(), 7);
/// ```
pub fn from_urdf_file<P: AsRef<Path>>(path: P) -> Result<KinematicTree, KinematicsError> {
    let xml_content = read_to_string(path)?;
    from_urdf(&xml_content)
}

/// Parses URDF XML content into the kinematic tree.
///
/// Every link becomes the frame of the same name. The root link (the only link that is not
/// a child of any joint) is attached to the global root with identity offset; every other
/// link is attached to the parent link of its joint, with the joint origin as the offset.
/// Revolute and prismatic joints carry their limits, continuous joints have none, fixed
/// joints make fixed frames. Configuration indices follow breadth first order from the root.
///
/// # Errors
/// - `XmlProcessingError` if the XML cannot be parsed or is not a robot description.
/// - `MissingField` if the joint lacks name, type, parent or child.
/// - `NotFound` if a joint refers to an undeclared link.
/// - `InvalidTree` if there is no single root or the links do not form a tree.
/// - `WrongAngle` or `ParseError` on unreadable numbers and unsupported joint types.
pub fn from_urdf(xml_content: &str) -> Result<KinematicTree, KinematicsError> {
    let package = parser::parse(xml_content)
        .map_err(|e| KinematicsError::XmlProcessingError(format!("Failed to parse XML: {}", e)))?;
    let document = package.as_document();

    let robot = document.root().children().into_iter()
        .find_map(|e| e.element())
        .ok_or_else(|| KinematicsError::XmlProcessingError("No root element found".to_string()))?;
    if robot.name() != QName::new("robot") {
        return Err(KinematicsError::XmlProcessingError(
            format!("Root element must be <robot>, found <{}>", robot.name().local_part())));
    }

    let mut links = Vec::new();
    let mut joints = Vec::new();
    for child in robot.children().into_iter().filter_map(|e| e.element()) {
        if child.name() == QName::new("link") {
            links.push(required_attribute(child, "name", "link")?);
        } else if child.name() == QName::new("joint") {
            joints.push(read_joint(child)?);
        }
    }

    let tree = assemble(&links, joints)?;
    debug!("URDF: {} links, {} configuration variables", tree.frame_count(), tree.config_count());
    Ok(tree)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JointType {
    Revolute,
    Continuous,
    Prismatic,
    Fixed,
}

#[derive(Debug)]
struct JointData {
    name: String,
    joint_type: JointType,
    parent: String,
    child: String,
    origin: Pose,
    axis: Vector3<f64>,
    limits: Option<(f64, f64)>,
}

impl JointData {
    fn spec(&self) -> Option<JointSpec> {
        let spec = match self.joint_type {
            JointType::Fixed => return None,
            JointType::Revolute | JointType::Continuous => JointSpec::revolute(&self.name, self.axis),
            JointType::Prismatic => JointSpec::prismatic(&self.name, self.axis),
        };
        match (self.joint_type, self.limits) {
            (JointType::Continuous, _) | (_, None) => Some(spec),
            (_, Some((lower, upper))) => Some(spec.with_limits(lower, upper)),
        }
    }
}

/// Add links to the tree so that every parent comes before its children.
fn assemble(links: &[String], joints: Vec<JointData>) -> Result<KinematicTree, KinematicsError> {
    let declared: HashSet<&str> = links.iter().map(String::as_str).collect();
    if declared.len() != links.len() {
        return Err(KinematicsError::InvalidTree("Duplicate link name".to_string()));
    }

    let mut children: HashMap<&str, Vec<&JointData>> = HashMap::new();
    let mut has_parent: HashSet<&str> = HashSet::new();
    for joint in &joints {
        for link in [&joint.parent, &joint.child] {
            if !declared.contains(link.as_str()) {
                return Err(KinematicsError::NotFound(
                    format!("Link {} of joint {}", link, joint.name)));
            }
        }
        if !has_parent.insert(joint.child.as_str()) {
            return Err(KinematicsError::InvalidTree(
                format!("Link {} is the child of more than one joint", joint.child)));
        }
        children.entry(joint.parent.as_str()).or_default().push(joint);
    }

    let roots: Vec<&str> = links.iter().map(String::as_str)
        .filter(|link| !has_parent.contains(link))
        .collect();
    let root = match roots.as_slice() {
        [root] => *root,
        [] => return Err(KinematicsError::InvalidTree("No root link (cycle in joints?)".to_string())),
        _ => return Err(KinematicsError::InvalidTree(format!("Multiple root links: {:?}", roots))),
    };

    let mut tree = KinematicTree::new();
    tree.add_fixed(root, None, Pose::identity())?;
    let mut queue = VecDeque::from([root]);
    while let Some(link) = queue.pop_front() {
        for joint in children.get(link).into_iter().flatten() {
            tree.add_frame(&joint.child, Some(joint.parent.as_str()), joint.origin, joint.spec())?;
            queue.push_back(joint.child.as_str());
        }
    }

    if tree.frame_count() != links.len() {
        // Only possible if some links form a cycle detached from the root
        return Err(KinematicsError::InvalidTree(format!(
            "Only {} of {} links are reachable from the root link {}",
            tree.frame_count(), links.len(), root)));
    }
    Ok(tree)
}

fn required_attribute(element: dom::Element, attribute: &str, what: &str) -> Result<String, KinematicsError> {
    element.attribute(attribute)
        .map(|attr| attr.value().to_string())
        .ok_or_else(|| KinematicsError::MissingField(format!("{} attribute of <{}>", attribute, what)))
}

fn child_element<'d>(element: dom::Element<'d>, name: &str) -> Option<dom::Element<'d>> {
    let tag = QName::new(name);
    element.children().into_iter()
        .find_map(|e| e.element().filter(|el| el.name() == tag))
}

fn read_joint(element: dom::Element) -> Result<JointData, KinematicsError> {
    let name = required_attribute(element, "name", "joint")?;
    let joint_type = match required_attribute(element, "type", "joint")?.as_str() {
        "revolute" => JointType::Revolute,
        "continuous" => JointType::Continuous,
        "prismatic" => JointType::Prismatic,
        "fixed" => JointType::Fixed,
        other => return Err(KinematicsError::ParseError(
            format!("Joint {} has unsupported type {}", name, other))),
    };

    let parent = child_element(element, "parent")
        .map(|e| required_attribute(e, "link", "parent"))
        .ok_or_else(|| KinematicsError::MissingField(format!("parent of joint {}", name)))??;
    let child = child_element(element, "child")
        .map(|e| required_attribute(e, "link", "child"))
        .ok_or_else(|| KinematicsError::MissingField(format!("child of joint {}", name)))??;

    let origin = match child_element(element, "origin") {
        Some(origin_element) => {
            let xyz = get_triple(origin_element, "xyz")?.unwrap_or([0.0; 3]);
            let rpy = get_triple(origin_element, "rpy")?.unwrap_or([0.0; 3]);
            origin(xyz, rpy)
        }
        None => Pose::identity(),
    };

    // URDF default axis is x
    let axis = match child_element(element, "axis") {
        Some(axis_element) => get_triple(axis_element, "xyz")?
            .map(Vector3::from)
            .unwrap_or_else(Vector3::x),
        None => Vector3::x(),
    };

    let limits = match child_element(element, "limit") {
        Some(limit_element) if joint_type != JointType::Continuous && joint_type != JointType::Fixed => {
            match get_limits(limit_element) {
                Ok(limits) => Some(limits),
                Err(e) => {
                    warn!("Joint limits defined but not readable for {}: {}", name, e);
                    None
                }
            }
        }
        _ => None,
    };

    Ok(JointData { name, joint_type, parent, child, origin, axis, limits })
}

/// Three whitespace separated values of the attribute, None if the attribute is absent.
fn get_triple(element: dom::Element, attribute: &str) -> Result<Option<[f64; 3]>, KinematicsError> {
    let Some(attr) = element.attribute(attribute) else {
        return Ok(None);
    };
    let values: Vec<f64> = attr.value().split_whitespace()
        .map(parse_angle)
        .collect::<Result<_, _>>()?;

    match values.as_slice() {
        [x, y, z] => Ok(Some([*x, *y, *z])),
        _ => Err(KinematicsError::ParseError(format!(
            "{} attribute does not contain exactly three values: {}", attribute, attr.value()))),
    }
}

fn parse_angle(attr_value: &str) -> Result<f64, KinematicsError> {
    // Regular expression to match the ${radians(<number>)} format that is common in xacro
    let re = Regex::new(r"^\$\{radians\((-?\d+(\.\d+)?)\)\}$")
        .map_err(|_| KinematicsError::ParseError("Invalid regex pattern".to_string()))?;

    // Check if the input matches the special format
    if let Some(caps) = re.captures(attr_value) {
        let degrees_str = caps.get(1)
            .ok_or_else(|| KinematicsError::WrongAngle(format!("Bad representation: {}", attr_value)))?
            .as_str();
        let degrees: f64 = degrees_str.parse()
            .map_err(|_| KinematicsError::WrongAngle(attr_value.to_string()))?;
        Ok(degrees.to_radians())
    } else {
        // Try to parse the input as a plain number in that case it is in radians
        let radians: f64 = attr_value.parse()
            .map_err(|_| KinematicsError::WrongAngle(attr_value.to_string()))?;
        Ok(radians)
    }
}

fn get_limits(element: dom::Element) -> Result<(f64, f64), KinematicsError> {
    let lower_attr = element.attribute("lower")
        .ok_or_else(|| KinematicsError::MissingField("lower limit not found".into()))?
        .value();
    let lower_limit = parse_angle(lower_attr)?;

    let upper_attr = element.attribute("upper")
        .ok_or_else(|| KinematicsError::MissingField("upper limit not found".into()))?
        .value();
    let upper_limit = parse_angle(upper_attr)?;

    Ok((lower_limit, upper_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematic_tree::JointMotion;

    const SIMPLE: &str = r#"
        <robot name="simple">
          <link name="base"/>
          <link name="arm"/>
          <link name="slider"/>
          <link name="tool"/>
          <joint name="tool_mount" type="fixed">
            <parent link="slider"/>
            <child link="tool"/>
            <origin xyz="0 0 0.1"/>
          </joint>
          <joint name="swing" type="revolute">
            <parent link="base"/>
            <child link="arm"/>
            <origin xyz="0 0 0.5" rpy="0 0 ${radians(90)}"/>
            <axis xyz="0 0 1"/>
            <limit lower="${radians(-90)}" upper="1.5" effort="10" velocity="1"/>
          </joint>
          <joint name="extend" type="prismatic">
            <parent link="arm"/>
            <child link="slider"/>
            <axis xyz="1 0 0"/>
            <limit lower="0" upper="0.3"/>
          </joint>
        </robot>"#;

    #[test]
    fn test_parse_angle() {
        assert!((parse_angle("${radians(90)}").unwrap() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((parse_angle("${radians(-45.5)}").unwrap() + 45.5_f64.to_radians()).abs() < 1e-12);
        assert_eq!(parse_angle("0.25").unwrap(), 0.25);
        assert!(matches!(parse_angle("ninety"), Err(KinematicsError::WrongAngle(_))));
    }

    #[test]
    fn test_simple_robot() {
        let tree = from_urdf(SIMPLE).unwrap();
        assert_eq!(tree.frame_count(), 4);
        assert_eq!(tree.config_count(), 2);

        // Parents come first even though the fixed joint is declared first
        assert_eq!(tree.frame_id("base").unwrap(), 0);
        assert!(tree.frame_id("slider").unwrap() < tree.frame_id("tool").unwrap());

        let swing = tree.joint(tree.config_id("swing").unwrap());
        assert_eq!(swing.motion, JointMotion::Revolute);
        let limits = swing.limits.unwrap();
        assert!((limits.lower + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(limits.upper, 1.5);

        let extend = tree.joint(tree.config_id("extend").unwrap());
        assert_eq!(extend.motion, JointMotion::Prismatic);

        // Arm is turned 90 degrees around z, so the slider extends along global y
        let tf = tree.transforms(&[0.0, 0.2]).unwrap();
        let tool = tf.absolute[tree.frame_id("tool").unwrap()].translation.vector;
        assert!((tool - Vector3::new(0.0, 0.2, 0.6)).norm() < 1e-12, "{:?}", tool);
    }

    #[test]
    fn test_continuous_has_no_limits() {
        let xml = r#"<robot name="r">
            <link name="a"/><link name="b"/>
            <joint name="spin" type="continuous">
              <parent link="a"/><child link="b"/>
              <limit lower="-1" upper="1"/>
            </joint></robot>"#;
        let tree = from_urdf(xml).unwrap();
        let spin = tree.joint(0);
        assert!(spin.limits.is_none());
        // Default axis
        assert_eq!(spin.axis.into_inner(), Vector3::x());
    }

    #[test]
    fn test_multiple_roots() {
        let xml = r#"<robot name="r"><link name="a"/><link name="b"/></robot>"#;
        assert!(matches!(from_urdf(xml), Err(KinematicsError::InvalidTree(_))));
    }

    #[test]
    fn test_detached_cycle() {
        let xml = r#"<robot name="r">
            <link name="root"/><link name="a"/><link name="b"/>
            <joint name="ab" type="fixed"><parent link="a"/><child link="b"/></joint>
            <joint name="ba" type="fixed"><parent link="b"/><child link="a"/></joint>
            </robot>"#;
        assert!(matches!(from_urdf(xml), Err(KinematicsError::InvalidTree(_))));
    }

    #[test]
    fn test_unknown_link() {
        let xml = r#"<robot name="r">
            <link name="a"/>
            <joint name="j" type="revolute"><parent link="a"/><child link="ghost"/></joint>
            </robot>"#;
        assert!(matches!(from_urdf(xml), Err(KinematicsError::NotFound(_))));
    }

    #[test]
    fn test_bad_documents() {
        assert!(matches!(from_urdf("<robot"), Err(KinematicsError::XmlProcessingError(_))));
        assert!(matches!(from_urdf("<scene/>"), Err(KinematicsError::XmlProcessingError(_))));
        let floating = r#"<robot name="r"><link name="a"/><link name="b"/>
            <joint name="j" type="floating"><parent link="a"/><child link="b"/></joint></robot>"#;
        assert!(matches!(from_urdf(floating), Err(KinematicsError::ParseError(_))));
        let orphan = r#"<robot name="r"><link name="a"/><link name="b"/>
            <joint name="j" type="fixed"><child link="b"/></joint></robot>"#;
        assert!(matches!(from_urdf(orphan), Err(KinematicsError::MissingField(_))));
    }
}
