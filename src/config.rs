//! Reading the controller setup from YAML file (optional)

use std::path::Path;
use regex::Regex;
use tracing::debug;
use yaml_rust2::{Yaml, YamlLoader};
use crate::kinematic_tree::KinematicTree;
use crate::kinematics_error::KinematicsError;
use crate::options::{LinearSolver, SolverKind, WorkspaceOptions};
use crate::robots::{SEVEN_DOF_JOINTS, SEVEN_DOF_ROOT, SEVEN_DOF_START, SEVEN_DOF_TIP};
use crate::utils::deg;

/// Everything the controller needs besides the kinematic tree.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupConfig {
    /// Root frame of the controlled chain, None for the global root.
    pub root: Option<String>,

    /// Tip frame of the controlled chain.
    pub tip: String,

    pub solver: SolverKind,

    pub options: WorkspaceOptions,

    /// Initial joint values by joint name, in radians (or meters). Joints not listed start at zero.
    pub initial_configuration: Vec<(String, f64)>,
}

impl StartupConfig {
    /// Configuration for the built-in seven joint arm.
    pub fn seven_dof_arm() -> Self {
        StartupConfig {
            root: Some(SEVEN_DOF_ROOT.to_string()),
            tip: SEVEN_DOF_TIP.to_string(),
            solver: SolverKind::Recursive,
            options: WorkspaceOptions::new(),
            initial_configuration: SEVEN_DOF_JOINTS.iter()
                .zip(SEVEN_DOF_START)
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    /// Read the configuration from YAML file. YAML file like this is supported:
    /// ```yaml
    /// workspace_control:
    ///   root: torso
    ///   tip: wrist
    ///   solver: recursive
    ///   options:
    ///     k_dls: 5e-5
    ///     s2min: 5e-3
    ///     gain_np: 1
    ///     gain_angle: 5
    ///     gain_trans: 5
    ///     tau_np: 0.1
    ///     linear_solver: lu
    ///   initial_configuration:
    ///     s0: deg(-45)
    ///     e0: deg(180)
    ///     e1: 1.5708
    /// ```
    /// Only `tip` is required. Missing options take their default values, missing `root`
    /// means the global root. Angles can be given as `deg(angle)`, otherwise they are radians.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, KinematicsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Same as [StartupConfig::from_yaml_file] but takes the YAML content.
    pub fn from_yaml_str(contents: &str) -> Result<Self, KinematicsError> {
        let docs = YamlLoader::load_from_str(contents)
            .map_err(|e| KinematicsError::ParseError(e.to_string()))?;
        let doc = docs.first()
            .ok_or_else(|| KinematicsError::ParseError("Empty YAML document".to_string()))?;
        let section = &doc["workspace_control"];
        if section.is_badvalue() {
            return Err(KinematicsError::MissingField("workspace_control".to_string()));
        }

        let root = optional_string(&section["root"], "root")?;
        let tip = optional_string(&section["tip"], "tip")?
            .ok_or_else(|| KinematicsError::MissingField("tip".to_string()))?;
        let solver = match optional_string(&section["solver"], "solver")? {
            Some(name) => name.parse()?,
            None => SolverKind::Recursive,
        };
        let options = read_options(&section["options"])?;

        let mut initial_configuration = Vec::new();
        match &section["initial_configuration"] {
            Yaml::BadValue | Yaml::Null => {}
            Yaml::Hash(hash) => {
                for (key, value) in hash {
                    let name = key.as_str().ok_or_else(|| KinematicsError::ParseError(
                        format!("Joint name must be a string: {:?}", key)))?;
                    initial_configuration.push((name.to_string(), parse_angle(value)?));
                }
            }
            other => return Err(KinematicsError::ParseError(
                format!("initial_configuration must be a mapping, got {:?}", other))),
        }

        let config = StartupConfig { root, tip, solver, options, initial_configuration };
        debug!("Startup configuration: {:?}", config);
        Ok(config)
    }

    /// Convert to string yaml representation, readable by [StartupConfig::from_yaml_str].
    pub fn to_yaml(&self) -> String {
        let mut yaml = String::from("workspace_control:\n");
        if let Some(root) = &self.root {
            yaml.push_str(&format!("  root: {}\n", root));
        }
        yaml.push_str(&format!("  tip: {}\n  solver: {}\n", self.tip, self.solver));
        for line in self.options.to_yaml().lines() {
            yaml.push_str(&format!("  {}\n", line));
        }
        if !self.initial_configuration.is_empty() {
            yaml.push_str("  initial_configuration:\n");
            for (name, value) in &self.initial_configuration {
                yaml.push_str(&format!("    {}: {}\n", name, deg(value)));
            }
        }
        yaml
    }

    /// Full configuration vector of the tree with the initial joint values applied.
    pub fn initial_configuration(&self, tree: &KinematicTree) -> Result<Vec<f64>, KinematicsError> {
        let mut q = vec![0.0; tree.config_count()];
        self.apply_initial(tree, &mut q)?;
        Ok(q)
    }

    /// Write the initial joint values into `q`, leaving joints not listed untouched.
    pub fn apply_initial(&self, tree: &KinematicTree, q: &mut [f64]) -> Result<(), KinematicsError> {
        for (name, value) in &self.initial_configuration {
            let id = tree.config_id(name)?;
            tree.config_set(&[id], &[*value], q)?;
        }
        Ok(())
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self::seven_dof_arm()
    }
}

fn read_options(yaml: &Yaml) -> Result<WorkspaceOptions, KinematicsError> {
    let mut options = WorkspaceOptions::new();
    match yaml {
        Yaml::BadValue | Yaml::Null => return Ok(options),
        Yaml::Hash(_) => {}
        other => return Err(KinematicsError::ParseError(
            format!("options must be a mapping, got {:?}", other))),
    }

    for (name, slot) in [
        ("k_dls", &mut options.k_dls),
        ("s2min", &mut options.s2min),
        ("gain_np", &mut options.gain_np),
        ("gain_angle", &mut options.gain_angle),
        ("gain_trans", &mut options.gain_trans),
        ("tau_np", &mut options.tau_np),
    ] {
        if let Some(value) = optional_number(&yaml[name], name)? {
            *slot = value;
        }
    }
    if let Some(linear_solver) = optional_string(&yaml["linear_solver"], "linear_solver")? {
        options.linear_solver = linear_solver.parse::<LinearSolver>()?;
    }
    options.validate()?;
    Ok(options)
}

fn optional_string(yaml: &Yaml, field: &str) -> Result<Option<String>, KinematicsError> {
    match yaml {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::String(value) => Ok(Some(value.clone())),
        other => Err(KinematicsError::ParseError(
            format!("'{}' must be a string, got {:?}", field, other))),
    }
}

fn optional_number(yaml: &Yaml, field: &str) -> Result<Option<f64>, KinematicsError> {
    match yaml {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Integer(value) => Ok(Some(*value as f64)),
        Yaml::Real(_) => yaml.as_f64().map(Some).ok_or_else(|| KinematicsError::ParseError(
            format!("'{}' is not a number", field))),
        other => Err(KinematicsError::ParseError(
            format!("'{}' must be a number, got {:?}", field, other))),
    }
}

/// Joint value in radians: plain number, or `deg(angle)` in degrees.
fn parse_angle(yaml: &Yaml) -> Result<f64, KinematicsError> {
    match yaml {
        Yaml::Integer(value) => Ok(*value as f64),
        Yaml::Real(_) => yaml.as_f64()
            .ok_or_else(|| KinematicsError::WrongAngle(format!("{:?}", yaml))),
        Yaml::String(value) => {
            let re = Regex::new(r"^deg\(\s*([-+]?\d+(\.\d+)?)\s*\)$")
                .map_err(|_| KinematicsError::ParseError("Invalid regex pattern".to_string()))?;
            let caps = re.captures(value.trim())
                .ok_or_else(|| KinematicsError::WrongAngle(value.clone()))?;
            let degrees: f64 = caps[1].parse()
                .map_err(|_| KinematicsError::WrongAngle(value.clone()))?;
            Ok(degrees.to_radians())
        }
        other => Err(KinematicsError::WrongAngle(format!("{:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use crate::robots::seven_dof_arm;

    const FULL: &str = "
workspace_control:
  root: torso
  tip: wrist
  solver: nullspace
  options:
    k_dls: 1e-4
    s2min: 0.01
    gain_np: 2
    gain_angle: 3.5
    tau_np: 0.25
    linear_solver: svd
  initial_configuration:
    s0: deg(-45)
    e0: deg(180)
    e1: 1.5
";

    #[test]
    fn test_full() {
        let config = StartupConfig::from_yaml_str(FULL).unwrap();
        assert_eq!(config.root.as_deref(), Some("torso"));
        assert_eq!(config.tip, "wrist");
        assert_eq!(config.solver, SolverKind::Nullspace);
        assert_eq!(config.options.k_dls, 1e-4);
        assert_eq!(config.options.s2min, 0.01);
        assert_eq!(config.options.gain_np, 2.0);
        assert_eq!(config.options.gain_angle, 3.5);
        assert_eq!(config.options.gain_trans, 5.0); // default
        assert_eq!(config.options.tau_np, 0.25);
        assert_eq!(config.options.linear_solver, LinearSolver::Svd);

        let names: Vec<&str> = config.initial_configuration.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["s0", "e0", "e1"]);
        assert!((config.initial_configuration[0].1 + PI / 4.0).abs() < 1e-12);
        assert!((config.initial_configuration[1].1 - PI).abs() < 1e-12);
        assert_eq!(config.initial_configuration[2].1, 1.5);
    }

    #[test]
    fn test_minimal() {
        let config = StartupConfig::from_yaml_str("workspace_control:\n  tip: hand\n").unwrap();
        assert_eq!(config.root, None);
        assert_eq!(config.solver, SolverKind::Recursive);
        assert_eq!(config.options, WorkspaceOptions::new());
        assert!(config.initial_configuration.is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(StartupConfig::from_yaml_str("other: 1\n"),
                         Err(KinematicsError::MissingField(_))));
        assert!(matches!(StartupConfig::from_yaml_str("workspace_control:\n  root: torso\n"),
                         Err(KinematicsError::MissingField(_))));
        assert!(StartupConfig::from_yaml_str("workspace_control:\n  tip: w\n  solver: lc3\n").is_err());
        assert!(StartupConfig::from_yaml_str(
            "workspace_control:\n  tip: w\n  options:\n    gain_np: -1\n").is_err());
        assert!(matches!(StartupConfig::from_yaml_str(
            "workspace_control:\n  tip: w\n  initial_configuration:\n    s0: deg(x)\n"),
                         Err(KinematicsError::WrongAngle(_))));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = StartupConfig::seven_dof_arm();
        let yaml = config.to_yaml();
        let parsed = StartupConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.root, config.root);
        assert_eq!(parsed.tip, config.tip);
        assert_eq!(parsed.solver, config.solver);
        assert_eq!(parsed.options, config.options);
        for ((n1, v1), (n2, v2)) in parsed.initial_configuration.iter().zip(&config.initial_configuration) {
            assert_eq!(n1, n2);
            // deg() keeps four decimals
            assert!((v1 - v2).abs() < 1e-5, "{}: {} vs {}", n1, v1, v2);
        }
    }

    #[test]
    fn test_apply_initial() {
        let tree = seven_dof_arm();
        let config = StartupConfig::from_yaml_str(FULL).unwrap();
        let q = config.initial_configuration(&tree).unwrap();
        assert!((q[0] + PI / 4.0).abs() < 1e-12);
        assert_eq!(q[1], 0.0);
        assert_eq!(q[3], 1.5);

        let unknown = StartupConfig {
            initial_configuration: vec![("elbow".to_string(), 0.0)],
            ..StartupConfig::seven_dof_arm()
        };
        assert!(matches!(unknown.initial_configuration(&tree), Err(KinematicsError::NotFound(_))));
    }
}
