//! Error handling for tree construction, configuration and the per-frame solve

use std::io;

/// Unified error for building the kinematic tree, reading the startup configuration
/// and running the controller.
#[derive(Debug)]
pub enum KinematicsError {
    IoError(io::Error),
    ParseError(String),
    XmlProcessingError(String),
    WrongAngle(String),
    MissingField(String),
    /// A frame or joint name that is not present in the tree.
    NotFound(String),
    /// The tip frame does not descend from the requested root.
    NoPath { root: String, tip: String },
    InvalidLength { expected: usize, found: usize },
    InvalidTree(String),
    /// Internal failure of the differential solve. Not expected in normal operation,
    /// near-singular configurations are handled by damping.
    Numerical(String),
}

impl std::fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            KinematicsError::IoError(ref err) =>
                write!(f, "IO Error: {}", err),
            KinematicsError::ParseError(ref msg) =>
                write!(f, "Parse Error: {}", msg),
            KinematicsError::XmlProcessingError(ref err) =>
                write!(f, "XML Processing Error: {}", err),
            KinematicsError::WrongAngle(ref msg) =>
                write!(f, "Wrong angle representation: {}", msg),
            KinematicsError::MissingField(ref field) =>
                write!(f, "Missing Field: {}", field),
            KinematicsError::NotFound(ref name) =>
                write!(f, "Not found: {}", name),
            KinematicsError::NoPath { ref root, ref tip } =>
                write!(f, "No path from {} to {}", root, tip),
            KinematicsError::InvalidLength { expected, found } =>
                write!(f, "Invalid Length: expected {}, found {}", expected, found),
            KinematicsError::InvalidTree(ref msg) =>
                write!(f, "Invalid kinematic tree: {}", msg),
            KinematicsError::Numerical(ref msg) =>
                write!(f, "Numerical failure: {}", msg),
        }
    }
}

impl std::error::Error for KinematicsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KinematicsError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for KinematicsError {
    fn from(err: io::Error) -> Self {
        KinematicsError::IoError(err)
    }
}

/// Checks that a slice has the length the caller expects.
pub(crate) fn check_length(expected: usize, found: usize) -> Result<(), KinematicsError> {
    if expected != found {
        return Err(KinematicsError::InvalidLength { expected, found });
    }
    Ok(())
}
