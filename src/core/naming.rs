//! core::naming
//!
//! Naming rules for profiles, pids and file configurations.
//!
//! Versions are validated by [`crate::core::types::VersionName`]; the names
//! here map onto paths inside a version's working tree, so they are checked
//! before any path is built from them.

use thiserror::Error;

/// Errors from name validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("invalid profile name '{name}': {reason}")]
    InvalidProfile { name: String, reason: &'static str },

    #[error("invalid pid '{name}': {reason}")]
    InvalidPid { name: String, reason: &'static str },

    #[error("invalid file configuration name '{name}': {reason}")]
    InvalidFileName { name: String, reason: &'static str },
}

/// Check a single path segment. Returns the reason it is rejected, if any.
fn segment_problem(segment: &str) -> Option<&'static str> {
    if segment.is_empty() {
        return Some("must not be empty");
    }
    if segment == "." || segment == ".." {
        return Some("must not be a relative directory reference");
    }
    if segment.starts_with('.') {
        return Some("must not start with '.'");
    }
    if segment.contains('/') || segment.contains('\\') {
        return Some("must not contain path separators");
    }
    if segment.chars().any(|c| c.is_control()) {
        return Some("must not contain control characters");
    }
    None
}

/// Validate a profile name.
///
/// # Example
///
/// ```
/// use fleetconf::core::naming::validate_profile;
///
/// assert!(validate_profile("web").is_ok());
/// assert!(validate_profile("mq-broker").is_ok());
/// assert!(validate_profile("../etc").is_err());
/// assert!(validate_profile("a/b").is_err());
/// ```
pub fn validate_profile(name: &str) -> Result<(), NameError> {
    match segment_problem(name) {
        Some(reason) => Err(NameError::InvalidProfile {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Validate a pid (configuration unit identifier).
pub fn validate_pid(name: &str) -> Result<(), NameError> {
    match segment_problem(name) {
        Some(reason) => Err(NameError::InvalidPid {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Validate a file configuration name.
///
/// File names are relative paths inside a profile directory, `/`-separated.
///
/// # Example
///
/// ```
/// use fleetconf::core::naming::validate_file_name;
///
/// assert!(validate_file_name("my.pid.properties").is_ok());
/// assert!(validate_file_name("jetty/jetty.xml").is_ok());
/// assert!(validate_file_name("/etc/passwd").is_err());
/// assert!(validate_file_name("a/../b").is_err());
/// ```
pub fn validate_file_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::InvalidFileName {
            name: name.to_string(),
            reason: "must not be empty",
        });
    }
    if name.starts_with('/') {
        return Err(NameError::InvalidFileName {
            name: name.to_string(),
            reason: "must be relative",
        });
    }
    for segment in name.split('/') {
        if let Some(reason) = segment_problem(segment) {
            return Err(NameError::InvalidFileName {
                name: name.to_string(),
                reason,
            });
        }
    }
    Ok(())
}
