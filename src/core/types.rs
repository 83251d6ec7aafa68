//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`VersionName`] - A configuration version, stored as one git branch
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated Git reference name
//! - [`Fingerprint`] - Hash over branch tips, used as the repository snapshot
//!
//! All of them validate on construction and serialize as plain strings.
//!
//! # Examples
//!
//! ```
//! use fleetconf::core::types::{Oid, RefName, VersionName};
//!
//! let version = VersionName::new("1.0").unwrap();
//! assert_eq!(version.as_str(), "1.0");
//!
//! let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
//! assert_eq!(oid.short(7), "abc123d");
//!
//! let refname = RefName::new("refs/heads/1.0").unwrap();
//! assert_eq!(refname.strip_prefix("refs/heads/"), Some("1.0"));
//!
//! assert!(VersionName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid version name: {0}")]
    InvalidVersionName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Conversions shared by the validated string newtypes.
macro_rules! string_newtype {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// Characters git never allows in a ref name.
const REF_FORBIDDEN_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];

/// Problems shared by branch and ref names, per `git check-ref-format`.
fn refname_problem(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("cannot be empty".into());
    }
    if name.ends_with('/') {
        return Some("cannot end with '/'".into());
    }
    if let Some(seq) = ["..", "@{", "//"].into_iter().find(|s| name.contains(s)) {
        return Some(format!("cannot contain '{seq}'"));
    }
    if let Some(c) = name.chars().find(|c| REF_FORBIDDEN_CHARS.contains(c)) {
        return Some(format!("cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Some("cannot contain control characters".into());
    }
    if name
        .split('/')
        .any(|part| part.starts_with('.') || part.ends_with(".lock"))
    {
        return Some("components cannot start with '.' or end with '.lock'".into());
    }
    None
}

/// A validated version name.
///
/// Each version is a branch, so the name must be a legal branch name:
/// no `..`, `@{`, `//`, spaces or `~^:\?*[`, no control characters, no
/// component starting with `.` or ending in `.lock`, no leading `-`, and
/// not `@` alone.
///
/// Whether a name collides with the integration branch is a store-level
/// concern, since the integration branch is configurable.
///
/// ```
/// use fleetconf::core::types::VersionName;
///
/// assert!(VersionName::new("release/2024").is_ok());
/// assert!(VersionName::new("").is_err());
/// assert!(VersionName::new(".hidden").is_err());
/// assert!(VersionName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionName(String);

impl VersionName {
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let problem = if name == "@" {
            Some("'@' is reserved".to_string())
        } else if name.starts_with('-') {
            Some("cannot start with '-'".to_string())
        } else {
            refname_problem(&name)
        };
        match problem {
            Some(reason) => Err(TypeError::InvalidVersionName(format!("'{name}' {reason}"))),
            None => Ok(Self(name)),
        }
    }
}

string_newtype!(VersionName);

/// A Git object identifier, normalized to lowercase hex.
///
/// Both SHA-1 (40 chars) and SHA-256 (64 chars) ids are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(format!("'{oid}' is not hexadecimal")));
        }
        Ok(Self(oid))
    }

    /// The first `len` characters, or the whole id if shorter.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

string_newtype!(Oid);

/// A validated, fully qualified Git reference name such as `refs/heads/1.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.starts_with('/') {
            return Err(TypeError::InvalidRefName(format!("'{name}' cannot start with '/'")));
        }
        match refname_problem(&name) {
            Some(reason) => Err(TypeError::InvalidRefName(format!("'{name}' {reason}"))),
            None => Ok(Self(name)),
        }
    }

    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }
}

string_newtype!(RefName);

/// A stable hash over branch tips.
///
/// This is the repository snapshot used for change detection: the
/// coordinator compares the fingerprint before and after a unit of work
/// and never interprets it structurally. Input order does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(refs: &[(RefName, Oid)]) -> Self {
        let mut sorted: Vec<&(RefName, Oid)> = refs.iter().collect();
        sorted.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        let mut hasher = Sha256::new();
        for (refname, oid) in sorted {
            hasher.update(refname.as_str());
            hasher.update([0u8]);
            hasher.update(oid.as_str());
            hasher.update([b'\n']);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
