//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$FLEETCONF_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/fleetconf/config.toml`
//! 3. `~/.fleetconf/config.toml` (canonical write location)
//!
//! # Repo Config
//!
//! Located at `.git/fleetconf/config.toml` inside the store's working tree.
//!
//! # Validation
//!
//! Config values are validated after parsing (e.g. the integration branch
//! must be a valid branch name).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::VersionName;

/// Global configuration (node scope).
///
/// # Example
///
/// ```toml
/// pull_interval_secs = 30
///
/// [author]
/// name = "node-a"
/// email = "node-a@fleet.local"
///
/// [credentials]
/// file = "/etc/fleetconf/credentials.toml"
///
/// [registry]
/// file = "/var/lib/fleetconf/registry.toml"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Seconds between background pulls
    pub pull_interval_secs: Option<u64>,

    /// Commit identity
    pub author: Option<AuthorConfig>,

    /// Credentials used for fetch and push
    pub credentials: Option<CredentialsConfig>,

    /// Metadata registry settings
    pub registry: Option<RegistryConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pull_interval_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "pull_interval_secs must be greater than zero".to_string(),
            ));
        }

        if let Some(author) = &self.author {
            author.validate()?;
        }

        Ok(())
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// remote = "origin"
/// remote_url = "ssh://git@config-master/fleet.git"
/// integration_branch = "master"
/// transient_suffix = "-tmp"
/// default_version = "1.0"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Remote name (default: "origin")
    pub remote: Option<String>,

    /// Remote URL; when unset, the URL already configured in git is used
    pub remote_url: Option<String>,

    /// Reserved branch never exposed as a version (default: "master")
    pub integration_branch: Option<String>,

    /// Suffix marking transient work branches (default: "-tmp")
    pub transient_suffix: Option<String>,

    /// Version used when nothing is recorded in the registry (default: "1.0")
    pub default_version: Option<String>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(branch) = &self.integration_branch {
            VersionName::new(branch.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid integration branch: {}", e))
            })?;
        }

        if let Some(version) = &self.default_version {
            VersionName::new(version.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid default version: {}", e))
            })?;
        }

        if let Some(remote) = &self.remote {
            if remote.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote cannot be empty".to_string(),
                ));
            }
        }

        if let Some(suffix) = &self.transient_suffix {
            if suffix.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "transient_suffix cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Commit identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuthorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.as_deref() == Some("") || self.email.as_deref() == Some("") {
            return Err(ConfigError::InvalidValue(
                "author name and email cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Credentials configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    /// TOML file holding `username` and `password`
    pub file: Option<PathBuf>,
}

/// Metadata registry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// File-backed registry location; in-memory when unset
    pub file: Option<PathBuf>,
}
