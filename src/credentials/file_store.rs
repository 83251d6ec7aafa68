//! credentials::file_store
//!
//! File-backed credentials.
//!
//! # Format
//!
//! ```toml
//! username = "fleet"
//! password = "s3cret"
//! ```
//!
//! # Security
//!
//! - File permissions are set to 0600 on Unix (owner read/write only)
//! - All writes are atomic (write to temp file, then rename)
//! - Passwords are NEVER logged, printed, or included in error messages

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use serde::{Deserialize, Serialize};

use super::traits::{Credentials, CredentialsError, CredentialsProvider};

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialsFile {
    username: String,
    password: String,
}

/// Credentials read from a TOML file on every request.
///
/// A missing file yields no credentials rather than an error, so a node can
/// be configured before its credentials are provisioned.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    /// Create a provider reading from `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the credentials file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store credentials with an atomic write and owner-only permissions.
    pub fn store(&self, credentials: &Credentials) -> Result<(), CredentialsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CredentialsError::WriteError(format!("cannot create directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(&CredentialsFile {
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        })
        .map_err(|e| CredentialsError::WriteError(format!("cannot serialize: {}", e)))?;

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| {
                    CredentialsError::WriteError(format!("cannot create temp file: {}", e))
                })?;

            #[cfg(unix)]
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| {
                    CredentialsError::WriteError(format!("cannot set permissions: {}", e))
                })?;

            file.write_all(content.as_bytes())
                .map_err(|e| CredentialsError::WriteError(format!("cannot write: {}", e)))?;
            file.sync_all()
                .map_err(|e| CredentialsError::WriteError(format!("cannot sync to disk: {}", e)))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| CredentialsError::WriteError(format!("cannot rename temp file: {}", e)))
    }

    /// Verify file permissions are owner-only (Unix only).
    ///
    /// Returns true if the file doesn't exist or has 0600 permissions.
    #[cfg(unix)]
    pub fn verify_permissions(&self) -> Result<bool, CredentialsError> {
        if !self.path.exists() {
            return Ok(true);
        }
        let metadata = fs::metadata(&self.path)
            .map_err(|e| CredentialsError::ReadError(format!("cannot read metadata: {}", e)))?;
        Ok(metadata.permissions().mode() & 0o777 == 0o600)
    }

    #[cfg(not(unix))]
    pub fn verify_permissions(&self) -> Result<bool, CredentialsError> {
        Ok(true)
    }
}

impl CredentialsProvider for FileCredentials {
    fn credentials(&self) -> Result<Option<Credentials>, CredentialsError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| CredentialsError::ReadError(format!("cannot read file: {}", e)))?;

        // toml's message may quote the offending line, which could be the password.
        let parsed: CredentialsFile = toml::from_str(&content).map_err(|_| {
            CredentialsError::Invalid(format!("cannot parse {}", self.path.display()))
        })?;

        Ok(Some(Credentials::new(parsed.username, parsed.password)))
    }
}
