//! store::error
//!
//! The single store-level failure kind.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::naming::NameError;
use crate::core::ops::lock::LockError;
use crate::core::properties::PropertiesError;
use crate::core::types::TypeError;
use crate::credentials::CredentialsError;
use crate::engine::TransactionError;
use crate::git::GitError;
use crate::registry::RegistryError;

/// Errors from configuration store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The working-tree primitives failed.
    #[error("git error: {0}")]
    Git(#[from] GitError),

    /// The coordinator lock could not be taken.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    InvalidVersion(#[from] TypeError),

    #[error(transparent)]
    InvalidName(#[from] NameError),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed configuration '{name}': {source}")]
    Properties {
        name: String,
        source: PropertiesError,
    },

    /// The name is the integration branch or a transient branch.
    #[error("'{0}' is reserved and cannot be used as a version")]
    ReservedVersion(String),

    #[error("version not found: {0}")]
    VersionNotFound(String),

    #[error("version already exists: {0}")]
    VersionExists(String),

    #[error("profile not found: {profile} in version {version}")]
    ProfileNotFound { version: String, profile: String },

    /// The operation is not implemented by this store.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),

    #[error("malformed attributes for version {version}: {message}")]
    MalformedAttributes { version: String, message: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Lock(e) => StoreError::Lock(e),
            TransactionError::Git(e) => StoreError::Git(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_errors_keep_their_kind() {
        let lock = LockError::Acquire {
            path: "lock".into(),
            source: std::io::Error::new(std::io::ErrorKind::WouldBlock, "busy"),
        };
        let err: StoreError = TransactionError::Lock(lock).into();
        assert!(matches!(err, StoreError::Lock(_)));

        let err: StoreError = TransactionError::Git(GitError::BareRepo).into();
        assert!(matches!(err, StoreError::Git(GitError::BareRepo)));
    }

    #[test]
    fn display_names_the_subject() {
        let err = StoreError::ProfileNotFound {
            version: "1.0".into(),
            profile: "web".into(),
        };
        assert_eq!(err.to_string(), "profile not found: web in version 1.0");
        assert!(StoreError::NotSupported("delete_version")
            .to_string()
            .contains("delete_version"));
    }
}
