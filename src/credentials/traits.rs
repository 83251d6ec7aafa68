//! credentials::traits
//!
//! Credentials provider trait and the in-memory providers.
//!
//! # Security
//!
//! Implementations MUST:
//! - Never log, print, or include passwords in error messages
//! - Be thread-safe (Send + Sync)

use std::fmt;

use thiserror::Error;

/// Errors from credentials providers.
///
/// Note: Error messages intentionally do not include passwords.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// Failed to read the credentials source.
    #[error("failed to read credentials: {0}")]
    ReadError(String),

    /// Failed to write the credentials source.
    #[error("failed to write credentials: {0}")]
    WriteError(String),

    /// The credentials source exists but is malformed.
    #[error("invalid credentials: {0}")]
    Invalid(String),
}

/// A username and password pair for the remote transport.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Supplies credentials for fetch and push.
///
/// Returning `Ok(None)` means "no explicit credentials"; the git layer then
/// tries the ssh agent and git's own credential helpers.
pub trait CredentialsProvider: Send + Sync {
    /// Resolve the credentials to use for the next remote operation.
    fn credentials(&self) -> Result<Option<Credentials>, CredentialsError>;
}

/// Provider that never supplies credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialsProvider for NoCredentials {
    fn credentials(&self) -> Result<Option<Credentials>, CredentialsError> {
        Ok(None)
    }
}

/// Provider with a fixed username and password.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(username, password),
        }
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Result<Option<Credentials>, CredentialsError> {
        Ok(Some(self.credentials.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_credentials_is_empty() {
        assert!(NoCredentials.credentials().unwrap().is_none());
    }

    #[test]
    fn static_credentials_returned() {
        let provider = StaticCredentials::new("admin", "admin");
        assert_eq!(
            provider.credentials().unwrap(),
            Some(Credentials::new("admin", "admin"))
        );
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("admin", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn providers_are_object_safe() {
        let providers: Vec<Box<dyn CredentialsProvider>> =
            vec![Box::new(NoCredentials), Box::new(StaticCredentials::new("a", "b"))];
        assert_eq!(providers.len(), 2);
    }
}
