//! credentials
//!
//! Credentials used to fetch from and push to the shared remote.
//!
//! # Providers
//!
//! - [`NoCredentials`] - Always empty; the git layer falls back to the
//!   ssh agent, git credential helpers, then the transport default
//! - [`StaticCredentials`] - A fixed username and password
//! - [`FileCredentials`] - Username and password read from a TOML file
//!
//! # Failure model
//!
//! A provider failure aborts only the fetch or push that asked for
//! credentials. The surrounding transaction still runs on local state.
//!
//! # Example
//!
//! ```
//! use fleetconf::credentials::{CredentialsProvider, StaticCredentials};
//!
//! let provider = StaticCredentials::new("admin", "s3cret");
//! let creds = provider.credentials().unwrap().unwrap();
//! assert_eq!(creds.username, "admin");
//! ```

mod file_store;
mod traits;

pub use file_store::FileCredentials;
pub use traits::{Credentials, CredentialsError, CredentialsProvider, NoCredentials, StaticCredentials};
