//! registry
//!
//! Metadata registry: a flat, path-keyed string store shared by the fleet.
//!
//! The store only relies on `get`/`set` semantics. Version attributes and
//! the default-version pointer live here rather than in the repository.
//!
//! # Well-known paths
//!
//! - `/fleet/configs/versions/<version>/attributes` - JSON object of version attributes
//! - `/fleet/configs/default-version` - Name of the default version
//!
//! # Implementations
//!
//! - [`MemoryRegistry`] - Process-local map, used by tests and single-node setups
//! - [`FileRegistry`] - TOML file with atomic writes

mod file_store;

pub use file_store::FileRegistry;

use std::collections::BTreeMap;

use parking_lot::RwLock;
use thiserror::Error;

/// Path of the default-version pointer.
pub const DEFAULT_VERSION_PATH: &str = "/fleet/configs/default-version";

/// Path of a version's attribute map.
pub fn version_attributes_path(version: &str) -> String {
    format!("/fleet/configs/versions/{}/attributes", version)
}

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry: {0}")]
    ReadError(String),

    #[error("failed to write registry: {0}")]
    WriteError(String),

    #[error("malformed registry value at {path}: {message}")]
    Malformed { path: String, message: String },
}

/// Key/value registry addressed by `/`-separated paths.
pub trait Registry: Send + Sync {
    /// Read the value at `path`.
    fn get(&self, path: &str) -> Result<Option<String>, RegistryError>;

    /// Write the value at `path`, replacing any previous value.
    fn set(&self, path: &str, value: &str) -> Result<(), RegistryError>;

    /// Remove the value at `path`. Removing a missing path is not an error.
    fn delete(&self, path: &str) -> Result<(), RegistryError>;
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for MemoryRegistry {
    fn get(&self, path: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.entries.read().get(path).cloned())
    }

    fn set(&self, path: &str, value: &str) -> Result<(), RegistryError> {
        self.entries.write().insert(path.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), RegistryError> {
        self.entries.write().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_registry_roundtrip() {
        let registry = MemoryRegistry::new();
        assert_eq!(registry.get("/a").unwrap(), None);

        registry.set("/a", "1").unwrap();
        assert_eq!(registry.get("/a").unwrap().as_deref(), Some("1"));

        registry.delete("/a").unwrap();
        registry.delete("/a").unwrap();
        assert_eq!(registry.get("/a").unwrap(), None);
    }

    #[test]
    fn well_known_paths() {
        assert_eq!(
            version_attributes_path("1.0"),
            "/fleet/configs/versions/1.0/attributes"
        );
        assert!(DEFAULT_VERSION_PATH.starts_with("/fleet/configs/"));
    }
}
