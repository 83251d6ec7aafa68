//! store::traits
//!
//! The domain API of the configuration store.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use super::error::StoreError;
use crate::engine::{ChangeListener, PullOutcome, PushOutcome};

/// One pid's settings.
pub type Properties = BTreeMap<String, String>;

/// What an import wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// Versions that received files, in import order.
    pub versions: Vec<String>,
    /// Versions that had to be created.
    pub created_versions: Vec<String>,
    /// Profiles written, across all versions.
    pub profiles: usize,
    /// Files written, across all versions.
    pub files: usize,
}

/// Versioned configuration store.
///
/// Versions are independent configuration lineages. Each holds profiles,
/// and each profile holds file configurations, a subset of which are pid
/// configurations (`<pid>.properties`).
///
/// Every operation is one serialized transaction. Writes pull before they
/// run and push after they commit; reads never touch the remote.
pub trait DataStore: Send + Sync {
    // =========================================================================
    // Versions
    // =========================================================================

    /// Every version known locally or on the remote, sorted.
    fn versions(&self) -> Result<Vec<String>, StoreError>;

    fn has_version(&self, version: &str) -> Result<bool, StoreError>;

    /// Create `version` from the integration branch.
    fn create_version(&self, version: &str) -> Result<(), StoreError>;

    /// Create `version` as a copy of `parent`.
    fn create_version_from(&self, parent: &str, version: &str) -> Result<(), StoreError>;

    /// Always [`StoreError::NotSupported`].
    fn delete_version(&self, version: &str) -> Result<(), StoreError>;

    /// Attributes kept in the metadata registry.
    fn version_attributes(&self, version: &str) -> Result<BTreeMap<String, String>, StoreError>;

    /// Set (`Some`) or remove (`None`) one version attribute.
    fn set_version_attribute(
        &self,
        version: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), StoreError>;

    /// The registry's default version, or the configured fallback.
    fn default_version(&self) -> Result<String, StoreError>;

    fn set_default_version(&self, version: &str) -> Result<(), StoreError>;

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Profiles of `version`, sorted.
    fn profiles(&self, version: &str) -> Result<Vec<String>, StoreError>;

    fn has_profile(&self, version: &str, profile: &str) -> Result<bool, StoreError>;

    /// Look up a profile, creating it when `create` is set.
    fn profile(&self, version: &str, profile: &str, create: bool)
        -> Result<Option<String>, StoreError>;

    /// Create a profile by writing its marker file. Existing profiles are left alone.
    fn create_profile(&self, version: &str, profile: &str) -> Result<String, StoreError>;

    /// Remove a profile and everything in it.
    fn delete_profile(&self, version: &str, profile: &str) -> Result<(), StoreError>;

    /// Attributes pid merged with the agent pid's `parents`.
    fn profile_attributes(&self, version: &str, profile: &str) -> Result<Properties, StoreError>;

    /// Set (`Some`) or remove (`None`) one key of the attributes pid.
    fn set_profile_attribute(
        &self,
        version: &str,
        profile: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Latest modification time of the profile directory or its marker.
    fn last_modified(&self, version: &str, profile: &str)
        -> Result<Option<DateTime<Utc>>, StoreError>;

    // =========================================================================
    // File configurations
    // =========================================================================

    /// Every file of a profile, keyed by `/`-separated relative name.
    fn file_configurations(
        &self,
        version: &str,
        profile: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, StoreError>;

    fn file_configuration(
        &self,
        version: &str,
        profile: &str,
        file_name: &str,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace a profile's files with `files`. Files not named are deleted,
    /// except the marker.
    fn set_file_configurations(
        &self,
        version: &str,
        profile: &str,
        files: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), StoreError>;

    /// Write (`Some`) or delete (`None`) one file.
    fn set_file_configuration(
        &self,
        version: &str,
        profile: &str,
        file_name: &str,
        content: Option<&[u8]>,
    ) -> Result<(), StoreError>;

    // =========================================================================
    // Pid configurations
    // =========================================================================

    /// Every pid of a profile with its settings.
    fn configurations(
        &self,
        version: &str,
        profile: &str,
    ) -> Result<BTreeMap<String, Properties>, StoreError>;

    /// Settings of one pid; empty when the pid has no file.
    fn configuration(&self, version: &str, profile: &str, pid: &str)
        -> Result<Properties, StoreError>;

    /// Write a pid. `None` or an empty map deletes its file.
    fn set_configuration(
        &self,
        version: &str,
        profile: &str,
        pid: &str,
        settings: Option<&Properties>,
    ) -> Result<(), StoreError>;

    /// Replace every pid of a profile. Non-properties files and the marker are kept.
    fn set_configurations(
        &self,
        version: &str,
        profile: &str,
        configurations: &BTreeMap<String, Properties>,
    ) -> Result<(), StoreError>;

    // =========================================================================
    // Bulk and sync
    // =========================================================================

    /// Copy a directory tree of profiles into the store.
    fn import_from_filesystem(&self, path: &Path) -> Result<ImportSummary, StoreError>;

    /// Pull from the remote now.
    fn pull(&self) -> Result<PullOutcome, StoreError>;

    /// Push to the remote now.
    fn push(&self) -> Result<PushOutcome, StoreError>;

    /// Register a listener fired whenever the store changes.
    fn subscribe(&self, listener: ChangeListener);
}
