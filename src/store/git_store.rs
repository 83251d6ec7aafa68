//! store::git_store
//!
//! The configuration store backed by a git working tree.
//!
//! # Layout
//!
//! - one branch per version (minus the integration and transient branches)
//! - one directory per profile under `profiles/`
//! - one `<pid>.properties` file per pid
//!
//! Version attributes and the default version live in the metadata
//! registry, not in the repository.
//!
//! # Transactions
//!
//! Every operation is one coordinator transaction. Reads run without
//! pulling; writes pull first so they apply on top of the latest remote
//! state, then commit and push.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::error::StoreError;
use super::layout;
use super::options::StoreOptions;
use super::traits::{DataStore, ImportSummary, Properties};
use crate::core::config::ConfigError;
use crate::core::naming::{validate_file_name, validate_pid, validate_profile};
use crate::core::paths::{pid_file_name, pid_for_file, AGENT_PID, ATTRIBUTES_PID};
use crate::core::properties;
use crate::core::types::VersionName;
use crate::engine::{
    ChangeListener, ChangeNotifier, PullOutcome, PushOutcome, SyncEngine, SyncSettings,
    TransactionContext, TransactionCoordinator, TransactionLedger, WorkTree,
};
use crate::git::Git;
use crate::registry::{version_attributes_path, Registry, DEFAULT_VERSION_PATH};

/// Attribute key listing a profile's parents, space-separated.
pub const PARENTS_ATTRIBUTE: &str = "parents";
/// Attribute key marking a profile abstract.
pub const ABSTRACT_ATTRIBUTE: &str = "abstract";
/// Attribute key hiding a profile from listings in higher layers.
pub const HIDDEN_ATTRIBUTE: &str = "hidden";

/// Content of a new profile's marker file.
pub(crate) fn marker_content(profile: &str) -> String {
    format!("#Profile:{}\n", profile)
}

/// Configuration store over one git working tree.
pub struct GitDataStore {
    coordinator: TransactionCoordinator,
    registry: Arc<dyn Registry>,
    fallback_version: String,
}

impl std::fmt::Debug for GitDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitDataStore")
            .field("coordinator", &self.coordinator)
            .field("fallback_version", &self.fallback_version)
            .finish()
    }
}

impl GitDataStore {
    /// Open the store, creating the repository if needed.
    ///
    /// Sets the remote URL when one is given and pulls once unless
    /// disabled. An unreachable remote does not fail the open.
    pub fn open(options: StoreOptions) -> Result<Self, StoreError> {
        let StoreOptions {
            work_dir,
            remote,
            remote_url,
            integration_branch,
            transient_suffix,
            default_version,
            identity,
            credentials,
            registry,
            conflict_resolution,
            pull_on_open,
        } = options;

        VersionName::new(integration_branch.as_str())?;
        // Every branch name ends with "", so an empty suffix would reserve them all.
        if transient_suffix.is_empty() {
            return Err(ConfigError::InvalidValue(
                "transient_suffix cannot be empty".to_string(),
            )
            .into());
        }

        let git = Git::open_or_init(&work_dir, &integration_branch, &identity)?;
        if let Some(url) = &remote_url {
            git.set_remote_url(&remote, url)?;
        }

        let notifier = Arc::new(ChangeNotifier::new());
        let sync = SyncEngine::new(
            SyncSettings {
                remote,
                integration_branch,
                transient_suffix,
            },
            credentials,
            conflict_resolution,
            Arc::clone(&notifier),
            identity.clone(),
        );
        let coordinator = TransactionCoordinator::new(git, sync, notifier, identity);

        let store = Self {
            coordinator,
            registry,
            fallback_version: default_version,
        };

        if pull_on_open {
            let outcome = store.coordinator.pull()?;
            debug!(status = ?outcome.status, "initial pull");
        }

        info!(work_dir = %work_dir.display(), "opened configuration store");
        Ok(store)
    }

    /// Log of finished transactions.
    pub fn transaction_log(&self) -> &TransactionLedger {
        self.coordinator.ledger()
    }

    pub fn paths(&self) -> &crate::core::paths::StorePaths {
        self.coordinator.paths()
    }

    pub(crate) fn read<T, F>(&self, unit: F) -> Result<T, StoreError>
    where
        F: FnOnce(&WorkTree<'_>, &mut TransactionContext) -> Result<T, StoreError>,
    {
        self.coordinator.execute(false, unit)
    }

    pub(crate) fn write<T, F>(&self, unit: F) -> Result<T, StoreError>
    where
        F: FnOnce(&WorkTree<'_>, &mut TransactionContext) -> Result<T, StoreError>,
    {
        self.coordinator.execute(true, unit)
    }
}

// =============================================================================
// Working-tree helpers (run inside a transaction)
// =============================================================================

/// Check out an existing version.
///
/// A version known only through its remote-tracking ref gets a local branch
/// at the remote tip first.
pub(crate) fn checkout_version(tree: &WorkTree<'_>, version: &str) -> Result<(), StoreError> {
    VersionName::new(version)?;
    if tree.is_reserved(version) {
        return Err(StoreError::ReservedVersion(version.to_string()));
    }
    if !tree.has_branch(version) && !tree.track_remote(version)? {
        return Err(StoreError::VersionNotFound(version.to_string()));
    }
    tree.checkout(version)?;
    Ok(())
}

/// Check that `version` could be created.
pub(crate) fn check_new_version(tree: &WorkTree<'_>, version: &str) -> Result<(), StoreError> {
    VersionName::new(version)?;
    if tree.is_reserved(version) {
        return Err(StoreError::ReservedVersion(version.to_string()));
    }
    if tree.has_branch(version) {
        return Err(StoreError::VersionExists(version.to_string()));
    }
    Ok(())
}

fn require_profile(tree: &WorkTree<'_>, version: &str, profile: &str) -> Result<(), StoreError> {
    if layout::profile_exists(tree.paths(), profile) {
        Ok(())
    } else {
        Err(StoreError::ProfileNotFound {
            version: version.to_string(),
            profile: profile.to_string(),
        })
    }
}

/// Write the marker file if it is missing. Returns whether it was written.
pub(crate) fn ensure_marker(tree: &WorkTree<'_>, profile: &str) -> Result<bool, StoreError> {
    let paths = tree.paths();
    if paths.marker_path(profile).exists() {
        return Ok(false);
    }
    let name = pid_file_name(AGENT_PID);
    layout::write_file(paths, profile, &name, marker_content(profile).as_bytes())?;
    tree.stage(&paths.file_rel(profile, &name))?;
    Ok(true)
}

fn parse_file(name: &str, bytes: &[u8]) -> Result<Properties, StoreError> {
    properties::parse_bytes(bytes).map_err(|source| StoreError::Properties {
        name: name.to_string(),
        source,
    })
}

fn read_pid(tree: &WorkTree<'_>, profile: &str, pid: &str) -> Result<Properties, StoreError> {
    let name = pid_file_name(pid);
    match layout::read_file(tree.paths(), profile, &name)? {
        Some(bytes) => parse_file(&name, &bytes),
        None => Ok(Properties::new()),
    }
}

/// Write or delete one file and stage it. Returns whether anything changed.
fn apply_file(
    tree: &WorkTree<'_>,
    profile: &str,
    name: &str,
    content: Option<&[u8]>,
) -> Result<bool, StoreError> {
    let paths = tree.paths();
    let changed = match content {
        Some(bytes) => layout::write_file(paths, profile, name, bytes)?,
        None => layout::remove_file(paths, profile, name)?,
    };
    if changed {
        tree.stage(&paths.file_rel(profile, name))?;
    }
    Ok(changed)
}

/// Serialized pid content, or `None` for an empty map.
fn pid_content(settings: Option<&Properties>) -> Option<String> {
    settings
        .filter(|m| !m.is_empty())
        .map(properties::serialize)
}

fn validate_files(files: &BTreeMap<String, Vec<u8>>) -> Result<(), StoreError> {
    for name in files.keys() {
        validate_file_name(name)?;
    }
    Ok(())
}

// =============================================================================
// DataStore
// =============================================================================

impl DataStore for GitDataStore {
    fn versions(&self) -> Result<Vec<String>, StoreError> {
        self.read(|tree, _| Ok(tree.version_names()?.into_iter().collect()))
    }

    fn has_version(&self, version: &str) -> Result<bool, StoreError> {
        Ok(self.versions()?.iter().any(|v| v == version))
    }

    fn create_version(&self, version: &str) -> Result<(), StoreError> {
        self.write(|tree, ctx| {
            check_new_version(tree, version)?;
            let tip = tree.branch_from(tree.integration_branch(), version)?;
            ctx.require_push();
            info!(version, tip = %tip.short(7), "created version");
            Ok(())
        })
    }

    fn create_version_from(&self, parent: &str, version: &str) -> Result<(), StoreError> {
        self.write(|tree, ctx| {
            checkout_version(tree, parent)?;
            check_new_version(tree, version)?;
            let tip = tree.branch_from(parent, version)?;
            ctx.require_push();
            info!(version, parent, tip = %tip.short(7), "created version");
            Ok(())
        })
    }

    fn delete_version(&self, _version: &str) -> Result<(), StoreError> {
        Err(StoreError::NotSupported("delete_version"))
    }

    fn version_attributes(&self, version: &str) -> Result<BTreeMap<String, String>, StoreError> {
        VersionName::new(version)?;
        match self.registry.get(&version_attributes_path(version))? {
            Some(json) if !json.trim().is_empty() => {
                serde_json::from_str(&json).map_err(|e| StoreError::MalformedAttributes {
                    version: version.to_string(),
                    message: e.to_string(),
                })
            }
            _ => Ok(BTreeMap::new()),
        }
    }

    fn set_version_attribute(
        &self,
        version: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut attributes = self.version_attributes(version)?;
        match value {
            Some(value) => {
                attributes.insert(key.to_string(), value.to_string());
            }
            None => {
                attributes.remove(key);
            }
        }

        let path = version_attributes_path(version);
        if attributes.is_empty() {
            self.registry.delete(&path)?;
        } else {
            let json = serde_json::to_string(&attributes).map_err(|e| {
                StoreError::MalformedAttributes {
                    version: version.to_string(),
                    message: e.to_string(),
                }
            })?;
            self.registry.set(&path, &json)?;
        }
        Ok(())
    }

    fn default_version(&self) -> Result<String, StoreError> {
        Ok(self
            .registry
            .get(DEFAULT_VERSION_PATH)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.fallback_version.clone()))
    }

    fn set_default_version(&self, version: &str) -> Result<(), StoreError> {
        VersionName::new(version)?;
        if !self.has_version(version)? {
            return Err(StoreError::VersionNotFound(version.to_string()));
        }
        self.registry.set(DEFAULT_VERSION_PATH, version)?;
        Ok(())
    }

    fn profiles(&self, version: &str) -> Result<Vec<String>, StoreError> {
        self.read(|tree, _| {
            checkout_version(tree, version)?;
            layout::list_profiles(tree.paths())
        })
    }

    fn has_profile(&self, version: &str, profile: &str) -> Result<bool, StoreError> {
        validate_profile(profile)?;
        self.read(|tree, _| {
            checkout_version(tree, version)?;
            Ok(layout::profile_exists(tree.paths(), profile))
        })
    }

    fn profile(
        &self,
        version: &str,
        profile: &str,
        create: bool,
    ) -> Result<Option<String>, StoreError> {
        if self.has_profile(version, profile)? {
            Ok(Some(profile.to_string()))
        } else if create {
            self.create_profile(version, profile).map(Some)
        } else {
            Ok(None)
        }
    }

    fn create_profile(&self, version: &str, profile: &str) -> Result<String, StoreError> {
        validate_profile(profile)?;
        self.write(|tree, ctx| {
            checkout_version(tree, version)?;
            if ensure_marker(tree, profile)? {
                ctx.commit(format!("Create profile {} in version {}", profile, version));
                info!(version, profile, "created profile");
            }
            Ok(profile.to_string())
        })
    }

    fn delete_profile(&self, version: &str, profile: &str) -> Result<(), StoreError> {
        validate_profile(profile)?;
        self.write(|tree, ctx| {
            checkout_version(tree, version)?;
            require_profile(tree, version, profile)?;

            let paths = tree.paths();
            let dir = paths.profile_dir(profile);
            std::fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
            tree.stage(&paths.profile_rel(profile))?;
            ctx.commit(format!("Delete profile {} from version {}", profile, version));
            info!(version, profile, "deleted profile");
            Ok(())
        })
    }

    fn profile_attributes(&self, version: &str, profile: &str) -> Result<Properties, StoreError> {
        validate_profile(profile)?;
        self.read(|tree, _| {
            checkout_version(tree, version)?;
            let mut attributes = read_pid(tree, profile, ATTRIBUTES_PID)?;
            if !attributes.contains_key(PARENTS_ATTRIBUTE) {
                let agent = read_pid(tree, profile, AGENT_PID)?;
                if let Some(parents) = agent.get(PARENTS_ATTRIBUTE) {
                    attributes.insert(PARENTS_ATTRIBUTE.to_string(), parents.clone());
                }
            }
            Ok(attributes)
        })
    }

    fn set_profile_attribute(
        &self,
        version: &str,
        profile: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), StoreError> {
        validate_profile(profile)?;
        self.write(|tree, ctx| {
            checkout_version(tree, version)?;
            require_profile(tree, version, profile)?;

            let mut attributes = read_pid(tree, profile, ATTRIBUTES_PID)?;
            match value {
                Some(value) => {
                    attributes.insert(key.to_string(), value.to_string());
                }
                None => {
                    attributes.remove(key);
                }
            }

            let content = pid_content(Some(&attributes));
            let name = pid_file_name(ATTRIBUTES_PID);
            if apply_file(tree, profile, &name, content.as_deref().map(str::as_bytes))? {
                ctx.commit(format!(
                    "Set attribute {} of profile {} in version {}",
                    key, profile, version
                ));
            }
            Ok(())
        })
    }

    fn last_modified(
        &self,
        version: &str,
        profile: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        validate_profile(profile)?;
        self.read(|tree, _| {
            checkout_version(tree, version)?;
            if !layout::profile_exists(tree.paths(), profile) {
                return Ok(None);
            }
            Ok(layout::last_modified(tree.paths(), profile).map(DateTime::<Utc>::from))
        })
    }

    fn file_configurations(
        &self,
        version: &str,
        profile: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        validate_profile(profile)?;
        self.read(|tree, _| {
            checkout_version(tree, version)?;
            layout::read_files(tree.paths(), profile)
        })
    }

    fn file_configuration(
        &self,
        version: &str,
        profile: &str,
        file_name: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        validate_profile(profile)?;
        validate_file_name(file_name)?;
        self.read(|tree, _| {
            checkout_version(tree, version)?;
            layout::read_file(tree.paths(), profile, file_name)
        })
    }

    fn set_file_configurations(
        &self,
        version: &str,
        profile: &str,
        files: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), StoreError> {
        validate_profile(profile)?;
        validate_files(files)?;
        let marker = pid_file_name(AGENT_PID);

        self.write(|tree, ctx| {
            checkout_version(tree, version)?;
            require_profile(tree, version, profile)?;

            let current = layout::read_files(tree.paths(), profile)?;
            let mut changed = 0usize;
            for name in current.keys() {
                if !files.contains_key(name) && *name != marker && apply_file(tree, profile, name, None)? {
                    changed += 1;
                }
            }
            for (name, content) in files {
                if apply_file(tree, profile, name, Some(content))? {
                    changed += 1;
                }
            }

            if changed > 0 {
                ctx.commit(format!(
                    "Update {} file(s) of profile {} in version {}",
                    changed, profile, version
                ));
            }
            Ok(())
        })
    }

    fn set_file_configuration(
        &self,
        version: &str,
        profile: &str,
        file_name: &str,
        content: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        validate_profile(profile)?;
        validate_file_name(file_name)?;
        self.write(|tree, ctx| {
            checkout_version(tree, version)?;
            require_profile(tree, version, profile)?;
            if apply_file(tree, profile, file_name, content)? {
                let verb = if content.is_some() { "Update" } else { "Delete" };
                ctx.commit(format!(
                    "{} {} of profile {} in version {}",
                    verb, file_name, profile, version
                ));
            }
            Ok(())
        })
    }

    fn configurations(
        &self,
        version: &str,
        profile: &str,
    ) -> Result<BTreeMap<String, Properties>, StoreError> {
        let files = self.file_configurations(version, profile)?;
        let mut configurations = BTreeMap::new();
        for (name, bytes) in &files {
            if let Some(pid) = pid_for_file(name) {
                configurations.insert(pid.to_string(), parse_file(name, bytes)?);
            }
        }
        Ok(configurations)
    }

    fn configuration(
        &self,
        version: &str,
        profile: &str,
        pid: &str,
    ) -> Result<Properties, StoreError> {
        validate_profile(profile)?;
        validate_pid(pid)?;
        self.read(|tree, _| {
            checkout_version(tree, version)?;
            read_pid(tree, profile, pid)
        })
    }

    fn set_configuration(
        &self,
        version: &str,
        profile: &str,
        pid: &str,
        settings: Option<&Properties>,
    ) -> Result<(), StoreError> {
        validate_pid(pid)?;
        let content = pid_content(settings);
        self.set_file_configuration(
            version,
            profile,
            &pid_file_name(pid),
            content.as_deref().map(str::as_bytes),
        )
    }

    fn set_configurations(
        &self,
        version: &str,
        profile: &str,
        configurations: &BTreeMap<String, Properties>,
    ) -> Result<(), StoreError> {
        validate_profile(profile)?;
        for pid in configurations.keys() {
            validate_pid(pid)?;
        }

        self.write(|tree, ctx| {
            checkout_version(tree, version)?;
            require_profile(tree, version, profile)?;

            let current = layout::read_files(tree.paths(), profile)?;
            let mut changed = 0usize;
            for name in current.keys() {
                let Some(pid) = pid_for_file(name) else {
                    continue;
                };
                let keep = pid == AGENT_PID
                    || configurations.get(pid).is_some_and(|m| !m.is_empty());
                if !keep && apply_file(tree, profile, name, None)? {
                    changed += 1;
                }
            }
            for (pid, settings) in configurations {
                if let Some(content) = pid_content(Some(settings)) {
                    if apply_file(tree, profile, &pid_file_name(pid), Some(content.as_bytes()))? {
                        changed += 1;
                    }
                }
            }

            if changed > 0 {
                ctx.commit(format!(
                    "Update {} configuration(s) of profile {} in version {}",
                    changed, profile, version
                ));
            }
            Ok(())
        })
    }

    fn import_from_filesystem(&self, path: &Path) -> Result<ImportSummary, StoreError> {
        let default_version = self.default_version()?;
        super::import::import_tree(self, path, &default_version)
    }

    fn pull(&self) -> Result<PullOutcome, StoreError> {
        Ok(self.coordinator.pull()?)
    }

    fn push(&self) -> Result<PushOutcome, StoreError> {
        Ok(self.coordinator.push()?)
    }

    fn subscribe(&self, listener: ChangeListener) {
        self.coordinator.notifier().subscribe(listener);
    }
}
