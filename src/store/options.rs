//! store::options
//!
//! How a [`GitDataStore`](super::GitDataStore) is opened.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::config::{
    Config, DEFAULT_INTEGRATION_BRANCH, DEFAULT_REMOTE, DEFAULT_TRANSIENT_SUFFIX, DEFAULT_VERSION,
};
use crate::credentials::{CredentialsProvider, FileCredentials, NoCredentials};
use crate::engine::{ConflictResolution, RemoteWins};
use crate::git::Identity;
use crate::registry::{FileRegistry, MemoryRegistry, Registry};

/// Settings and collaborators of a store.
///
/// # Example
///
/// ```no_run
/// use fleetconf::store::{GitDataStore, StoreOptions};
///
/// let store = GitDataStore::open(
///     StoreOptions::new("/var/lib/fleetconf/repo")
///         .remote_url("/srv/fleet.git")
///         .default_version("1.0"),
/// )
/// .unwrap();
/// ```
pub struct StoreOptions {
    pub(crate) work_dir: PathBuf,
    pub(crate) remote: String,
    pub(crate) remote_url: Option<String>,
    pub(crate) integration_branch: String,
    pub(crate) transient_suffix: String,
    pub(crate) default_version: String,
    pub(crate) identity: Identity,
    pub(crate) credentials: Arc<dyn CredentialsProvider>,
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) conflict_resolution: Box<dyn ConflictResolution>,
    pub(crate) pull_on_open: bool,
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("work_dir", &self.work_dir)
            .field("remote", &self.remote)
            .field("remote_url", &self.remote_url)
            .field("integration_branch", &self.integration_branch)
            .field("transient_suffix", &self.transient_suffix)
            .field("default_version", &self.default_version)
            .field("identity", &self.identity)
            .field("conflict_resolution", &self.conflict_resolution.name())
            .field("pull_on_open", &self.pull_on_open)
            .finish()
    }
}

impl StoreOptions {
    /// Defaults for a store rooted at `work_dir`: no remote URL, no
    /// credentials, an in-memory registry and remote-wins resolution.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            remote: DEFAULT_REMOTE.to_string(),
            remote_url: None,
            integration_branch: DEFAULT_INTEGRATION_BRANCH.to_string(),
            transient_suffix: DEFAULT_TRANSIENT_SUFFIX.to_string(),
            default_version: DEFAULT_VERSION.to_string(),
            identity: Identity::new("fleetconf", "fleetconf@localhost"),
            credentials: Arc::new(NoCredentials),
            registry: Arc::new(MemoryRegistry::new()),
            conflict_resolution: Box::new(RemoteWins),
            pull_on_open: true,
        }
    }

    /// Options from loaded configuration.
    ///
    /// A configured credentials file becomes a [`FileCredentials`] provider
    /// and a configured registry file a [`FileRegistry`].
    pub fn from_config(work_dir: &Path, config: &Config) -> Self {
        let mut options = Self::new(work_dir)
            .remote(config.remote())
            .integration_branch(config.integration_branch())
            .transient_suffix(config.transient_suffix())
            .default_version(config.default_version())
            .identity(Identity::new(config.author_name(), config.author_email()));

        if let Some(url) = config.remote_url() {
            options = options.remote_url(url);
        }
        if let Some(path) = config.credentials_file() {
            options = options.credentials(Arc::new(FileCredentials::with_path(path)));
        }
        if let Some(path) = config.registry_file() {
            options = options.registry(Arc::new(FileRegistry::with_path(path)));
        }
        options
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn integration_branch(mut self, branch: impl Into<String>) -> Self {
        self.integration_branch = branch.into();
        self
    }

    pub fn transient_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.transient_suffix = suffix.into();
        self
    }

    /// Version reported when the registry names none.
    pub fn default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = version.into();
        self
    }

    /// Author of every commit the store makes.
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn credentials(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = provider;
        self
    }

    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn conflict_resolution(mut self, strategy: Box<dyn ConflictResolution>) -> Self {
        self.conflict_resolution = strategy;
        self
    }

    /// Whether opening the store pulls once. Defaults to true.
    pub fn pull_on_open(mut self, pull: bool) -> Self {
        self.pull_on_open = pull;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{GlobalConfig, RepoConfig};

    #[test]
    fn defaults() {
        let options = StoreOptions::new("/tmp/repo");
        assert_eq!(options.work_dir(), Path::new("/tmp/repo"));
        assert_eq!(options.remote, "origin");
        assert!(options.remote_url.is_none());
        assert_eq!(options.integration_branch, "master");
        assert_eq!(options.transient_suffix, "-tmp");
        assert_eq!(options.default_version, "1.0");
        assert!(options.pull_on_open);
    }

    #[test]
    fn from_config_applies_repo_settings() {
        let repo = RepoConfig {
            remote: Some("upstream".into()),
            remote_url: Some("/srv/fleet.git".into()),
            integration_branch: Some("main".into()),
            transient_suffix: None,
            default_version: Some("2.0".into()),
        };
        let config = Config::from_parts(GlobalConfig::default(), Some(repo)).unwrap();
        let options = StoreOptions::from_config(Path::new("/tmp/repo"), &config);

        assert_eq!(options.remote, "upstream");
        assert_eq!(options.remote_url.as_deref(), Some("/srv/fleet.git"));
        assert_eq!(options.integration_branch, "main");
        assert_eq!(options.transient_suffix, "-tmp");
        assert_eq!(options.default_version, "2.0");
    }
}
