//! core::config
//!
//! Configuration schema and loading.
//!
//! Two TOML files feed a [`Config`]. The global file holds node-level
//! settings (identity, credentials, registry, pull cadence); the repo file,
//! `<work_dir>/.git/fleetconf/config.toml`, holds settings of one store
//! (remote, reserved branch names, default version). Repo values override
//! global ones, which override built-in defaults. Command-line flags are
//! applied on top by the CLI.
//!
//! # Example
//!
//! ```no_run
//! use fleetconf::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/var/lib/fleetconf/repo"))).unwrap();
//! println!("Remote: {}", config.remote());
//! println!("Integration branch: {}", config.integration_branch());
//! ```

pub mod schema;

pub use schema::{AuthorConfig, CredentialsConfig, GlobalConfig, RegistryConfig, RepoConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Default remote name.
pub const DEFAULT_REMOTE: &str = "origin";
/// Default reserved integration branch.
pub const DEFAULT_INTEGRATION_BRANCH: &str = "master";
/// Default suffix of transient work branches.
pub const DEFAULT_TRANSIENT_SUFFIX: &str = "-tmp";
/// Default version name.
pub const DEFAULT_VERSION: &str = "1.0";
/// Default seconds between background pulls.
pub const DEFAULT_PULL_INTERVAL_SECS: u64 = 60;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Effective configuration. Accessors resolve repo, global and default
/// values in that order.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub repo: Option<RepoConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load the global config and, when `work_dir` is given, that store's
    /// repo config. Missing files fall back to defaults; files that exist
    /// but fail to parse or validate are errors.
    pub fn load(work_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let global_path = Self::global_candidates().into_iter().find(|p| p.exists());
        let global = match &global_path {
            Some(path) => Self::read_config(path)?,
            None => GlobalConfig::default(),
        };

        let repo_path = work_dir
            .map(Self::repo_config_path)
            .filter(|p| p.exists());
        let repo = repo_path
            .as_deref()
            .map(Self::read_config::<RepoConfig>)
            .transpose()?;

        let mut config = Self::from_parts(global, repo)?;
        config.global_path = global_path;
        config.repo_path = repo_path;
        Ok(config)
    }

    /// Build a config from explicit parts, bypassing the filesystem.
    pub fn from_parts(global: GlobalConfig, repo: Option<RepoConfig>) -> Result<Self, ConfigError> {
        global.validate()?;
        if let Some(repo) = &repo {
            repo.validate()?;
        }
        Ok(Config {
            global,
            repo,
            global_path: None,
            repo_path: None,
        })
    }

    /// Global config locations, most specific first: `$FLEETCONF_CONFIG`,
    /// `$XDG_CONFIG_HOME/fleetconf/config.toml`, `~/.fleetconf/config.toml`.
    fn global_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(3);
        if let Some(explicit) = std::env::var_os("FLEETCONF_CONFIG") {
            candidates.push(PathBuf::from(explicit));
        }
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg).join("fleetconf").join("config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".fleetconf").join("config.toml"));
        }
        candidates
    }

    fn read_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Canonical path for repo config, relative to a store's working tree.
    pub fn repo_config_path(work_dir: &Path) -> PathBuf {
        work_dir.join(".git/fleetconf/config.toml")
    }

    /// Write repo config atomically.
    pub fn write_repo(work_dir: &Path, config: &RepoConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::repo_config_path(work_dir);
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write a config file atomically (temp file, then rename).
    fn write_config_atomic<T: serde::Serialize>(
        path: &Path,
        config: &T,
    ) -> Result<(), ConfigError> {
        let write_err = |path: &Path, source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(path, e))?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| write_err(&temp_path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| write_err(&temp_path, e))?;
        file.sync_all().map_err(|e| write_err(&temp_path, e))?;

        fs::rename(&temp_path, path).map_err(|e| write_err(path, e))?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    fn repo_value<'a>(&'a self, f: impl Fn(&'a RepoConfig) -> Option<&'a String>) -> Option<&'a str> {
        self.repo.as_ref().and_then(f).map(String::as_str)
    }

    /// Remote name. Defaults to "origin".
    pub fn remote(&self) -> &str {
        self.repo_value(|r| r.remote.as_ref())
            .unwrap_or(DEFAULT_REMOTE)
    }

    /// Remote URL, if configured here.
    pub fn remote_url(&self) -> Option<&str> {
        self.repo_value(|r| r.remote_url.as_ref())
    }

    /// Reserved integration branch. Defaults to "master".
    pub fn integration_branch(&self) -> &str {
        self.repo_value(|r| r.integration_branch.as_ref())
            .unwrap_or(DEFAULT_INTEGRATION_BRANCH)
    }

    /// Suffix of transient work branches. Defaults to "-tmp".
    pub fn transient_suffix(&self) -> &str {
        self.repo_value(|r| r.transient_suffix.as_ref())
            .unwrap_or(DEFAULT_TRANSIENT_SUFFIX)
    }

    /// Version used when the registry records none. Defaults to "1.0".
    pub fn default_version(&self) -> &str {
        self.repo_value(|r| r.default_version.as_ref())
            .unwrap_or(DEFAULT_VERSION)
    }

    /// Commit author name. Defaults to "fleetconf".
    pub fn author_name(&self) -> &str {
        self.global
            .author
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .unwrap_or("fleetconf")
    }

    /// Commit author email. Defaults to "fleetconf@localhost".
    pub fn author_email(&self) -> &str {
        self.global
            .author
            .as_ref()
            .and_then(|a| a.email.as_deref())
            .unwrap_or("fleetconf@localhost")
    }

    /// Interval between background pulls. Defaults to 60 seconds.
    pub fn pull_interval(&self) -> Duration {
        Duration::from_secs(
            self.global
                .pull_interval_secs
                .unwrap_or(DEFAULT_PULL_INTERVAL_SECS),
        )
    }

    /// Credentials file, if configured.
    pub fn credentials_file(&self) -> Option<&Path> {
        self.global
            .credentials
            .as_ref()
            .and_then(|c| c.file.as_deref())
    }

    /// Registry file, if configured.
    pub fn registry_file(&self) -> Option<&Path> {
        self.global.registry.as_ref().and_then(|r| r.file.as_deref())
    }

    /// Path the global config was loaded from.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Path the repo config was loaded from.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();

        assert_eq!(config.remote(), "origin");
        assert_eq!(config.remote_url(), None);
        assert_eq!(config.integration_branch(), "master");
        assert_eq!(config.transient_suffix(), "-tmp");
        assert_eq!(config.default_version(), "1.0");
        assert_eq!(config.author_name(), "fleetconf");
        assert_eq!(config.pull_interval(), Duration::from_secs(60));
        assert!(config.credentials_file().is_none());
        assert!(config.registry_file().is_none());
    }

    #[test]
    fn load_global_from_env() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            pull_interval_secs = 5

            [author]
            name = "node-b"
            "#,
        )
        .unwrap();

        std::env::set_var("FLEETCONF_CONFIG", config_path.to_str().unwrap());
        let config = Config::load(None).unwrap();
        std::env::remove_var("FLEETCONF_CONFIG");

        assert_eq!(config.pull_interval(), Duration::from_secs(5));
        assert_eq!(config.author_name(), "node-b");
        assert_eq!(config.global_config_loaded_from(), Some(config_path.as_path()));
    }

    #[test]
    fn load_repo_config() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".git/fleetconf");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            r#"
            remote = "upstream"
            remote_url = "/srv/fleet.git"
            integration_branch = "main"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(temp.path())).unwrap();

        assert_eq!(config.remote(), "upstream");
        assert_eq!(config.remote_url(), Some("/srv/fleet.git"));
        assert_eq!(config.integration_branch(), "main");
        assert!(config.repo_config_loaded_from().is_some());
    }

    #[test]
    fn invalid_repo_config_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".git/fleetconf");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "integration_branch = \"a..b\"").unwrap();

        assert!(matches!(
            Config::load(Some(temp.path())),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn unparseable_repo_config_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".git/fleetconf");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "remote = [").unwrap();

        assert!(matches!(
            Config::load(Some(temp.path())),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn write_repo_config_atomic() {
        let temp = TempDir::new().unwrap();
        let repo = RepoConfig {
            default_version: Some("2.0".to_string()),
            ..Default::default()
        };

        let path = Config::write_repo(temp.path(), &repo).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());

        let loaded = Config::load(Some(temp.path())).unwrap();
        assert_eq!(loaded.default_version(), "2.0");
    }

    #[test]
    fn from_parts_validates() {
        let repo = RepoConfig {
            remote: Some(String::new()),
            ..Default::default()
        };
        assert!(Config::from_parts(GlobalConfig::default(), Some(repo)).is_err());
    }
}
