//! core::paths
//!
//! Centralized path routing for the store.
//!
//! # Working-tree layout
//!
//! Every version branch carries the same layout:
//!
//! ```text
//! profiles/
//!   <profile>/
//!     fleet.agent.properties      # container configuration, also the marker file
//!     fleet.profile.properties    # profile attributes
//!     <pid>.properties            # one file per configuration pid
//!     <any/relative/file>         # arbitrary file configurations
//! ```
//!
//! # Private storage
//!
//! Store-private data lives under `<git_dir>/fleetconf/`, outside the
//! working tree so it never gets committed:
//! - `config.toml` - Repository-scoped configuration
//! - `lock` - Cross-process coordinator lock
//!
//! **Hard rule:** no code outside this module joins layout segments by hand.
//!
//! # Example
//!
//! ```
//! use fleetconf::core::paths::StorePaths;
//! use std::path::PathBuf;
//!
//! let paths = StorePaths::new(PathBuf::from("/data/repo"), PathBuf::from("/data/repo/.git"));
//!
//! assert_eq!(paths.lock_path(), PathBuf::from("/data/repo/.git/fleetconf/lock"));
//! assert_eq!(paths.profile_rel("web"), "profiles/web");
//! assert_eq!(paths.pid_rel("web", "my.pid"), "profiles/web/my.pid.properties");
//! ```

use std::path::{Path, PathBuf};

/// Directory (relative to the work dir) holding all profiles.
pub const PROFILES_DIR: &str = "profiles";

/// Suffix of a pid's configuration file.
pub const PROPERTIES_SUFFIX: &str = ".properties";

/// Container-configuration pid. Its file doubles as the profile marker.
pub const AGENT_PID: &str = "fleet.agent";

/// Dedicated profile attributes pid.
pub const ATTRIBUTES_PID: &str = "fleet.profile";

/// Path routing for one working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    /// The checked-out working tree.
    pub work_dir: PathBuf,
    /// The repository's `.git` directory.
    pub git_dir: PathBuf,
}

impl StorePaths {
    /// Create paths for a working tree and its git directory.
    pub fn new(work_dir: PathBuf, git_dir: PathBuf) -> Self {
        Self { work_dir, git_dir }
    }

    // =========================================================================
    // Private storage
    // =========================================================================

    /// Root of store-private data.
    pub fn private_dir(&self) -> PathBuf {
        self.git_dir.join("fleetconf")
    }

    /// Repository-scoped configuration file.
    pub fn repo_config_path(&self) -> PathBuf {
        self.private_dir().join("config.toml")
    }

    /// Cross-process lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.private_dir().join("lock")
    }

    // =========================================================================
    // Working-tree layout (relative, `/`-separated, for staging)
    // =========================================================================

    /// Relative path of a profile directory.
    pub fn profile_rel(&self, profile: &str) -> String {
        format!("{}/{}", PROFILES_DIR, profile)
    }

    /// Relative path of a file configuration inside a profile.
    pub fn file_rel(&self, profile: &str, file_name: &str) -> String {
        format!("{}/{}/{}", PROFILES_DIR, profile, file_name)
    }

    /// Relative path of a pid's properties file.
    pub fn pid_rel(&self, profile: &str, pid: &str) -> String {
        self.file_rel(profile, &pid_file_name(pid))
    }

    // =========================================================================
    // Working-tree layout (absolute)
    // =========================================================================

    /// Absolute path of the profiles directory.
    pub fn profiles_dir(&self) -> PathBuf {
        self.work_dir.join(PROFILES_DIR)
    }

    /// Absolute path of a profile directory.
    pub fn profile_dir(&self, profile: &str) -> PathBuf {
        self.profiles_dir().join(profile)
    }

    /// Absolute path of a file configuration.
    pub fn file_path(&self, profile: &str, file_name: &str) -> PathBuf {
        let mut path = self.profile_dir(profile);
        for segment in file_name.split('/') {
            path.push(segment);
        }
        path
    }

    /// Absolute path of the profile's marker (agent) file.
    pub fn marker_path(&self, profile: &str) -> PathBuf {
        self.profile_dir(profile).join(pid_file_name(AGENT_PID))
    }

    /// Resolve a path inside the working tree into its relative form.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.work_dir).ok()
    }
}

/// File name for a pid (`<pid>.properties`).
pub fn pid_file_name(pid: &str) -> String {
    format!("{}{}", pid, PROPERTIES_SUFFIX)
}

/// Pid for a file name, if it names a properties file.
///
/// # Example
///
/// ```
/// use fleetconf::core::paths::pid_for_file;
///
/// assert_eq!(pid_for_file("my.pid.properties"), Some("my.pid"));
/// assert_eq!(pid_for_file("jetty.xml"), None);
/// assert_eq!(pid_for_file("dir/x.properties"), None);
/// ```
pub fn pid_for_file(file_name: &str) -> Option<&str> {
    if file_name.contains('/') {
        return None;
    }
    file_name
        .strip_suffix(PROPERTIES_SUFFIX)
        .filter(|pid| !pid.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> StorePaths {
        StorePaths::new(PathBuf::from("/repo"), PathBuf::from("/repo/.git"))
    }

    #[test]
    fn private_paths_live_in_git_dir() {
        let p = paths();
        assert_eq!(p.private_dir(), PathBuf::from("/repo/.git/fleetconf"));
        assert_eq!(
            p.repo_config_path(),
            PathBuf::from("/repo/.git/fleetconf/config.toml")
        );
        assert!(p.lock_path().starts_with(&p.git_dir));
    }

    #[test]
    fn layout_paths() {
        let p = paths();
        assert_eq!(p.profile_dir("web"), PathBuf::from("/repo/profiles/web"));
        assert_eq!(
            p.file_path("web", "conf/jetty.xml"),
            PathBuf::from("/repo/profiles/web/conf/jetty.xml")
        );
        assert_eq!(
            p.marker_path("web"),
            PathBuf::from("/repo/profiles/web/fleet.agent.properties")
        );
    }

    #[test]
    fn relative_paths() {
        let p = paths();
        assert_eq!(p.file_rel("web", "a/b"), "profiles/web/a/b");
        assert_eq!(p.pid_rel("web", ATTRIBUTES_PID), "profiles/web/fleet.profile.properties");
        assert_eq!(
            p.relative(Path::new("/repo/profiles/web")),
            Some(Path::new("profiles/web"))
        );
        assert_eq!(p.relative(Path::new("/elsewhere")), None);
    }

    #[test]
    fn pid_file_mapping() {
        assert_eq!(pid_file_name("a.b"), "a.b.properties");
        assert_eq!(pid_for_file("a.b.properties"), Some("a.b"));
        assert_eq!(pid_for_file(".properties"), None);
    }
}
