//! store::layout
//!
//! Reading and writing profiles in the checked-out working tree.
//!
//! These helpers only touch the filesystem. Callers stage what they change
//! and must run inside a transaction with the right version checked out.
//!
//! # Legacy pid directories
//!
//! Older trees stored a pid as a directory `<pid>.properties/` holding one
//! file per key, the file content being the value. Such a directory reads as
//! a single file configuration whose content is the serialized key/value map.
//! Writing the pid replaces the directory with a regular file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use super::error::StoreError;
use crate::core::paths::{pid_for_file, StorePaths};
use crate::core::properties;

pub(crate) fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|n| n.starts_with('.')).unwrap_or(true)
}

pub(crate) fn walk_error(err: walkdir::Error) -> StoreError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
    StoreError::io(path, source)
}

/// `/`-joined form of a path relative to `base`.
pub(crate) fn rel_name(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    parts.map(|p| p.join("/"))
}

/// Whether the profile directory holds at least one file.
///
/// Git does not track directories, so an empty directory is not a profile.
pub fn profile_exists(paths: &StorePaths, profile: &str) -> bool {
    let dir = paths.profile_dir(profile);
    dir.is_dir()
        && WalkDir::new(&dir)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .any(|e| e.file_type().is_file())
}

/// Profiles present in the working tree, sorted.
pub fn list_profiles(paths: &StorePaths) -> Result<Vec<String>, StoreError> {
    let root = paths.profiles_dir();
    let entries = match fs::read_dir(&root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(root, e)),
    };

    let mut profiles = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(&root, e))?;
        if is_hidden(&entry.file_name()) {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if profile_exists(paths, &name) {
            profiles.push(name);
        }
    }
    profiles.sort();
    Ok(profiles)
}

/// Content of a legacy pid directory, as serialized properties.
fn read_legacy_pid(dir: &Path) -> Result<Vec<u8>, StoreError> {
    let mut map = BTreeMap::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(key) = rel_name(dir, entry.path()) else {
            continue;
        };
        let bytes = fs::read(entry.path()).map_err(|e| StoreError::io(entry.path(), e))?;
        let value = String::from_utf8_lossy(&bytes);
        map.insert(key, value.trim_end_matches(['\r', '\n']).to_string());
    }
    Ok(properties::serialize(&map).into_bytes())
}

/// Every file of a profile, keyed by relative name. Missing profile reads as empty.
pub fn read_files(paths: &StorePaths, profile: &str) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
    let dir = paths.profile_dir(profile);
    let mut files = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    let mut walker = WalkDir::new(&dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.file_name()));

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(walk_error)?;
        let Some(name) = rel_name(&dir, entry.path()) else {
            continue;
        };

        if entry.file_type().is_dir() {
            if entry.depth() == 1 && pid_for_file(&name).is_some() {
                files.insert(name, read_legacy_pid(entry.path())?);
                walker.skip_current_dir();
            }
            continue;
        }

        if entry.file_type().is_file() {
            let bytes = fs::read(entry.path()).map_err(|e| StoreError::io(entry.path(), e))?;
            files.insert(name, bytes);
        }
    }

    Ok(files)
}

/// One file of a profile, or `None` when absent.
pub fn read_file(paths: &StorePaths, profile: &str, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
    let path = paths.file_path(profile, name);
    if path.is_file() {
        return fs::read(&path)
            .map(Some)
            .map_err(|e| StoreError::io(path, e));
    }
    if path.is_dir() && pid_for_file(name).is_some() {
        return read_legacy_pid(&path).map(Some);
    }
    Ok(None)
}

/// Write one file. Returns whether the content changed.
pub fn write_file(
    paths: &StorePaths,
    profile: &str,
    name: &str,
    content: &[u8],
) -> Result<bool, StoreError> {
    let path = paths.file_path(profile, name);

    if path.is_dir() {
        fs::remove_dir_all(&path).map_err(|e| StoreError::io(&path, e))?;
    } else if path.is_file() {
        let current = fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        if current == content {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    fs::write(&path, content).map_err(|e| StoreError::io(&path, e))?;
    Ok(true)
}

/// Remove one file (or legacy pid directory). Returns whether anything was removed.
///
/// Directories left empty are removed up to, but not including, the
/// profiles root.
pub fn remove_file(paths: &StorePaths, profile: &str, name: &str) -> Result<bool, StoreError> {
    let path = paths.file_path(profile, name);
    if path.is_dir() {
        fs::remove_dir_all(&path).map_err(|e| StoreError::io(&path, e))?;
    } else if path.exists() {
        fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
    } else {
        return Ok(false);
    }

    prune_empty_parents(&path, &paths.profiles_dir());
    Ok(true)
}

fn prune_empty_parents(removed: &Path, stop: &Path) {
    let mut current: Option<PathBuf> = removed.parent().map(Path::to_path_buf);
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        let empty = fs::read_dir(&dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !empty || fs::remove_dir(&dir).is_err() {
            break;
        }
        current = dir.parent().map(Path::to_path_buf);
    }
}

/// Latest modification time of the profile directory and its marker.
pub fn last_modified(paths: &StorePaths, profile: &str) -> Option<SystemTime> {
    [paths.profile_dir(profile), paths.marker_path(profile)]
        .iter()
        .filter_map(|p| fs::metadata(p).and_then(|m| m.modified()).ok())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths(dir: &TempDir) -> StorePaths {
        StorePaths::new(dir.path().to_path_buf(), dir.path().join(".git"))
    }

    #[test]
    fn empty_directories_are_not_profiles() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);
        fs::create_dir_all(paths.profile_dir("ghost/nested")).unwrap();
        write_file(&paths, "web", "fleet.agent.properties", b"#Profile:web\n").unwrap();

        assert_eq!(list_profiles(&paths).unwrap(), vec!["web".to_string()]);
        assert!(!profile_exists(&paths, "ghost"));
    }

    #[test]
    fn missing_profiles_dir_lists_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(list_profiles(&paths(&dir)).unwrap().is_empty());
    }

    #[test]
    fn nested_files_use_slash_names() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);
        write_file(&paths, "web", "jetty/jetty.xml", b"<xml/>").unwrap();
        write_file(&paths, "web", "a.properties", b"x=1\n").unwrap();

        let files = read_files(&paths, "web").unwrap();
        let names: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a.properties", "jetty/jetty.xml"]);
    }

    #[test]
    fn legacy_pid_directory_reads_as_one_file() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);
        let legacy = paths.profile_dir("web").join("old.pid.properties");
        fs::create_dir_all(&legacy).unwrap();
        fs::write(legacy.join("b"), "2\n").unwrap();
        fs::write(legacy.join("a"), "1").unwrap();

        let files = read_files(&paths, "web").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files["old.pid.properties"], b"a=1\nb=2\n".to_vec());
        assert_eq!(
            read_file(&paths, "web", "old.pid.properties").unwrap(),
            Some(b"a=1\nb=2\n".to_vec())
        );

        assert!(write_file(&paths, "web", "old.pid.properties", b"a=3\n").unwrap());
        assert!(legacy.is_file());
    }

    #[test]
    fn unchanged_write_reports_false() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);
        assert!(write_file(&paths, "web", "f", b"x").unwrap());
        assert!(!write_file(&paths, "web", "f", b"x").unwrap());
        assert!(write_file(&paths, "web", "f", b"y").unwrap());
    }

    #[test]
    fn remove_prunes_empty_parents() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);
        write_file(&paths, "web", "deep/er/file.txt", b"x").unwrap();

        assert!(remove_file(&paths, "web", "deep/er/file.txt").unwrap());
        assert!(!paths.profile_dir("web").exists());
        assert!(paths.profiles_dir().exists());
        assert!(!remove_file(&paths, "web", "deep/er/file.txt").unwrap());
    }

    #[test]
    fn last_modified_tracks_marker() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);
        assert!(last_modified(&paths, "web").is_none());
        write_file(&paths, "web", "fleet.agent.properties", b"#Profile:web\n").unwrap();
        assert!(last_modified(&paths, "web").is_some());
    }
}
