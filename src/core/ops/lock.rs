//! core::ops::lock
//!
//! Cross-process lock on a store's working tree.
//!
//! The transaction coordinator serializes callers inside one process with a
//! mutex. Two processes pointed at the same working tree would still race on
//! checkout and commit, so the coordinator also holds this OS-level lock,
//! `<git_dir>/fleetconf/lock`, for the duration of every transaction.
//!
//! The lock is released when the guard drops, including when the unit of
//! work fails or panics.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::PathBuf;

use fs2::FileExt;
use thiserror::Error;
use tracing::trace;

use crate::core::paths::StorePaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to open lock file {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to lock {}: {source}", path.display())]
    Acquire { path: PathBuf, source: io::Error },
}

/// Exclusive lock guard on a store's working tree.
#[derive(Debug)]
pub struct RepoLock {
    file: File,
}

impl RepoLock {
    /// Acquire the lock, blocking until no other process holds it.
    pub fn acquire(paths: &StorePaths) -> Result<Self, LockError> {
        let path = paths.lock_path();
        let open_err = |source| LockError::Open {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(paths.private_dir()).map_err(open_err)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(open_err)?;

        file.lock_exclusive().map_err(|source| LockError::Acquire {
            path: path.clone(),
            source,
        })?;
        trace!(path = %path.display(), "repo lock acquired");
        Ok(Self { file })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths(dir: &TempDir) -> StorePaths {
        StorePaths::new(dir.path().to_path_buf(), dir.path().join(".git"))
    }

    /// Whether another handle could take the lock right now.
    fn is_free(paths: &StorePaths) -> bool {
        let file = File::open(paths.lock_path()).unwrap();
        let free = file.try_lock_exclusive().is_ok();
        if free {
            file.unlock().unwrap();
        }
        free
    }

    #[test]
    fn acquire_creates_lock_file() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);
        assert!(!paths.private_dir().exists());

        let _lock = RepoLock::acquire(&paths).unwrap();
        assert!(paths.lock_path().is_file());
    }

    #[test]
    fn held_until_dropped() {
        let dir = TempDir::new().unwrap();
        let paths = paths(&dir);

        let lock = RepoLock::acquire(&paths).unwrap();
        assert!(!is_free(&paths));
        drop(lock);
        assert!(is_free(&paths));

        // Re-acquiring after release works.
        let _again = RepoLock::acquire(&paths).unwrap();
    }

    #[test]
    fn unwritable_location_is_an_open_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let paths = StorePaths::new(dir.path().to_path_buf(), blocker);

        assert!(matches!(
            RepoLock::acquire(&paths),
            Err(LockError::Open { .. })
        ));
    }
}
