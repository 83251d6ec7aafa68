//! registry::file_store
//!
//! File-backed registry.
//!
//! Entries are stored as one TOML table keyed by path. Every write rewrites
//! the file atomically (temp file, then rename); a process-local lock keeps
//! read-modify-write cycles from interleaving.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{Registry, RegistryError};

/// Registry persisted to a TOML file.
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRegistry {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, RegistryError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| RegistryError::ReadError(format!("cannot read registry file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| RegistryError::ReadError(format!("cannot parse registry file: {}", e)))
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RegistryError::WriteError(format!("cannot create directory: {}", e)))?;
        }

        let content = toml::to_string_pretty(entries)
            .map_err(|e| RegistryError::WriteError(format!("cannot serialize registry: {}", e)))?;

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| RegistryError::WriteError(format!("cannot create temp file: {}", e)))?;
            file.write_all(content.as_bytes())
                .map_err(|e| RegistryError::WriteError(format!("cannot write registry: {}", e)))?;
            file.sync_all()
                .map_err(|e| RegistryError::WriteError(format!("cannot sync to disk: {}", e)))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| RegistryError::WriteError(format!("cannot rename temp file: {}", e)))
    }
}

impl Registry for FileRegistry {
    fn get(&self, path: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.read_entries()?.remove(path))
    }

    fn set(&self, path: &str, value: &str) -> Result<(), RegistryError> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_entries()?;
        entries.insert(path.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    fn delete(&self, path: &str) -> Result<(), RegistryError> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_entries()?;
        if entries.remove(path).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}
