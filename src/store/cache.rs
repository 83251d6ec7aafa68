//! store::cache
//!
//! Read-through cache in front of a [`DataStore`].
//!
//! Four independent maps memoize the hottest reads:
//!
//! | Map              | Key                      | Value                     |
//! |------------------|--------------------------|---------------------------|
//! | versions         | -                        | version list              |
//! | profiles         | version                  | profile list              |
//! | configurations   | (version, profile)       | pid -> settings           |
//! | configuration    | (version, profile, pid)  | settings                  |
//!
//! Every map is cleared in its entirety whenever the inner store's change
//! notifier fires. The notifier runs inside the transaction that caused the
//! change, so a clear is ordered with the write that triggered it.
//!
//! A load that started before a clear must not repopulate the map with what
//! it read. Each map carries a generation counter bumped by every clear, and
//! a load only inserts if the generation it started under is still current.
//!
//! Everything else passes straight through.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::trace;

use super::error::StoreError;
use super::traits::{DataStore, ImportSummary, Properties};
use crate::engine::{ChangeListener, PullOutcome, PushOutcome};

struct Slot<K, V> {
    generation: u64,
    entries: HashMap<K, V>,
}

/// One memoized map with generation-checked inserts.
pub struct CacheMap<K, V> {
    name: &'static str,
    slot: RwLock<Slot<K, V>>,
}

impl<K, V> CacheMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: RwLock::new(Slot {
                generation: 0,
                entries: HashMap::new(),
            }),
        }
    }

    /// Cached value for `key`, loading it on a miss.
    pub fn get_or_load<F>(&self, key: &K, load: F) -> Result<V, StoreError>
    where
        F: FnOnce() -> Result<V, StoreError>,
    {
        let generation = {
            let slot = self.slot.read();
            if let Some(value) = slot.entries.get(key) {
                return Ok(value.clone());
            }
            slot.generation
        };

        trace!(cache = self.name, "miss");
        let value = load()?;

        let mut slot = self.slot.write();
        if slot.generation == generation {
            slot.entries.insert(key.clone(), value.clone());
        }
        Ok(value)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut slot = self.slot.write();
        slot.generation += 1;
        slot.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.slot.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type VersionProfile = (String, String);
type VersionProfilePid = (String, String, String);

struct Caches {
    versions: CacheMap<(), Vec<String>>,
    profiles: CacheMap<String, Vec<String>>,
    configurations: CacheMap<VersionProfile, BTreeMap<String, Properties>>,
    configuration: CacheMap<VersionProfilePid, Properties>,
}

impl Caches {
    fn clear(&self) {
        self.versions.clear();
        self.profiles.clear();
        self.configurations.clear();
        self.configuration.clear();
    }
}

/// [`DataStore`] decorator memoizing listings and pid reads.
pub struct CachingDataStore<S> {
    inner: S,
    caches: Arc<Caches>,
}

impl<S: DataStore> CachingDataStore<S> {
    /// Wrap `inner` and subscribe to its change notifications.
    pub fn new(inner: S) -> Self {
        let caches = Arc::new(Caches {
            versions: CacheMap::new("versions"),
            profiles: CacheMap::new("profiles"),
            configurations: CacheMap::new("configurations"),
            configuration: CacheMap::new("configuration"),
        });

        let listener_caches = Arc::clone(&caches);
        inner.subscribe(Box::new(move || {
            trace!("store changed, clearing caches");
            listener_caches.clear();
        }));

        Self { inner, caches }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        self.caches.clear();
    }

    /// Number of cached entries across all maps.
    pub fn cached_entries(&self) -> usize {
        self.caches.versions.len()
            + self.caches.profiles.len()
            + self.caches.configurations.len()
            + self.caches.configuration.len()
    }
}

impl<S: DataStore> DataStore for CachingDataStore<S> {
    fn versions(&self) -> Result<Vec<String>, StoreError> {
        self.caches
            .versions
            .get_or_load(&(), || self.inner.versions())
    }

    fn has_version(&self, version: &str) -> Result<bool, StoreError> {
        Ok(self.versions()?.iter().any(|v| v == version))
    }

    fn create_version(&self, version: &str) -> Result<(), StoreError> {
        self.inner.create_version(version)
    }

    fn create_version_from(&self, parent: &str, version: &str) -> Result<(), StoreError> {
        self.inner.create_version_from(parent, version)
    }

    fn delete_version(&self, version: &str) -> Result<(), StoreError> {
        self.inner.delete_version(version)
    }

    fn version_attributes(&self, version: &str) -> Result<BTreeMap<String, String>, StoreError> {
        self.inner.version_attributes(version)
    }

    fn set_version_attribute(
        &self,
        version: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), StoreError> {
        self.inner.set_version_attribute(version, key, value)
    }

    fn default_version(&self) -> Result<String, StoreError> {
        self.inner.default_version()
    }

    fn set_default_version(&self, version: &str) -> Result<(), StoreError> {
        self.inner.set_default_version(version)
    }

    fn profiles(&self, version: &str) -> Result<Vec<String>, StoreError> {
        self.caches
            .profiles
            .get_or_load(&version.to_string(), || self.inner.profiles(version))
    }

    fn has_profile(&self, version: &str, profile: &str) -> Result<bool, StoreError> {
        self.inner.has_profile(version, profile)
    }

    fn profile(
        &self,
        version: &str,
        profile: &str,
        create: bool,
    ) -> Result<Option<String>, StoreError> {
        self.inner.profile(version, profile, create)
    }

    fn create_profile(&self, version: &str, profile: &str) -> Result<String, StoreError> {
        self.inner.create_profile(version, profile)
    }

    fn delete_profile(&self, version: &str, profile: &str) -> Result<(), StoreError> {
        self.inner.delete_profile(version, profile)
    }

    fn profile_attributes(&self, version: &str, profile: &str) -> Result<Properties, StoreError> {
        self.inner.profile_attributes(version, profile)
    }

    fn set_profile_attribute(
        &self,
        version: &str,
        profile: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), StoreError> {
        self.inner.set_profile_attribute(version, profile, key, value)
    }

    fn last_modified(
        &self,
        version: &str,
        profile: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.inner.last_modified(version, profile)
    }

    fn file_configurations(
        &self,
        version: &str,
        profile: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        self.inner.file_configurations(version, profile)
    }

    fn file_configuration(
        &self,
        version: &str,
        profile: &str,
        file_name: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.file_configuration(version, profile, file_name)
    }

    fn set_file_configurations(
        &self,
        version: &str,
        profile: &str,
        files: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), StoreError> {
        self.inner.set_file_configurations(version, profile, files)
    }

    fn set_file_configuration(
        &self,
        version: &str,
        profile: &str,
        file_name: &str,
        content: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        self.inner
            .set_file_configuration(version, profile, file_name, content)
    }

    fn configurations(
        &self,
        version: &str,
        profile: &str,
    ) -> Result<BTreeMap<String, Properties>, StoreError> {
        let key = (version.to_string(), profile.to_string());
        self.caches
            .configurations
            .get_or_load(&key, || self.inner.configurations(version, profile))
    }

    fn configuration(
        &self,
        version: &str,
        profile: &str,
        pid: &str,
    ) -> Result<Properties, StoreError> {
        let key = (version.to_string(), profile.to_string(), pid.to_string());
        self.caches
            .configuration
            .get_or_load(&key, || self.inner.configuration(version, profile, pid))
    }

    fn set_configuration(
        &self,
        version: &str,
        profile: &str,
        pid: &str,
        settings: Option<&Properties>,
    ) -> Result<(), StoreError> {
        self.inner.set_configuration(version, profile, pid, settings)
    }

    fn set_configurations(
        &self,
        version: &str,
        profile: &str,
        configurations: &BTreeMap<String, Properties>,
    ) -> Result<(), StoreError> {
        self.inner.set_configurations(version, profile, configurations)
    }

    fn import_from_filesystem(&self, path: &Path) -> Result<ImportSummary, StoreError> {
        self.inner.import_from_filesystem(path)
    }

    fn pull(&self) -> Result<PullOutcome, StoreError> {
        self.inner.pull()
    }

    fn push(&self) -> Result<PushOutcome, StoreError> {
        self.inner.push()
    }

    fn subscribe(&self, listener: ChangeListener) {
        self.inner.subscribe(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn loads_once_until_cleared() {
        let map: CacheMap<String, u32> = CacheMap::new("test");
        let loads = AtomicUsize::new(0);
        let load = || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };

        assert_eq!(map.get_or_load(&"a".to_string(), load).unwrap(), 7);
        assert_eq!(map.get_or_load(&"a".to_string(), load).unwrap(), 7);
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        map.clear();
        assert!(map.is_empty());
        map.get_or_load(&"a".to_string(), load).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn load_racing_a_clear_is_not_cached() {
        let map: CacheMap<(), u32> = CacheMap::new("test");
        let value = map
            .get_or_load(&(), || {
                map.clear();
                Ok(1)
            })
            .unwrap();
        assert_eq!(value, 1);
        assert!(map.is_empty());
    }

    #[test]
    fn errors_are_not_cached() {
        let map: CacheMap<(), u32> = CacheMap::new("test");
        let result = map.get_or_load(&(), || Err(StoreError::NotSupported("load")));
        assert!(result.is_err());
        assert!(map.is_empty());
        assert_eq!(map.get_or_load(&(), || Ok(2)).unwrap(), 2);
    }
}
