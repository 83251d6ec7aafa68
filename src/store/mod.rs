//! store
//!
//! The versioned configuration store.
//!
//! # Architecture
//!
//! - [`DataStore`] is the domain API: versions, profiles, file and pid
//!   configurations, attributes, import and sync.
//! - [`GitDataStore`] implements it on a git working tree, expressing every
//!   operation as one transaction of the engine's coordinator.
//! - [`CachingDataStore`] decorates any [`DataStore`] with a read-through
//!   cache cleared on every change notification.
//!
//! # Example
//!
//! ```no_run
//! use fleetconf::store::{CachingDataStore, DataStore, GitDataStore, StoreOptions};
//! use std::collections::BTreeMap;
//!
//! let store = CachingDataStore::new(GitDataStore::open(StoreOptions::new("/tmp/fleet")).unwrap());
//! store.create_version("1.0").unwrap();
//! store.create_profile("1.0", "web").unwrap();
//!
//! let mut settings = BTreeMap::new();
//! settings.insert("port".to_string(), "8080".to_string());
//! store.set_configuration("1.0", "web", "http", Some(&settings)).unwrap();
//! assert_eq!(store.configuration("1.0", "web", "http").unwrap(), settings);
//! ```

mod cache;
mod error;
mod git_store;
mod import;
mod layout;
mod options;
mod traits;

pub use cache::{CacheMap, CachingDataStore};
pub use error::StoreError;
pub use git_store::{GitDataStore, ABSTRACT_ATTRIBUTE, HIDDEN_ATTRIBUTE, PARENTS_ATTRIBUTE};
pub use options::StoreOptions;
pub use traits::{DataStore, ImportSummary, Properties};
