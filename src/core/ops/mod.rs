//! core::ops
//!
//! Operation locking.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive lock on a store's working tree
//!
//! # Architecture
//!
//! Every transaction:
//! 1. Takes the coordinator's in-process mutex
//! 2. Acquires the exclusive repo lock
//! 3. Runs stash, pull, work, commit and push
//! 4. Drops the lock (released even if the unit of work fails)

pub mod lock;

pub use lock::{LockError, RepoLock};
