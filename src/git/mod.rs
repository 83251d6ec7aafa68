//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. Every working-tree
//! primitive the store drives (branch list/create/delete, checkout, stash,
//! stage, commit, clean, fetch, push) flows through [`Git`]. No other
//! module imports `git2`.
//!
//! # Responsibilities
//!
//! - Repository opening and bootstrap (integration branch plus initial commit)
//! - Branch enumeration (local and remote-tracking) and tip fingerprints
//! - Working-tree mutation: checkout, stash, clean, stage, commit
//! - Ancestry queries for reconciliation
//! - Fetch and push with credential callbacks
//!
//! # Invariants
//!
//! - No other module calls git2 directly
//! - All operations return strong types (Oid, RefName, Fingerprint)
//! - Working-tree mutations assume the caller holds the transaction lock

mod interface;
mod remote;

pub use interface::{Git, GitError, Identity, RefEntry};
pub use remote::RefPushResult;
