//! fleetconf - versioned, replicated profile configuration
//!
//! fleetconf stores the configuration of a container fleet in a git
//! repository shared by every management node. Each version is a branch,
//! each profile a directory, and each pid a `.properties` file. Nodes
//! converge by pulling from a shared remote; local writes are committed and
//! pushed immediately.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, calls the store)
//! - [`store`] - Domain API: versions, profiles, configurations, cache, import
//! - [`engine`] - Transaction coordinator, remote sync, change notification
//! - [`core`] - Domain types, naming, layout, properties codec, config, locking
//! - [`git`] - Single interface for all Git operations
//! - [`credentials`] - Credentials for the shared remote
//! - [`registry`] - Metadata registry for version attributes
//!
//! # Correctness Invariants
//!
//! 1. Every access to the working tree runs inside one coordinator transaction
//! 2. The integration branch is never exposed as a version
//! 3. Pull and push failures never abort a transaction
//! 4. Caches are cleared inside the transaction that changed the store

pub mod cli;
pub mod core;
pub mod credentials;
pub mod engine;
pub mod git;
pub mod registry;
pub mod store;
