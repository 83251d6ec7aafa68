//! core
//!
//! Core domain types, schemas, and operations for fleetconf.
//!
//! # Modules
//!
//! - [`types`] - Strong types: VersionName, Oid, RefName, Fingerprint
//! - [`naming`] - Profile, pid and file name validation
//! - [`paths`] - Centralized path routing for the working-tree layout
//! - [`properties`] - `.properties` codec
//! - [`config`] - Configuration schema and loading
//! - [`ops`] - Cross-process locking
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing in here talks to git

pub mod config;
pub mod naming;
pub mod ops;
pub mod paths;
pub mod properties;
pub mod types;
