//! cli::commands::versions
//!
//! Version listing, creation and attributes.

use anyhow::{bail, Result};

use super::open_store;
use crate::cli::args::KeyValue;
use crate::cli::Context;
use crate::store::{DataStore, StoreError};

/// Print every version, marking the default one.
pub fn versions(ctx: &Context) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let default = store.default_version()?;
    for version in store.versions()? {
        let marker = if version == default { "*" } else { " " };
        println!("{} {}", marker, version);
    }
    Ok(())
}

pub fn create_version(ctx: &Context, name: &str, parent: Option<&str>) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    match parent {
        Some(parent) => store.create_version_from(parent, name)?,
        None => store.create_version(name)?,
    }
    println!("Created version {}", name);
    Ok(())
}

pub fn delete_version(ctx: &Context, name: &str) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    match store.delete_version(name) {
        Ok(()) => {
            println!("Deleted version {}", name);
            Ok(())
        }
        Err(StoreError::NotSupported(_)) => {
            bail!("deleting versions is not supported; '{}' was left in place", name)
        }
        Err(e) => Err(e.into()),
    }
}

/// Print the default version, or change it.
pub fn default_version(ctx: &Context, set: Option<&str>) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    if let Some(version) = set {
        store.set_default_version(version)?;
    }
    println!("{}", store.default_version()?);
    Ok(())
}

pub fn version_attributes(
    ctx: &Context,
    name: &str,
    set: &[KeyValue],
    unset: &[String],
) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    for kv in set {
        store.set_version_attribute(name, &kv.key, Some(&kv.value))?;
    }
    for key in unset {
        store.set_version_attribute(name, key, None)?;
    }
    for (key, value) in store.version_attributes(name)? {
        println!("{}={}", key, value);
    }
    Ok(())
}
