//! cli::commands::settings
//!
//! Pid settings, file listings and profile attributes.

use anyhow::Result;

use super::{open_store, target_version};
use crate::cli::args::KeyValue;
use crate::cli::Context;
use crate::core::properties;
use crate::store::{DataStore, Properties};

/// Print one pid's settings, or the profile's pids when none is named.
pub fn get(ctx: &Context, profile: &str, pid: Option<&str>, at: Option<String>) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let version = target_version(&store, at)?;

    match pid {
        Some(pid) => {
            let settings = store.configuration(&version, profile, pid)?;
            print!("{}", properties::serialize(&settings));
        }
        None => {
            for pid in store.configurations(&version, profile)?.keys() {
                println!("{}", pid);
            }
        }
    }
    Ok(())
}

/// Merge (or replace) a pid's settings.
pub fn set(
    ctx: &Context,
    profile: &str,
    pid: &str,
    pairs: &[KeyValue],
    unset: &[String],
    replace: bool,
    at: Option<String>,
) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let version = target_version(&store, at)?;

    let mut settings = if replace {
        Properties::new()
    } else {
        store.configuration(&version, profile, pid)?
    };
    for kv in pairs {
        settings.insert(kv.key.clone(), kv.value.clone());
    }
    for key in unset {
        settings.remove(key);
    }

    store.set_configuration(&version, profile, pid, Some(&settings))?;
    if settings.is_empty() {
        println!("Deleted {} from {}/{}", pid, version, profile);
    } else {
        println!("Updated {} in {}/{}", pid, version, profile);
    }
    Ok(())
}

/// List a profile's files with their sizes.
pub fn files(ctx: &Context, profile: &str, at: Option<String>) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let version = target_version(&store, at)?;
    for (name, content) in store.file_configurations(&version, profile)? {
        println!("{:>8}  {}", content.len(), name);
    }
    Ok(())
}

/// Print profile attributes, preceded by a last-modified comment, after applying changes.
pub fn attributes(
    ctx: &Context,
    profile: &str,
    set: &[KeyValue],
    unset: &[String],
    at: Option<String>,
) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let version = target_version(&store, at)?;

    for kv in set {
        store.set_profile_attribute(&version, profile, &kv.key, Some(&kv.value))?;
    }
    for key in unset {
        store.set_profile_attribute(&version, profile, key, None)?;
    }

    if let Some(ts) = store.last_modified(&version, profile)? {
        println!("# last modified {}", ts.to_rfc3339());
    }
    for (key, value) in store.profile_attributes(&version, profile)? {
        println!("{}={}", key, value);
    }
    Ok(())
}
