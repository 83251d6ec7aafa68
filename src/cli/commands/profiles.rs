//! cli::commands::profiles
//!
//! Profile listing, creation and deletion.

use anyhow::Result;

use super::{open_store, target_version};
use crate::cli::Context;
use crate::store::DataStore;

pub fn profiles(ctx: &Context, at: Option<String>) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let version = target_version(&store, at)?;
    for profile in store.profiles(&version)? {
        println!("{}", profile);
    }
    Ok(())
}

pub fn create_profile(ctx: &Context, profile: &str, at: Option<String>) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let version = target_version(&store, at)?;
    store.create_profile(&version, profile)?;
    println!("Created profile {} in version {}", profile, version);
    Ok(())
}

pub fn delete_profile(ctx: &Context, profile: &str, at: Option<String>) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let version = target_version(&store, at)?;
    store.delete_profile(&version, profile)?;
    println!("Deleted profile {} from version {}", profile, version);
    Ok(())
}
