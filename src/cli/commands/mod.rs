//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each handler:
//! 1. Opens the store for the context's working tree
//! 2. Calls the [`DataStore`] API
//! 3. Formats and prints the result
//!
//! Handlers never touch the working tree directly.

mod profiles;
mod settings;
mod setup;
mod sync;
mod versions;

pub use profiles::{create_profile, delete_profile, profiles};
pub use setup::{init, show_config};
pub use settings::{attributes, files, get, set};
pub use sync::{import, pull, push, watch};
pub use versions::{create_version, default_version, delete_version, version_attributes, versions};

use anyhow::{Context as _, Result};

use super::args::Command;
use super::Context;
use crate::core::config::Config;
use crate::store::{CachingDataStore, DataStore, GitDataStore, StoreOptions};

/// The store type every handler works with.
pub type Store = CachingDataStore<GitDataStore>;

/// Load configuration and open the store for `ctx`.
pub fn open_store(ctx: &Context) -> Result<(Store, Config)> {
    let config = Config::load(Some(&ctx.repo)).context("failed to load configuration")?;

    let mut options = StoreOptions::from_config(&ctx.repo, &config);
    if let Some(url) = &ctx.remote_url {
        options = options.remote_url(url.as_str());
    }

    let store = GitDataStore::open(options)
        .with_context(|| format!("failed to open store at {}", ctx.repo.display()))?;
    Ok((CachingDataStore::new(store), config))
}

/// The version a command targets: the explicit one, else the default.
pub(crate) fn target_version(store: &Store, at: Option<String>) -> Result<String> {
    match at {
        Some(version) => Ok(version),
        None => Ok(store.default_version()?),
    }
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init {
            integration_branch,
            default_version,
        } => setup::init(ctx, integration_branch, default_version),
        Command::Config => setup::show_config(ctx),

        Command::Versions => versions::versions(ctx),
        Command::CreateVersion { name, parent } => {
            versions::create_version(ctx, &name, parent.as_deref())
        }
        Command::DeleteVersion { name } => versions::delete_version(ctx, &name),
        Command::DefaultVersion { set } => versions::default_version(ctx, set.as_deref()),
        Command::VersionAttributes { name, set, unset } => {
            versions::version_attributes(ctx, &name, &set, &unset)
        }

        Command::Profiles { at } => profiles::profiles(ctx, at),
        Command::CreateProfile { profile, at } => profiles::create_profile(ctx, &profile, at),
        Command::DeleteProfile { profile, at } => profiles::delete_profile(ctx, &profile, at),

        Command::Get { profile, pid, at } => settings::get(ctx, &profile, pid.as_deref(), at),
        Command::Set {
            profile,
            pid,
            pairs,
            unset,
            replace,
            at,
        } => settings::set(ctx, &profile, &pid, &pairs, &unset, replace, at),
        Command::Files { profile, at } => settings::files(ctx, &profile, at),
        Command::Attributes {
            profile,
            set,
            unset,
            at,
        } => settings::attributes(ctx, &profile, &set, &unset, at),

        Command::Pull => sync::pull(ctx),
        Command::Push => sync::push(ctx),
        Command::Import { path } => sync::import(ctx, &path),
        Command::Watch { interval } => sync::watch(ctx, interval),
    }
}
