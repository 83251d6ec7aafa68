//! cli::commands::setup
//!
//! Store initialization and configuration display.

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::config::{Config, RepoConfig};
use crate::store::{DataStore, GitDataStore, StoreOptions};

/// Record repo settings and open (creating if needed) the store.
///
/// Settings not given on the command line keep their current values.
pub fn init(
    ctx: &Context,
    integration_branch: Option<String>,
    default_version: Option<String>,
) -> Result<()> {
    let current = Config::load(Some(&ctx.repo)).context("failed to load configuration")?;
    let mut repo = current.repo.unwrap_or_default();
    if let Some(url) = &ctx.remote_url {
        repo.remote_url = Some(url.clone());
    }
    if integration_branch.is_some() {
        repo.integration_branch = integration_branch;
    }
    if default_version.is_some() {
        repo.default_version = default_version;
    }

    // The repository has to exist before its private config directory does.
    let config = Config::from_parts(current.global, Some(repo.clone()))?;
    let store = GitDataStore::open(StoreOptions::from_config(&ctx.repo, &config))
        .with_context(|| format!("failed to open store at {}", ctx.repo.display()))?;

    if repo != RepoConfig::default() {
        let path = Config::write_repo(&ctx.repo, &repo)?;
        println!("Wrote {}", path.display());
    }

    let versions = store.versions()?;
    println!(
        "Initialized store at {} ({} version(s), remote {})",
        ctx.repo.display(),
        versions.len(),
        config.remote_url().unwrap_or("unset")
    );
    Ok(())
}

/// Print effective settings and where they came from.
pub fn show_config(ctx: &Context) -> Result<()> {
    let config = Config::load(Some(&ctx.repo)).context("failed to load configuration")?;

    let source = |path: Option<&std::path::Path>| {
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    };
    println!("# global: {}", source(config.global_config_loaded_from()));
    println!("# repo:   {}", source(config.repo_config_loaded_from()));

    println!("remote = {}", config.remote());
    println!("remote_url = {}", config.remote_url().unwrap_or(""));
    println!("integration_branch = {}", config.integration_branch());
    println!("transient_suffix = {}", config.transient_suffix());
    println!("default_version = {}", config.default_version());
    println!("pull_interval_secs = {}", config.pull_interval().as_secs());
    println!("author = {} <{}>", config.author_name(), config.author_email());
    Ok(())
}
