//! cli::commands::sync
//!
//! Pull, push, import and the background watch loop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use tracing::{info, warn};

use super::open_store;
use crate::cli::Context;
use crate::engine::{PullScheduler, RemoteChangeSignal, SyncStatus};
use crate::store::DataStore;

pub fn pull(ctx: &Context) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let outcome = store.pull()?;

    match outcome.status {
        SyncStatus::Skipped => println!("No remote configured; nothing to pull"),
        SyncStatus::Completed => {
            for version in &outcome.created {
                println!("+ {}", version);
            }
            for version in &outcome.deleted {
                println!("- {}", version);
            }
            for version in &outcome.updated {
                println!("~ {}", version);
            }
            if !outcome.changed {
                println!("Already up to date");
            }
        }
        SyncStatus::Failed => {}
    }

    if let Some(reason) = outcome.fetch_error.as_ref().or(outcome.reason.as_ref()) {
        bail!("pull failed: {}", reason);
    }
    Ok(())
}

pub fn push(ctx: &Context) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let outcome = store.push()?;

    if outcome.status == SyncStatus::Skipped {
        println!("No remote configured; nothing to push");
        return Ok(());
    }
    if let Some(reason) = &outcome.reason {
        bail!("push failed: {}", reason);
    }

    for result in &outcome.results {
        match &result.rejected {
            None => println!("  {}", result.refname),
            Some(reason) => println!("! {} ({})", result.refname, reason),
        }
    }
    if !outcome.is_ok() {
        bail!("remote rejected {} ref(s)", outcome.rejected().count());
    }
    Ok(())
}

pub fn import(ctx: &Context, path: &Path) -> Result<()> {
    let (store, _) = open_store(ctx)?;
    let summary = store
        .import_from_filesystem(path)
        .with_context(|| format!("failed to import {}", path.display()))?;

    println!(
        "Imported {} file(s) in {} profile(s) into {}",
        summary.files,
        summary.profiles,
        summary.versions.join(", ")
    );
    Ok(())
}

/// Pull every `interval` seconds until Ctrl-C.
pub fn watch(ctx: &Context, interval: Option<u64>) -> Result<()> {
    let (store, config) = open_store(ctx)?;
    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.pull_interval());
    if interval.is_zero() {
        bail!("interval must be at least one second");
    }

    let store = Arc::new(store);
    store.subscribe(Box::new(|| info!("configuration changed")));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    runtime.block_on(async move {
        let signal = RemoteChangeSignal::new();
        let puller = Arc::clone(&store);
        let handle = PullScheduler::spawn(interval, signal.clone(), move || {
            if let Err(e) = puller.pull() {
                warn!(error = %e, "background pull failed");
            }
        });

        signal.raise();
        info!(interval_secs = interval.as_secs(), "watching for remote changes");

        let stopped = tokio::signal::ctrl_c().await;
        handle.shutdown().await;
        stopped.context("failed to listen for Ctrl-C")
    })
}
