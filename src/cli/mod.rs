//! cli
//!
//! Command-line interface layer for fleetconf.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the tracing subscriber
//! - Open the store and delegate to command handlers
//!
//! The CLI layer is thin. Every read and write goes through the
//! [`crate::store::DataStore`] API.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "FLEETCONF_LOG";

/// Execution context shared by command handlers.
#[derive(Debug, Clone)]
pub struct Context {
    /// Store working tree.
    pub repo: PathBuf,
    /// Remote URL override.
    pub remote_url: Option<String>,
    pub debug: bool,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Fails when a global subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let ctx = Context {
        repo: cli.repo.clone(),
        remote_url: cli.remote_url.clone(),
        debug: cli.debug,
    };

    commands::dispatch(cli.command, &ctx)
}
