//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--repo <path>`: Store working tree (default: current directory)
//! - `--remote-url <url>`: Override the configured remote URL
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fleetconf - versioned, replicated profile configuration
#[derive(Parser, Debug)]
#[command(name = "fleetconf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Store working tree
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Remote URL, overriding the repo config
    #[arg(long, global = true)]
    pub remote_url: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// A `KEY=VALUE` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(KeyValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the repo config and open the store
    Init {
        /// Reserved branch never exposed as a version
        #[arg(long)]
        integration_branch: Option<String>,

        /// Version used when the registry records none
        #[arg(long)]
        default_version: Option<String>,
    },

    /// Show the effective configuration
    Config,

    /// List versions
    Versions,

    /// Create a version
    #[command(name = "create-version")]
    CreateVersion {
        /// Version name
        name: String,

        /// Copy this version instead of starting empty
        #[arg(long)]
        parent: Option<String>,
    },

    /// Delete a version (not supported by the git store)
    #[command(name = "delete-version")]
    DeleteVersion {
        /// Version name
        name: String,
    },

    /// Show or set the default version
    #[command(name = "default-version")]
    DefaultVersion {
        /// Make this version the default
        #[arg(long)]
        set: Option<String>,
    },

    /// Show or change version attributes
    #[command(name = "version-attributes")]
    VersionAttributes {
        /// Version name
        name: String,

        /// Set an attribute
        #[arg(long, value_name = "KEY=VALUE")]
        set: Vec<KeyValue>,

        /// Remove an attribute
        #[arg(long, value_name = "KEY")]
        unset: Vec<String>,
    },

    /// List profiles of a version
    Profiles {
        /// Version (default: the default version)
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
    },

    /// Create a profile
    #[command(name = "create-profile")]
    CreateProfile {
        /// Profile name
        profile: String,

        /// Version (default: the default version)
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
    },

    /// Delete a profile and all its files
    #[command(name = "delete-profile")]
    DeleteProfile {
        /// Profile name
        profile: String,

        /// Version (default: the default version)
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
    },

    /// Show a pid's settings, or list the profile's pids
    Get {
        /// Profile name
        profile: String,

        /// Pid to show
        pid: Option<String>,

        /// Version (default: the default version)
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
    },

    /// Change a pid's settings
    #[command(
        long_about = "Change a pid's settings.\n\n\
            Given pairs are merged into the existing settings unless --replace is set. \
            Setting no keys with --replace deletes the pid."
    )]
    Set {
        /// Profile name
        profile: String,

        /// Pid to change
        pid: String,

        /// Settings to write
        #[arg(value_name = "KEY=VALUE")]
        pairs: Vec<KeyValue>,

        /// Keys to remove
        #[arg(long, value_name = "KEY")]
        unset: Vec<String>,

        /// Replace the settings instead of merging
        #[arg(long)]
        replace: bool,

        /// Version (default: the default version)
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
    },

    /// List a profile's files
    Files {
        /// Profile name
        profile: String,

        /// Version (default: the default version)
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
    },

    /// Show or change profile attributes
    Attributes {
        /// Profile name
        profile: String,

        /// Set an attribute
        #[arg(long, value_name = "KEY=VALUE")]
        set: Vec<KeyValue>,

        /// Remove an attribute
        #[arg(long, value_name = "KEY")]
        unset: Vec<String>,

        /// Version (default: the default version)
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
    },

    /// Pull from the remote
    Pull,

    /// Push every version to the remote
    Push,

    /// Import profiles from a directory tree
    Import {
        /// Directory to import
        path: PathBuf,
    },

    /// Pull periodically until interrupted
    Watch {
        /// Seconds between pulls (default: from config)
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn key_value_parsing() {
        let kv: KeyValue = "a=b=c".parse().unwrap();
        assert_eq!(kv.key, "a");
        assert_eq!(kv.value, "b=c");
        assert!("novalue".parse::<KeyValue>().is_err());
        assert!("=x".parse::<KeyValue>().is_err());
        let empty: KeyValue = "k=".parse().unwrap();
        assert_eq!(empty.value, "");
    }

    #[test]
    fn parses_set_command() {
        let cli = Cli::try_parse_from([
            "fleetconf", "--repo", "/tmp/r", "set", "web", "my.pid", "x=1", "--unset", "y", "--at",
            "1.1",
        ])
        .unwrap();
        assert_eq!(cli.repo, PathBuf::from("/tmp/r"));
        match cli.command {
            Command::Set {
                profile,
                pid,
                pairs,
                unset,
                replace,
                at,
            } => {
                assert_eq!(profile, "web");
                assert_eq!(pid, "my.pid");
                assert_eq!(pairs.len(), 1);
                assert_eq!(unset, vec!["y"]);
                assert!(!replace);
                assert_eq!(at.as_deref(), Some("1.1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn remote_url_is_global() {
        let cli = Cli::try_parse_from([
            "fleetconf", "init", "--remote-url", "/srv/fleet.git", "--default-version", "2.0",
        ])
        .unwrap();
        assert_eq!(cli.remote_url.as_deref(), Some("/srv/fleet.git"));
        assert!(matches!(
            cli.command,
            Command::Init { default_version: Some(ref v), integration_branch: None } if v == "2.0"
        ));
    }
}
