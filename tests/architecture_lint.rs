//! Architecture enforcement tests.
//!
//! The crate is layered: `cli` talks to `store`, `store` runs work through
//! the `engine` coordinator, and only `git` touches libgit2. These tests
//! catch imports that cut across the layers.

use std::fs;
use std::path::{Path, PathBuf};

/// Every `.rs` file under `dir`, recursively.
fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).expect("Failed to read source directory") {
        let path = entry.expect("Failed to read entry").path();
        if path.is_dir() {
            files.extend(rust_files(&path));
        } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    files
}

/// Source text before the first `#[cfg(test)]`, so test helpers don't count.
fn production_source(path: &Path) -> String {
    let content =
        fs::read_to_string(path).unwrap_or_else(|_| panic!("Failed to read {}", path.display()));
    match content.find("#[cfg(test)]") {
        Some(idx) => content[..idx].to_string(),
        None => content,
    }
}

fn violations(dir: &str, forbidden: &[&str]) -> Vec<String> {
    let mut found = Vec::new();
    for path in rust_files(Path::new(dir)) {
        let source = production_source(&path);
        for pattern in forbidden {
            if source.contains(pattern) {
                found.push(format!("{}: uses `{}`", path.display(), pattern));
            }
        }
    }
    found
}

/// Only `src/git` may use libgit2 directly.
#[test]
fn git2_is_confined_to_git_module() {
    let mut found = Vec::new();
    for path in rust_files(Path::new("src")) {
        if path.starts_with("src/git") {
            continue;
        }
        if production_source(&path).contains("git2::") {
            found.push(path.display().to_string());
        }
    }

    assert!(
        found.is_empty(),
        "git2 used outside src/git:\n  {}",
        found.join("\n  ")
    );
}

/// CLI handlers go through the store API, never the Git interface.
#[test]
fn cli_does_not_touch_git() {
    let found = violations("src/cli", &["crate::git", "TransactionCoordinator", "WorkTree"]);
    assert!(
        found.is_empty(),
        "Architecture violations found:\n  {}",
        found.join("\n  ")
    );
}

/// Core stays free of git and of the layers above it.
#[test]
fn core_depends_on_nothing_above_it() {
    let found = violations(
        "src/core",
        &["crate::git", "crate::engine", "crate::store", "crate::cli"],
    );
    assert!(
        found.is_empty(),
        "Architecture violations found:\n  {}",
        found.join("\n  ")
    );
}

/// The engine never reaches up into the store or the CLI.
#[test]
fn engine_does_not_depend_on_store() {
    let found = violations("src/engine", &["crate::store", "crate::cli"]);
    assert!(
        found.is_empty(),
        "Architecture violations found:\n  {}",
        found.join("\n  ")
    );
}
