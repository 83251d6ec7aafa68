//! store::import
//!
//! Import profiles from a directory tree.
//!
//! Two layouts are recognised:
//!
//! ```text
//! legacy                                  flat
//! <root>/configs/versions/<v>/profiles/   <root>/<profile>/<files...>
//!   <profile>/<files...>
//! ```
//!
//! The legacy layout imports every version it names, one transaction per
//! version, creating versions that do not exist yet. The flat layout imports
//! into the default version in a single transaction. Hidden files and
//! directories are skipped. Imported profiles get a marker file if they
//! lack one.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use super::error::StoreError;
use super::git_store::{check_new_version, checkout_version, ensure_marker, GitDataStore};
use super::layout::{self, is_hidden, rel_name, walk_error};
use super::traits::ImportSummary;
use crate::core::naming::{validate_file_name, validate_profile};
use crate::engine::{TransactionContext, WorkTree};

const LEGACY_VERSIONS_DIR: &str = "configs/versions";
const LEGACY_PROFILES_DIR: &str = "profiles";

/// Non-hidden subdirectories of `dir`, sorted by name.
fn subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let mut dirs = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let path = entry.path();
        if !path.is_dir() || is_hidden(&entry.file_name()) {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => dirs.push((name, path)),
            Err(name) => warn!(name = ?name, "skipping non UTF-8 directory"),
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Profiles of one import unit: name and source directory.
#[derive(Debug)]
struct Unit {
    version: String,
    profiles: Vec<(String, PathBuf)>,
}

fn plan(root: &Path, default_version: &str) -> Result<Vec<Unit>, StoreError> {
    if !root.is_dir() {
        return Err(StoreError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "import source is not a directory"),
        ));
    }

    let legacy = root.join(LEGACY_VERSIONS_DIR);
    if legacy.is_dir() {
        let mut units = Vec::new();
        for (version, dir) in subdirs(&legacy)? {
            let profiles_dir = dir.join(LEGACY_PROFILES_DIR);
            let profiles = if profiles_dir.is_dir() {
                subdirs(&profiles_dir)?
            } else {
                Vec::new()
            };
            units.push(Unit { version, profiles });
        }
        return Ok(units);
    }

    Ok(vec![Unit {
        version: default_version.to_string(),
        profiles: subdirs(root)?,
    }])
}

/// Copy one profile's files into the working tree. Returns the number of files.
fn copy_profile(tree: &WorkTree<'_>, profile: &str, source: &Path) -> Result<usize, StoreError> {
    let paths = tree.paths();
    let mut copied = 0;

    let walker = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.file_name()));

    for entry in walker {
        let entry = entry.map_err(walk_error)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = rel_name(source, entry.path()) else {
            warn!(path = %entry.path().display(), "skipping non UTF-8 path");
            continue;
        };
        validate_file_name(&name)?;

        let bytes = fs::read(entry.path()).map_err(|e| StoreError::io(entry.path(), e))?;
        layout::write_file(paths, profile, &name, &bytes)?;
        copied += 1;
    }

    ensure_marker(tree, profile)?;
    tree.stage(&paths.profile_rel(profile))?;
    Ok(copied)
}

fn import_unit(
    tree: &WorkTree<'_>,
    ctx: &mut TransactionContext,
    unit: &Unit,
    summary: &mut ImportSummary,
) -> Result<(), StoreError> {
    if tree.has_branch(&unit.version) {
        checkout_version(tree, &unit.version)?;
    } else {
        check_new_version(tree, &unit.version)?;
        tree.branch_from(tree.integration_branch(), &unit.version)?;
        ctx.require_push();
        summary.created_versions.push(unit.version.clone());
    }

    let mut files = 0;
    for (profile, source) in &unit.profiles {
        files += copy_profile(tree, profile, source)?;
    }

    ctx.commit(format!(
        "Import {} profile(s) into version {}",
        unit.profiles.len(),
        unit.version
    ));

    summary.versions.push(unit.version.clone());
    summary.profiles += unit.profiles.len();
    summary.files += files;
    Ok(())
}

/// Import `root` into `store`.
pub(crate) fn import_tree(
    store: &GitDataStore,
    root: &Path,
    default_version: &str,
) -> Result<ImportSummary, StoreError> {
    let units = plan(root, default_version)?;
    for unit in &units {
        for (profile, _) in &unit.profiles {
            validate_profile(profile)?;
        }
    }

    let mut summary = ImportSummary::default();
    for unit in &units {
        store.write(|tree, ctx| import_unit(tree, ctx, unit, &mut summary))?;
        info!(version = %unit.version, profiles = unit.profiles.len(), "imported version");
    }
    Ok(summary)
}
