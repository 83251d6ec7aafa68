//! git::interface
//!
//! Working-tree access for the store.
//!
//! [`Git`] wraps one non-bare repository and exposes the primitives the
//! transaction coordinator and the sync engine are built from: branch
//! listing and creation, checkout, stash, staging, commit and clean. It is
//! the only place in the crate that calls libgit2 for local operations;
//! fetch and push live next door in `git::remote`.
//!
//! ```ignore
//! use fleetconf::git::{Git, Identity};
//! use std::path::Path;
//!
//! let identity = Identity::new("node-a", "node-a@fleet.local");
//! let git = Git::open_or_init(Path::new("/var/lib/fleetconf/repo"), "master", &identity)?;
//! git.checkout_branch("1.0")?;
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::core::paths::StorePaths;
use crate::core::types::{Fingerprint, Oid, RefName, TypeError};

/// Stray-change stashes kept in `refs/stash`.
pub const STASH_LIMIT: usize = 16;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("{path} is not a git repository")]
    NotARepo { path: PathBuf },

    #[error("bare repositories cannot hold a working tree")]
    BareRepo,

    #[error("no such ref: {refname}")]
    RefNotFound { refname: String },

    #[error("no such object: {oid}")]
    ObjectNotFound { oid: String },

    #[error("malformed object id: {oid}")]
    InvalidOid { oid: String },

    #[error("malformed ref name: {message}")]
    InvalidRefName { message: String },

    /// The repository directory could not be created or was locked.
    #[error("cannot access repository: {message}")]
    AccessError { message: String },

    /// Fetch or push against `remote` failed.
    #[error("remote '{remote}' failed: {message}")]
    Remote { remote: String, message: String },

    #[error("git: {message}")]
    Internal { message: String },
}

impl GitError {
    /// Classify a libgit2 failure, naming `subject` (a ref, an oid or an
    /// operation) in the resulting error.
    pub(crate) fn from_git2(err: git2::Error, subject: &str) -> Self {
        let subject = subject.to_string();
        match err.code() {
            git2::ErrorCode::NotFound if subject.starts_with("refs/") || subject.contains("ref") => {
                Self::RefNotFound { refname: subject }
            }
            git2::ErrorCode::NotFound => Self::ObjectNotFound { oid: subject },
            git2::ErrorCode::InvalidSpec => Self::InvalidOid { oid: subject },
            git2::ErrorCode::Locked => Self::AccessError {
                message: format!("{subject} is locked: {}", err.message()),
            },
            _ => Self::Internal {
                message: format!("{subject}: {}", err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        let message = err.message().to_string();
        match err.code() {
            git2::ErrorCode::NotFound => Self::RefNotFound { refname: message },
            git2::ErrorCode::InvalidSpec => Self::InvalidOid { oid: message },
            _ => Self::Internal { message },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(oid) => Self::InvalidOid { oid },
            TypeError::InvalidRefName(message) | TypeError::InvalidVersionName(message) => {
                Self::InvalidRefName { message }
            }
        }
    }
}

/// Author and committer identity for commits made by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    fn signature(&self) -> Result<git2::Signature<'static>, GitError> {
        git2::Signature::now(&self.name, &self.email)
            .map_err(|e| GitError::from_git2(e, "signature"))
    }
}

/// A ref with its name and target OID.
#[derive(Debug, Clone)]
pub struct RefEntry {
    /// The full ref name
    pub name: RefName,
    /// The commit the ref points to
    pub oid: Oid,
}

fn to_git2_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

fn from_git2_oid(oid: git2::Oid) -> Result<Oid, GitError> {
    Oid::new(oid.to_string()).map_err(GitError::from)
}

/// A store's repository and working tree.
///
/// Methods that touch the working tree or move refs assume the caller holds
/// the store's transaction lock.
pub struct Git {
    pub(crate) repo: git2::Repository,
    paths: StorePaths,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("work_dir", &self.paths.work_dir)
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Initialization
    // =========================================================================

    /// Open the repository whose working tree is `path`.
    ///
    /// Unlike discovery, the path must be the working tree root itself, so a
    /// store never accidentally binds to an enclosing repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        Self::from_repo(repo)
    }

    fn from_repo(repo: git2::Repository) -> Result<Self, GitError> {
        let work_dir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();
        let git_dir = repo.path().to_path_buf();
        Ok(Self {
            repo,
            paths: StorePaths::new(work_dir, git_dir),
        })
    }

    /// Create a repository at `path` whose history starts with one empty
    /// commit on `integration_branch`.
    pub fn init(path: &Path, integration_branch: &str, identity: &Identity) -> Result<Self, GitError> {
        fs::create_dir_all(path).map_err(|e| GitError::AccessError {
            message: format!("cannot create {}: {}", path.display(), e),
        })?;

        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head(integration_branch);
        let repo = git2::Repository::init_opts(path, &opts)
            .map_err(|e| GitError::from_git2(e, "init"))?;

        let git = Self::from_repo(repo)?;
        git.initial_commit(identity)?;
        Ok(git)
    }

    /// Open the repository at `path`, initializing it if absent.
    pub fn open_or_init(
        path: &Path,
        integration_branch: &str,
        identity: &Identity,
    ) -> Result<Self, GitError> {
        if path.join(".git").exists() {
            let git = Self::open(path)?;
            if !git.has_history() {
                git.initial_commit(identity)?;
            }
            Ok(git)
        } else {
            Self::init(path, integration_branch, identity)
        }
    }

    fn initial_commit(&self, identity: &Identity) -> Result<(), GitError> {
        let sig = identity.signature()?;
        let tree_id = self.repo.treebuilder(None)?.write()?;
        let tree = self.repo.find_tree(tree_id)?;
        self.repo
            .commit(Some("HEAD"), &sig, &sig, "initial commit", &tree, &[])
            .map_err(|e| GitError::from_git2(e, "initial commit"))?;
        Ok(())
    }

    /// Path routing for this repository's working tree.
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Check whether HEAD points at a commit.
    pub fn has_history(&self) -> bool {
        self.repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .is_ok()
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// The commit `refname` points at. Fails with
    /// [`GitError::RefNotFound`] for a missing ref.
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let commit = self
            .repo
            .find_reference(refname)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, refname))?;
        from_git2_oid(commit.id())
    }

    /// The commit HEAD points at; an unborn HEAD is `RefNotFound`.
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let commit = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        from_git2_oid(commit.id())
    }

    /// The checked-out branch, or `None` when HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(String::from)),
            Ok(_) => Ok(None),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo
            .find_reference(&format!("refs/heads/{name}"))
            .is_ok()
    }

    // =========================================================================
    // Ref Enumeration
    // =========================================================================

    /// Direct refs under `prefix` that point at commits.
    ///
    /// Symbolic refs (`refs/remotes/origin/HEAD`), non-UTF-8 names and refs
    /// to non-commits are skipped.
    pub fn list_refs_by_prefix(&self, prefix: &str) -> Result<Vec<RefEntry>, GitError> {
        let mut entries = Vec::new();
        for reference in self.repo.references_glob(&format!("{prefix}*"))? {
            let reference = reference?;
            if reference.kind() == Some(git2::ReferenceType::Symbolic) {
                continue;
            }
            let Some(name) = reference.name().and_then(|n| RefName::new(n).ok()) else {
                continue;
            };
            let Ok(commit) = reference.peel_to_commit() else {
                continue;
            };
            entries.push(RefEntry {
                name,
                oid: from_git2_oid(commit.id())?,
            });
        }
        Ok(entries)
    }

    /// Local branches, keyed by short name.
    pub fn local_branches(&self) -> Result<BTreeMap<String, Oid>, GitError> {
        self.branches_under("refs/heads/")
    }

    /// Remote-tracking branches of `remote`, keyed by short name.
    pub fn remote_branches(&self, remote: &str) -> Result<BTreeMap<String, Oid>, GitError> {
        self.branches_under(&format!("refs/remotes/{}/", remote))
    }

    fn branches_under(&self, prefix: &str) -> Result<BTreeMap<String, Oid>, GitError> {
        Ok(self
            .list_refs_by_prefix(prefix)?
            .into_iter()
            .filter_map(|entry| {
                let short = entry.name.strip_prefix(prefix)?;
                (short != "HEAD").then(|| (short.to_string(), entry.oid.clone()))
            })
            .collect())
    }

    /// Snapshot of all local branch tips.
    ///
    /// Equal fingerprints mean no local branch moved, was created or was
    /// deleted. Checkouts alone never change it.
    pub fn fingerprint(&self) -> Result<Fingerprint, GitError> {
        let refs: Vec<(RefName, Oid)> = self
            .list_refs_by_prefix("refs/heads/")?
            .into_iter()
            .map(|entry| (entry.name, entry.oid))
            .collect();
        Ok(Fingerprint::compute(&refs))
    }

    // =========================================================================
    // Branch Operations
    // =========================================================================

    /// Create a local branch at `target`.
    pub fn create_branch(&self, name: &str, target: &Oid) -> Result<(), GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(target)?)
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;
        self.repo
            .branch(name, &commit, false)
            .map_err(|e| GitError::from_git2(e, &format!("refs/heads/{}", name)))?;
        Ok(())
    }

    /// Point a local branch at `target`, creating it if needed.
    ///
    /// When the branch is checked out, the working tree and index are reset
    /// to the new tip as well.
    pub fn reset_branch(&self, name: &str, target: &Oid, message: &str) -> Result<(), GitError> {
        let refname = format!("refs/heads/{}", name);

        if self.current_branch()?.as_deref() == Some(name) {
            // A hard reset moves the checked-out branch along with HEAD.
            let object = self
                .repo
                .find_object(to_git2_oid(target)?, Some(git2::ObjectType::Commit))
                .map_err(|e| GitError::from_git2(e, target.as_str()))?;
            let mut builder = git2::build::CheckoutBuilder::new();
            builder.force().remove_untracked(true);
            return self
                .repo
                .reset(&object, git2::ResetType::Hard, Some(&mut builder))
                .map_err(|e| GitError::from_git2(e, &refname));
        }

        self.repo
            .reference(&refname, to_git2_oid(target)?, true, message)
            .map_err(|e| GitError::from_git2(e, &refname))?;
        Ok(())
    }

    /// Delete a local branch. The branch must not be checked out.
    pub fn delete_branch(&self, name: &str) -> Result<(), GitError> {
        let refname = format!("refs/heads/{}", name);
        let mut branch = self
            .repo
            .find_branch(name, git2::BranchType::Local)
            .map_err(|e| GitError::from_git2(e, &refname))?;
        branch
            .delete()
            .map_err(|e| GitError::from_git2(e, &refname))
    }

    /// Check out a local branch, forcing the working tree to match it.
    ///
    /// Untracked files are removed; callers stash first if they care.
    pub fn checkout_branch(&self, name: &str) -> Result<(), GitError> {
        let refname = format!("refs/heads/{}", name);
        let object = self
            .repo
            .revparse_single(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))?;

        let mut builder = git2::build::CheckoutBuilder::new();
        builder.force().remove_untracked(true);
        self.repo
            .checkout_tree(&object, Some(&mut builder))
            .map_err(|e| GitError::from_git2(e, &refname))?;
        self.repo
            .set_head(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))
    }

    // =========================================================================
    // Working Tree
    // =========================================================================

    /// Stash uncommitted changes, including untracked files.
    ///
    /// Returns the stash commit, or `None` if there was nothing to stash.
    /// Only the newest [`STASH_LIMIT`] stashes are kept.
    pub fn stash(&mut self, identity: &Identity, message: &str) -> Result<Option<Oid>, GitError> {
        let sig = identity.signature()?;
        match self.repo.stash_save(
            &sig,
            message,
            Some(git2::StashFlags::INCLUDE_UNTRACKED),
        ) {
            Ok(oid) => {
                self.prune_stashes()?;
                Ok(Some(from_git2_oid(oid)?))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, "stash")),
        }
    }

    /// Drop the oldest stashes beyond [`STASH_LIMIT`].
    fn prune_stashes(&mut self) -> Result<(), GitError> {
        let mut count = 0;
        self.repo.stash_foreach(|_, _, _| {
            count += 1;
            true
        })?;
        // Index 0 is the newest entry.
        for index in (STASH_LIMIT..count).rev() {
            self.repo
                .stash_drop(index)
                .map_err(|e| GitError::from_git2(e, "stash drop"))?;
        }
        Ok(())
    }

    /// Discard every uncommitted change: index, tracked and untracked files.
    pub fn clean(&self) -> Result<(), GitError> {
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel(git2::ObjectType::Commit))
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let mut builder = git2::build::CheckoutBuilder::new();
        builder.force().remove_untracked(true);
        self.repo
            .reset(&head, git2::ResetType::Hard, Some(&mut builder))
            .map_err(|e| GitError::from_git2(e, "reset"))
    }

    /// Stage one working-tree path (file or directory) as it is on disk.
    ///
    /// `rel` is a literal path, never a pathspec: `*`, `?` and `[` in file
    /// or profile names match only themselves. Index entries at or below
    /// `rel` that no longer exist on disk are removed.
    pub fn stage_path(&self, rel: &str) -> Result<(), GitError> {
        let rel = rel.trim_end_matches('/');
        let below = format!("{rel}/");
        let mut index = self.repo.index()?;

        let tracked: Vec<PathBuf> = index
            .iter()
            .filter_map(|entry| String::from_utf8(entry.path).ok())
            .filter(|path| path == rel || path.starts_with(&below))
            .map(PathBuf::from)
            .collect();
        for path in &tracked {
            index.remove_path(path)?;
        }

        let root = self.paths.work_dir.join(rel);
        if root.symlink_metadata().is_ok() {
            let access = |message: String| GitError::AccessError { message };
            for entry in WalkDir::new(&root).follow_links(false) {
                let entry = entry.map_err(|e| access(format!("cannot read {}: {e}", root.display())))?;
                if entry.file_type().is_dir() {
                    continue;
                }
                let path = entry
                    .path()
                    .strip_prefix(&self.paths.work_dir)
                    .map_err(|_| access(format!("{} is outside the working tree", entry.path().display())))?;
                index.add_path(path)?;
            }
        }

        index.write()?;
        Ok(())
    }

    /// Commit the index on top of HEAD.
    ///
    /// Returns `None` without committing when the index tree equals HEAD's.
    pub fn commit(&self, message: &str, identity: &Identity) -> Result<Option<Oid>, GitError> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                None
            }
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };

        if let Some(parent) = &parent {
            if parent.tree_id() == tree_id {
                return Ok(None);
            }
        }

        let tree = self.repo.find_tree(tree_id)?;
        let sig = identity.signature()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .map_err(|e| GitError::from_git2(e, "commit"))?;

        Ok(Some(from_git2_oid(oid)?))
    }

    /// Write a commit carrying `tree_source`'s tree on top of `parents`.
    ///
    /// No ref is updated.
    pub fn commit_with_tree_of(
        &self,
        tree_source: &Oid,
        parents: &[Oid],
        message: &str,
        identity: &Identity,
    ) -> Result<Oid, GitError> {
        let source = self
            .repo
            .find_commit(to_git2_oid(tree_source)?)
            .map_err(|e| GitError::from_git2(e, tree_source.as_str()))?;
        let tree = source.tree()?;

        let mut parent_commits = Vec::with_capacity(parents.len());
        for parent in parents {
            parent_commits.push(
                self.repo
                    .find_commit(to_git2_oid(parent)?)
                    .map_err(|e| GitError::from_git2(e, parent.as_str()))?,
            );
        }
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let sig = identity.signature()?;
        let oid = self
            .repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)
            .map_err(|e| GitError::from_git2(e, "commit"))?;
        from_git2_oid(oid)
    }

    // =========================================================================
    // Ancestry and Commit Information
    // =========================================================================

    /// Whether `descendant` contains `ancestor` in its history. A commit
    /// counts as its own ancestor.
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        let found = self
            .repo
            .graph_descendant_of(to_git2_oid(descendant)?, to_git2_oid(ancestor)?)?;
        Ok(found)
    }

    pub fn commit_parents(&self, oid: &Oid) -> Result<Vec<Oid>, GitError> {
        self.repo
            .find_commit(to_git2_oid(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?
            .parent_ids()
            .map(from_git2_oid)
            .collect()
    }

    // =========================================================================
    // Remote Configuration
    // =========================================================================

    /// The configured URL of `name`; `None` for a missing or empty remote.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().filter(|u| !u.is_empty()).map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the remote, or repoint it if it already exists.
    pub fn set_remote_url(&self, name: &str, url: &str) -> Result<(), GitError> {
        match self.repo.find_remote(name) {
            Ok(_) => self.repo.remote_set_url(name, url)?,
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                self.repo.remote(name, url)?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
