//! engine::context
//!
//! What a unit of work sees while the coordinator holds the lock.
//!
//! - [`TransactionContext`] accumulates the commit message and the
//!   "commit required" / "push required" flags.
//! - [`WorkTree`] is the capability granting access to the checked-out
//!   working tree. It borrows the locked repository, so it cannot outlive
//!   the transaction that created it.

use std::collections::BTreeSet;

use crate::core::paths::StorePaths;
use crate::core::types::Oid;
use crate::git::{Git, GitError};

/// Mutable state a unit of work hands back to the coordinator.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    message: String,
    commit_required: bool,
    push_required: bool,
}

impl TransactionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a commit, appending `message` as a new line of the commit message.
    pub fn commit(&mut self, message: impl AsRef<str>) -> &mut Self {
        self.append_message(message);
        self.commit_required = true;
        self
    }

    /// Append a line to the commit message without requesting a commit.
    pub fn append_message(&mut self, message: impl AsRef<str>) -> &mut Self {
        let message = message.as_ref();
        if !message.is_empty() {
            if !self.message.is_empty() {
                self.message.push('\n');
            }
            self.message.push_str(message);
        }
        self
    }

    /// Request a push even if nothing gets committed (branch creation).
    pub fn require_push(&mut self) -> &mut Self {
        self.push_required = true;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn commit_required(&self) -> bool {
        self.commit_required
    }

    pub fn push_required(&self) -> bool {
        self.push_required
    }
}

/// Capability over the locked working tree.
pub struct WorkTree<'a> {
    git: &'a Git,
    remote: &'a str,
    integration_branch: &'a str,
    transient_suffix: &'a str,
}

impl<'a> WorkTree<'a> {
    pub(crate) fn new(
        git: &'a Git,
        remote: &'a str,
        integration_branch: &'a str,
        transient_suffix: &'a str,
    ) -> Self {
        Self {
            git,
            remote,
            integration_branch,
            transient_suffix,
        }
    }

    /// Path routing for the checked-out tree.
    pub fn paths(&self) -> &StorePaths {
        self.git.paths()
    }

    pub fn integration_branch(&self) -> &str {
        self.integration_branch
    }

    /// Whether `name` is excluded from the version namespace.
    pub fn is_reserved(&self, name: &str) -> bool {
        is_reserved_branch(name, self.integration_branch, self.transient_suffix)
    }

    /// Every version known locally or through remote-tracking refs.
    pub fn version_names(&self) -> Result<BTreeSet<String>, GitError> {
        let mut names: BTreeSet<String> = self.git.local_branches()?.into_keys().collect();
        names.extend(self.git.remote_branches(self.remote)?.into_keys());
        names.retain(|name| !self.is_reserved(name));
        Ok(names)
    }

    /// Whether a local branch exists.
    pub fn has_branch(&self, name: &str) -> bool {
        self.git.branch_exists(name)
    }

    /// Create local branch `name` at its remote-tracking tip. Returns false
    /// when the remote has no such branch.
    pub fn track_remote(&self, name: &str) -> Result<bool, GitError> {
        match self.git.remote_branches(self.remote)?.get(name) {
            Some(tip) => {
                self.git.create_branch(name, tip)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Check out a branch, discarding anything uncommitted.
    pub fn checkout(&self, name: &str) -> Result<(), GitError> {
        self.git.checkout_branch(name)
    }

    /// Create `name` at the tip of `from` and check it out.
    pub fn branch_from(&self, from: &str, name: &str) -> Result<Oid, GitError> {
        let tip = self.git.resolve_ref(&format!("refs/heads/{}", from))?;
        self.git.create_branch(name, &tip)?;
        self.git.checkout_branch(name)?;
        Ok(tip)
    }

    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        self.git.current_branch()
    }

    /// Stage one relative path (file or directory) as it is on disk.
    pub fn stage(&self, rel: &str) -> Result<(), GitError> {
        self.git.stage_path(rel)
    }
}

/// Whether a branch name is excluded from versions and from synchronization.
pub fn is_reserved_branch(name: &str, integration_branch: &str, transient_suffix: &str) -> bool {
    name == integration_branch
        || (!transient_suffix.is_empty() && name.ends_with(transient_suffix))
}
