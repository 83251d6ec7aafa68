//! engine::merge
//!
//! Conflict resolution for versions whose local and remote tips differ.
//!
//! Reconciliation asks a [`ConflictResolution`] strategy for the new local
//! tip and never inspects file contents itself, so a three-way merge or a
//! conflict-reporting strategy can be swapped in without touching the sync
//! loop.
//!
//! # Remote wins
//!
//! [`RemoteWins`] is the default. It always converges on the remote's
//! content:
//!
//! | Relationship                  | Result                                   |
//! |-------------------------------|------------------------------------------|
//! | local is an ancestor of remote | fast-forward to remote                  |
//! | remote is an ancestor of local | keep local (it will be pushed)          |
//! | diverged                       | merge commit `[local, remote]` carrying the remote tree |
//!
//! Local changes on a diverged version are discarded. The merge commit keeps
//! both parents so the next push is a fast-forward for the remote.

use crate::core::types::Oid;
use crate::git::{Git, GitError, Identity};

/// New local tip chosen by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Local already contains the remote; nothing to do.
    KeepLocal,
    /// Move local to the remote tip.
    FastForward(Oid),
    /// Move local to a freshly written merge commit.
    Merged(Oid),
}

impl Resolution {
    /// The tip the local branch must move to, if any.
    pub fn new_tip(&self) -> Option<&Oid> {
        match self {
            Resolution::KeepLocal => None,
            Resolution::FastForward(oid) | Resolution::Merged(oid) => Some(oid),
        }
    }
}

/// Strategy resolving a version whose local and remote tips differ.
pub trait ConflictResolution: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Decide the new local tip for `version`.
    fn resolve(
        &self,
        git: &Git,
        version: &str,
        local: &Oid,
        remote: &Oid,
        identity: &Identity,
    ) -> Result<Resolution, GitError>;
}

/// Always converge on the remote's content.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteWins;

impl ConflictResolution for RemoteWins {
    fn name(&self) -> &'static str {
        "remote-wins"
    }

    fn resolve(
        &self,
        git: &Git,
        version: &str,
        local: &Oid,
        remote: &Oid,
        identity: &Identity,
    ) -> Result<Resolution, GitError> {
        if git.is_ancestor(local, remote)? {
            return Ok(Resolution::FastForward(remote.clone()));
        }
        if git.is_ancestor(remote, local)? {
            return Ok(Resolution::KeepLocal);
        }

        let message = format!("Merge remote version '{}' (remote wins)", version);
        let merged =
            git.commit_with_tree_of(remote, &[local.clone(), remote.clone()], &message, identity)?;
        Ok(Resolution::Merged(merged))
    }
}
