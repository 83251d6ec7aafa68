//! engine::coordinator
//!
//! The single transactional coordinator.
//!
//! Every read and write against the working tree runs as a unit of work
//! inside [`TransactionCoordinator::execute`]. The coordinator MUST:
//!
//! 1. Take the in-process mutex, then the cross-process [`RepoLock`]
//! 2. Stash uncommitted working-tree changes (they are never part of a
//!    transaction)
//! 3. Pull, when the caller asked for it
//! 4. Run the unit of work with a [`WorkTree`] and a [`TransactionContext`]
//! 5. Commit if the unit asked for a commit
//! 6. Push and fire the change notifier if the unit committed, asked for a
//!    push, or moved any branch
//! 7. Record the transaction in the [`TransactionLedger`] and release both locks
//!
//! If the unit fails, uncommitted changes are discarded and the error is
//! returned unchanged. Pull and push failures never fail a transaction; they
//! are logged by the sync engine.
//!
//! # Example
//!
//! ```ignore
//! let names = coordinator.execute(false, |tree, _ctx| {
//!     tree.version_names().map_err(StoreError::from)
//! })?;
//! ```

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use super::context::{TransactionContext, WorkTree};
use super::ledger::{Outcome, TransactionLedger};
use super::notify::ChangeNotifier;
use super::sync::{PullOutcome, PushOutcome, SyncEngine, SyncStatus};
use crate::core::ops::lock::{LockError, RepoLock};
use crate::core::paths::StorePaths;
use crate::git::{Git, GitError, Identity};

/// Commit message used when a unit asks for a commit without describing it.
const FALLBACK_MESSAGE: &str = "fleetconf: update configuration";

/// Failures of the coordinator itself, as opposed to the unit of work.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// Serializes all access to one working tree.
pub struct TransactionCoordinator {
    git: Mutex<Git>,
    paths: StorePaths,
    sync: SyncEngine,
    notifier: Arc<ChangeNotifier>,
    identity: Identity,
    ledger: TransactionLedger,
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("paths", &self.paths)
            .field("sync", &self.sync)
            .finish()
    }
}

impl TransactionCoordinator {
    pub fn new(git: Git, sync: SyncEngine, notifier: Arc<ChangeNotifier>, identity: Identity) -> Self {
        let paths = git.paths().clone();
        Self {
            git: Mutex::new(git),
            paths,
            sync,
            notifier,
            identity,
            ledger: TransactionLedger::default(),
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    /// Run `unit` as one transaction.
    ///
    /// `pull_first` pulls from the remote after stashing and before the unit
    /// runs. Writes should pull first so they apply on top of the latest
    /// remote state.
    pub fn execute<T, E, F>(&self, pull_first: bool, unit: F) -> Result<T, E>
    where
        E: From<TransactionError>,
        F: FnOnce(&WorkTree<'_>, &mut TransactionContext) -> Result<T, E>,
    {
        let mut git = self.git.lock();
        let _lock = RepoLock::acquire(&self.paths).map_err(TransactionError::from)?;
        let started = Instant::now();

        let result = self.run(&mut git, pull_first, unit);

        let outcome = match &result {
            Ok((_, outcome)) => *outcome,
            Err(_) => Outcome::Failed,
        };
        let seq = self.ledger.record(started, Instant::now(), outcome);
        debug!(seq, ?outcome, "transaction finished");

        result.map(|(value, _)| value)
    }

    fn run<T, E, F>(&self, git: &mut Git, pull_first: bool, unit: F) -> Result<(T, Outcome), E>
    where
        E: From<TransactionError>,
        F: FnOnce(&WorkTree<'_>, &mut TransactionContext) -> Result<T, E>,
    {
        if git.has_history() {
            let stashed = git
                .stash(&self.identity, "fleetconf: uncommitted changes")
                .map_err(TransactionError::from)?;
            if let Some(oid) = stashed {
                warn!(stash = %oid.short(7), "stashed uncommitted working-tree changes");
            }
        }

        if pull_first {
            self.sync.pull(git);
        }

        let git: &Git = git;
        let before = git.fingerprint().map_err(TransactionError::from)?;

        let settings = self.sync.settings();
        let tree = WorkTree::new(
            git,
            &settings.remote,
            &settings.integration_branch,
            &settings.transient_suffix,
        );
        let mut ctx = TransactionContext::new();

        let value = match unit(&tree, &mut ctx) {
            Ok(value) => value,
            Err(err) => {
                if let Err(clean_err) = git.clean() {
                    warn!(error = %clean_err, "failed to discard changes of a failed transaction");
                }
                return Err(err);
            }
        };

        let mut committed = false;
        if ctx.commit_required() {
            let message = if ctx.message().is_empty() {
                warn!("commit requested without a message");
                FALLBACK_MESSAGE
            } else {
                ctx.message()
            };
            committed = git
                .commit(message, &self.identity)
                .map_err(TransactionError::from)?
                .is_some();
        }

        let after = git.fingerprint().map_err(TransactionError::from)?;
        let moved = after != before;

        if !(committed || moved || ctx.push_required()) {
            return Ok((value, Outcome::ReadOnly));
        }

        let pushed = self.sync.push(git);
        self.notifier.notify();

        Ok((
            value,
            Outcome::Committed {
                pushed: pushed.status != SyncStatus::Skipped,
            },
        ))
    }

    /// Pull under the transaction lock.
    pub fn pull(&self) -> Result<PullOutcome, TransactionError> {
        let mut git = self.git.lock();
        let _lock = RepoLock::acquire(&self.paths)?;
        let started = Instant::now();

        if git.has_history() {
            git.stash(&self.identity, "fleetconf: uncommitted changes")?;
        }
        let outcome = self.sync.pull(&git);

        let recorded = if outcome.changed {
            Outcome::Committed { pushed: false }
        } else {
            Outcome::ReadOnly
        };
        self.ledger.record(started, Instant::now(), recorded);
        Ok(outcome)
    }

    /// Push under the transaction lock.
    pub fn push(&self) -> Result<PushOutcome, TransactionError> {
        let git = self.git.lock();
        let _lock = RepoLock::acquire(&self.paths)?;
        let started = Instant::now();

        let outcome = self.sync.push(&git);

        self.ledger.record(started, Instant::now(), Outcome::ReadOnly);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::NoCredentials;
    use crate::engine::merge::RemoteWins;
    use crate::engine::sync::SyncSettings;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Debug, Error)]
    enum TestError {
        #[error(transparent)]
        Tx(#[from] TransactionError),
        #[error(transparent)]
        Git(#[from] GitError),
        #[error("unit failed")]
        Unit,
    }

    fn identity() -> Identity {
        Identity::new("Test User", "test@example.com")
    }

    fn coordinator(dir: &TempDir) -> TransactionCoordinator {
        let git = Git::init(dir.path(), "master", &identity()).unwrap();
        let notifier = Arc::new(ChangeNotifier::new());
        let sync = SyncEngine::new(
            SyncSettings {
                remote: "origin".into(),
                integration_branch: "master".into(),
                transient_suffix: "-tmp".into(),
            },
            Arc::new(NoCredentials),
            Box::new(RemoteWins),
            Arc::clone(&notifier),
            identity(),
        );
        TransactionCoordinator::new(git, sync, notifier, identity())
    }

    #[test]
    fn read_only_unit_does_not_notify() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir);

        let names = coordinator
            .execute(false, |tree, _ctx| tree.version_names().map_err(TestError::from))
            .unwrap();
        assert!(names.is_empty());
        assert_eq!(coordinator.notifier().fired(), 0);
        assert_eq!(coordinator.ledger().last().map(|r| r.outcome), Some(Outcome::ReadOnly));
    }

    #[test]
    fn commit_notifies_once() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir);

        coordinator
            .execute(true, |tree, ctx| {
                tree.branch_from("master", "1.0")?;
                fs::write(tree.paths().work_dir.join("a.txt"), "a")?;
                tree.stage("a.txt")?;
                ctx.commit("add a");
                Ok::<_, Box<dyn std::error::Error>>(())
            })
            .map_err(|e| e.to_string())
            .unwrap();

        assert_eq!(coordinator.notifier().fired(), 1);
        assert_eq!(
            coordinator.ledger().last().map(|r| r.outcome),
            Some(Outcome::Committed { pushed: false })
        );
    }

    #[test]
    fn failed_unit_discards_changes() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir);
        let file = dir.path().join("scratch.txt");

        let result: Result<(), TestError> = coordinator.execute(false, |tree, _ctx| {
            fs::write(tree.paths().work_dir.join("scratch.txt"), "x").unwrap();
            tree.stage("scratch.txt")?;
            Err(TestError::Unit)
        });

        assert!(matches!(result, Err(TestError::Unit)));
        assert!(!file.exists());
        assert_eq!(coordinator.notifier().fired(), 0);
        assert_eq!(coordinator.ledger().last().map(|r| r.outcome), Some(Outcome::Failed));
    }

    #[test]
    fn uncommitted_changes_are_stashed() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir);
        fs::write(dir.path().join("stray.txt"), "stray").unwrap();

        let seen = AtomicUsize::new(0);
        coordinator
            .execute(false, |tree, _ctx| {
                if tree.paths().work_dir.join("stray.txt").exists() {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
                Ok::<_, TestError>(())
            })
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pull_and_push_without_remote_are_skipped() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir);

        assert_eq!(coordinator.pull().unwrap().status, SyncStatus::Skipped);
        assert_eq!(coordinator.push().unwrap().status, SyncStatus::Skipped);
        assert_eq!(coordinator.ledger().total(), 2);
    }
}
