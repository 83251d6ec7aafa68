//! engine::sync
//!
//! Remote reconciliation: converge local version branches with the remote.
//!
//! # Pull
//!
//! 1. Skip if the remote has no URL.
//! 2. Fetch. A failed fetch is logged and reconciliation continues against
//!    the remote-tracking refs already present.
//! 3. Collect local and remote-tracking branches, both minus the integration
//!    branch and transient branches. The union of names is the candidate set.
//! 4. For each candidate:
//!    - local only: delete the local branch
//!    - remote only: create the local branch at the remote tip
//!    - both, tips differ: clean, check out the integration branch, check out
//!      the version, and move it to the tip chosen by the
//!      [`ConflictResolution`] strategy
//! 5. Fire the change notifier if any local branch moved.
//!
//! # Push
//!
//! Pushes every local version branch to the same name on the remote. Skipped
//! when the remote has no URL.
//!
//! Neither operation returns an error: failures are logged and reported in
//! [`PullOutcome`] / [`PushOutcome`].

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::context::is_reserved_branch;
use super::merge::{ConflictResolution, Resolution};
use super::notify::ChangeNotifier;
use crate::core::types::Oid;
use crate::credentials::{Credentials, CredentialsProvider};
use crate::git::{Git, GitError, Identity, RefPushResult};

/// How a best-effort sync step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No remote URL is configured.
    Skipped,
    /// The step ran to completion.
    Completed,
    /// The step failed; see the reason.
    Failed,
}

/// Result of a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    pub status: SyncStatus,
    /// Why the step failed, if it did.
    pub reason: Option<String>,
    /// Fetch failure; reconciliation still ran on cached refs.
    pub fetch_error: Option<String>,
    /// Versions created from the remote.
    pub created: Vec<String>,
    /// Local-only versions that were deleted.
    pub deleted: Vec<String>,
    /// Versions moved to a new tip.
    pub updated: Vec<String>,
    /// Whether any local branch changed.
    pub changed: bool,
}

impl PullOutcome {
    fn new(status: SyncStatus) -> Self {
        Self {
            status,
            reason: None,
            fetch_error: None,
            created: Vec::new(),
            deleted: Vec::new(),
            updated: Vec::new(),
            changed: false,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            reason: Some(reason),
            ..Self::new(SyncStatus::Failed)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status != SyncStatus::Failed && self.fetch_error.is_none()
    }
}

/// Result of a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub status: SyncStatus,
    pub reason: Option<String>,
    /// Per-ref results reported by the remote.
    pub results: Vec<RefPushResult>,
}

impl PushOutcome {
    fn new(status: SyncStatus) -> Self {
        Self {
            status,
            reason: None,
            results: Vec::new(),
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            reason: Some(reason),
            ..Self::new(SyncStatus::Failed)
        }
    }

    /// Refs the remote refused.
    pub fn rejected(&self) -> impl Iterator<Item = &RefPushResult> {
        self.results.iter().filter(|r| !r.is_ok())
    }

    pub fn is_ok(&self) -> bool {
        self.status != SyncStatus::Failed && self.rejected().next().is_none()
    }
}

/// Branch naming the sync engine needs to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub remote: String,
    pub integration_branch: String,
    pub transient_suffix: String,
}

/// Reconciles local version branches with the remote.
pub struct SyncEngine {
    settings: SyncSettings,
    credentials: Arc<dyn CredentialsProvider>,
    strategy: Box<dyn ConflictResolution>,
    notifier: Arc<ChangeNotifier>,
    identity: Identity,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("settings", &self.settings)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl SyncEngine {
    pub fn new(
        settings: SyncSettings,
        credentials: Arc<dyn CredentialsProvider>,
        strategy: Box<dyn ConflictResolution>,
        notifier: Arc<ChangeNotifier>,
        identity: Identity,
    ) -> Self {
        Self {
            settings,
            credentials,
            strategy,
            notifier,
            identity,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    fn is_reserved(&self, name: &str) -> bool {
        is_reserved_branch(
            name,
            &self.settings.integration_branch,
            &self.settings.transient_suffix,
        )
    }

    fn has_remote(&self, git: &Git) -> Result<bool, GitError> {
        Ok(git.remote_url(&self.settings.remote)?.is_some())
    }

    fn resolve_credentials(&self) -> Result<Option<Credentials>, String> {
        self.credentials
            .credentials()
            .map_err(|e| format!("credentials unavailable: {}", e))
    }

    /// Fetch and reconcile. Never fails; see [`PullOutcome`].
    ///
    /// The caller must hold the transaction lock.
    pub fn pull(&self, git: &Git) -> PullOutcome {
        match self.has_remote(git) {
            Ok(true) => {}
            Ok(false) => {
                debug!(remote = %self.settings.remote, "no remote URL, skipping pull");
                return PullOutcome::new(SyncStatus::Skipped);
            }
            Err(e) => {
                warn!(error = %e, "pull failed");
                return PullOutcome::failed(e.to_string());
            }
        }

        let before = match git.fingerprint() {
            Ok(fp) => fp,
            Err(e) => {
                warn!(error = %e, "pull failed");
                return PullOutcome::failed(e.to_string());
            }
        };

        let mut outcome = PullOutcome::new(SyncStatus::Completed);

        let fetched = self
            .resolve_credentials()
            .and_then(|creds| {
                git.fetch(&self.settings.remote, creds.as_ref())
                    .map_err(|e| e.to_string())
            });
        if let Err(reason) = fetched {
            warn!(remote = %self.settings.remote, %reason, "fetch failed, reconciling against cached refs");
            outcome.fetch_error = Some(reason);
        }

        if let Err(e) = self.reconcile(git, &mut outcome) {
            warn!(error = %e, "reconciliation failed");
            outcome.status = SyncStatus::Failed;
            outcome.reason = Some(e.to_string());
        }

        match git.fingerprint() {
            Ok(after) => outcome.changed = after != before,
            Err(e) => {
                warn!(error = %e, "cannot fingerprint after pull");
                outcome.changed = true;
            }
        }

        if outcome.changed {
            info!(
                created = outcome.created.len(),
                deleted = outcome.deleted.len(),
                updated = outcome.updated.len(),
                "pull changed local versions"
            );
            self.notifier.notify();
        }

        outcome
    }

    fn reconcile(&self, git: &Git, outcome: &mut PullOutcome) -> Result<(), GitError> {
        let mut local = git.local_branches()?;
        local.retain(|name, _| !self.is_reserved(name));
        let mut remote = git.remote_branches(&self.settings.remote)?;
        remote.retain(|name, _| !self.is_reserved(name));

        // Without a single remote-tracking ref there is nothing to converge
        // to, and treating every local version as deleted would wipe them.
        if remote.is_empty() && outcome.fetch_error.is_some() {
            debug!("no remote-tracking refs after failed fetch, skipping reconciliation");
            return Ok(());
        }

        let candidates: BTreeSet<&String> = local.keys().chain(remote.keys()).collect();

        for name in candidates {
            match (local.get(name), remote.get(name)) {
                (Some(_), None) => {
                    if git.current_branch()?.as_deref() == Some(name.as_str()) {
                        git.checkout_branch(&self.settings.integration_branch)?;
                    }
                    git.delete_branch(name)?;
                    info!(version = %name, "deleted version absent from remote");
                    outcome.deleted.push(name.clone());
                }
                (None, Some(remote_tip)) => {
                    git.create_branch(name, remote_tip)?;
                    info!(version = %name, tip = %remote_tip.short(7), "created version from remote");
                    outcome.created.push(name.clone());
                }
                (Some(local_tip), Some(remote_tip)) if local_tip != remote_tip => {
                    if self.merge(git, name, local_tip, remote_tip)? {
                        outcome.updated.push(name.clone());
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn merge(&self, git: &Git, version: &str, local: &Oid, remote: &Oid) -> Result<bool, GitError> {
        git.clean()?;
        git.checkout_branch(&self.settings.integration_branch)?;
        git.checkout_branch(version)?;

        let resolution = self
            .strategy
            .resolve(git, version, local, remote, &self.identity)?;
        debug!(
            version,
            strategy = self.strategy.name(),
            ?resolution,
            "resolved diverged version"
        );

        match resolution.new_tip() {
            Some(tip) => {
                let message = match &resolution {
                    Resolution::FastForward(_) => "fleetconf: fast-forward to remote",
                    _ => "fleetconf: merge remote",
                };
                git.reset_branch(version, tip, message)?;
                info!(version, tip = %tip.short(7), "updated version from remote");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Push every local version branch. Never fails; see [`PushOutcome`].
    ///
    /// The caller must hold the transaction lock.
    pub fn push(&self, git: &Git) -> PushOutcome {
        match self.has_remote(git) {
            Ok(true) => {}
            Ok(false) => {
                debug!(remote = %self.settings.remote, "no remote URL, skipping push");
                return PushOutcome::new(SyncStatus::Skipped);
            }
            Err(e) => {
                warn!(error = %e, "push failed");
                return PushOutcome::failed(e.to_string());
            }
        }

        let branches: Vec<String> = match git.local_branches() {
            Ok(branches) => branches
                .into_keys()
                .filter(|name| !self.is_reserved(name))
                .collect(),
            Err(e) => {
                warn!(error = %e, "push failed");
                return PushOutcome::failed(e.to_string());
            }
        };

        let creds = match self.resolve_credentials() {
            Ok(creds) => creds,
            Err(reason) => {
                warn!(%reason, "push skipped");
                return PushOutcome::failed(reason);
            }
        };

        match git.push(&self.settings.remote, &branches, creds.as_ref()) {
            Ok(results) => {
                let outcome = PushOutcome {
                    status: SyncStatus::Completed,
                    reason: None,
                    results,
                };
                for rejected in outcome.rejected() {
                    warn!(
                        refname = %rejected.refname,
                        reason = rejected.rejected.as_deref().unwrap_or(""),
                        "remote rejected ref"
                    );
                }
                debug!(count = branches.len(), "pushed versions");
                outcome
            }
            Err(e) => {
                warn!(error = %e, "push failed");
                PushOutcome::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::NoCredentials;
    use crate::engine::merge::RemoteWins;
    use tempfile::TempDir;

    fn identity() -> Identity {
        Identity::new("Test User", "test@example.com")
    }

    fn engine(notifier: Arc<ChangeNotifier>) -> SyncEngine {
        SyncEngine::new(
            SyncSettings {
                remote: "origin".into(),
                integration_branch: "master".into(),
                transient_suffix: "-tmp".into(),
            },
            Arc::new(NoCredentials),
            Box::new(RemoteWins),
            notifier,
            identity(),
        )
    }

    #[test]
    fn pull_without_remote_is_skipped() {
        let dir = TempDir::new().unwrap();
        let git = Git::init(dir.path(), "master", &identity()).unwrap();
        let notifier = Arc::new(ChangeNotifier::new());

        let outcome = engine(Arc::clone(&notifier)).pull(&git);
        assert_eq!(outcome.status, SyncStatus::Skipped);
        assert!(!outcome.changed);
        assert_eq!(notifier.fired(), 0);

        assert_eq!(engine(notifier).push(&git).status, SyncStatus::Skipped);
    }

    #[test]
    fn unreachable_remote_keeps_local_versions() {
        let dir = TempDir::new().unwrap();
        let git = Git::init(&dir.path().join("node"), "master", &identity()).unwrap();
        git.set_remote_url("origin", &dir.path().join("missing.git").to_string_lossy())
            .unwrap();
        let head = git.head_oid().unwrap();
        git.create_branch("1.0", &head).unwrap();

        let outcome = engine(Arc::new(ChangeNotifier::new())).pull(&git);
        assert!(outcome.fetch_error.is_some());
        assert!(outcome.deleted.is_empty());
        assert!(git.branch_exists("1.0"));

        let pushed = engine(Arc::new(ChangeNotifier::new())).push(&git);
        assert_eq!(pushed.status, SyncStatus::Failed);
        assert!(pushed.reason.is_some());
    }

    #[test]
    fn outcome_helpers() {
        let mut outcome = PushOutcome::new(SyncStatus::Completed);
        assert!(outcome.is_ok());
        outcome.results.push(RefPushResult {
            refname: "refs/heads/1.0".into(),
            rejected: Some("non-fast-forward".into()),
        });
        assert!(!outcome.is_ok());
        assert_eq!(outcome.rejected().count(), 1);

        assert!(!PullOutcome::failed("boom".into()).is_ok());
    }
}
