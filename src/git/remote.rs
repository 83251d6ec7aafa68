//! git::remote
//!
//! Fetch and push against the shared remote.
//!
//! Authentication is resolved per request inside the transport callback, in
//! this order:
//! 1. Explicit username/password from the caller's credentials provider
//! 2. ssh agent, when the transport asks for an ssh key
//! 3. git's configured credential helpers
//! 4. The transport default
//!
//! The callback gives up after a few attempts so a rejected password cannot
//! spin forever.

use std::cell::RefCell;

use tracing::debug;

use super::interface::{Git, GitError};
use crate::credentials::Credentials;

const MAX_AUTH_ATTEMPTS: usize = 3;

/// Outcome of pushing one ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefPushResult {
    /// The remote ref that was updated
    pub refname: String,
    /// Rejection reason reported by the remote, if any
    pub rejected: Option<String>,
}

impl RefPushResult {
    pub fn is_ok(&self) -> bool {
        self.rejected.is_none()
    }
}

fn remote_callbacks<'a>(
    config: Option<git2::Config>,
    credentials: Option<&'a Credentials>,
) -> git2::RemoteCallbacks<'a> {
    let mut attempts = 0usize;
    let mut callbacks = git2::RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_AUTH_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }

        if allowed.is_user_pass_plaintext() {
            if let Some(creds) = credentials {
                return git2::Cred::userpass_plaintext(&creds.username, &creds.password);
            }
        }
        if allowed.is_ssh_key() {
            if let Some(user) = username_from_url {
                return git2::Cred::ssh_key_from_agent(user);
            }
        }
        if allowed.is_user_pass_plaintext() {
            if let Some(cfg) = &config {
                if let Ok(cred) = git2::Cred::credential_helper(cfg, url, username_from_url) {
                    return Ok(cred);
                }
            }
        }
        git2::Cred::default()
    });
    callbacks
}

impl Git {
    /// Fetch every branch of `remote` into `refs/remotes/<remote>/*`.
    ///
    /// Remote-tracking refs of branches deleted on the remote are pruned.
    pub fn fetch(&self, remote: &str, credentials: Option<&Credentials>) -> Result<(), GitError> {
        let mut handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| GitError::from_git2(e, remote))?;

        let refspec = format!("+refs/heads/*:refs/remotes/{}/*", remote);
        let mut options = git2::FetchOptions::new();
        options.remote_callbacks(remote_callbacks(self.repo.config().ok(), credentials));
        options.prune(git2::FetchPrune::On);

        debug!(remote, %refspec, "fetching");
        handle
            .fetch(&[refspec.as_str()], Some(&mut options), None)
            .map_err(|e| GitError::Remote {
                remote: remote.to_string(),
                message: e.message().to_string(),
            })
    }

    /// Push the named local branches to the same names on `remote`.
    ///
    /// A transport failure is an error; per-ref rejections are reported in
    /// the returned results.
    pub fn push(
        &self,
        remote: &str,
        branches: &[String],
        credentials: Option<&Credentials>,
    ) -> Result<Vec<RefPushResult>, GitError> {
        if branches.is_empty() {
            return Ok(Vec::new());
        }

        let mut handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| GitError::from_git2(e, remote))?;

        let refspecs: Vec<String> = branches
            .iter()
            .map(|b| format!("refs/heads/{b}:refs/heads/{b}"))
            .collect();

        let results: RefCell<Vec<RefPushResult>> = RefCell::new(Vec::new());
        {
            let mut callbacks = remote_callbacks(self.repo.config().ok(), credentials);
            callbacks.push_update_reference(|refname, status| {
                results.borrow_mut().push(RefPushResult {
                    refname: refname.to_string(),
                    rejected: status.map(String::from),
                });
                Ok(())
            });

            let mut options = git2::PushOptions::new();
            options.remote_callbacks(callbacks);

            debug!(remote, count = refspecs.len(), "pushing");
            handle
                .push(&refspecs, Some(&mut options))
                .map_err(|e| GitError::Remote {
                    remote: remote.to_string(),
                    message: e.message().to_string(),
                })?;
        }

        Ok(results.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Identity;
    use std::fs;
    use tempfile::TempDir;

    fn identity() -> Identity {
        Identity::new("Test User", "test@example.com")
    }

    fn bare_remote(dir: &TempDir) -> String {
        let path = dir.path().join("remote.git");
        git2::Repository::init_bare(&path).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn clone(dir: &TempDir, name: &str, url: &str) -> Git {
        let git = Git::init(&dir.path().join(name), "master", &identity()).unwrap();
        git.set_remote_url("origin", url).unwrap();
        git
    }

    #[test]
    fn push_then_fetch_elsewhere() {
        let dir = TempDir::new().unwrap();
        let url = bare_remote(&dir);
        let a = clone(&dir, "a", &url);
        let b = clone(&dir, "b", &url);

        let head = a.head_oid().unwrap();
        a.create_branch("1.0", &head).unwrap();
        let results = a.push("origin", &["1.0".to_string()], None).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
        assert_eq!(results[0].refname, "refs/heads/1.0");

        b.fetch("origin", None).unwrap();
        let remote = b.remote_branches("origin").unwrap();
        assert_eq!(remote.get("1.0"), Some(&head));
    }

    #[test]
    fn fetch_prunes_deleted_branches() {
        let dir = TempDir::new().unwrap();
        let url = bare_remote(&dir);
        let a = clone(&dir, "a", &url);
        let b = clone(&dir, "b", &url);

        let head = a.head_oid().unwrap();
        a.create_branch("1.0", &head).unwrap();
        a.push("origin", &["1.0".to_string()], None).unwrap();
        b.fetch("origin", None).unwrap();
        assert!(b.remote_branches("origin").unwrap().contains_key("1.0"));

        let bare = git2::Repository::open_bare(&url).unwrap();
        bare.find_reference("refs/heads/1.0").unwrap().delete().unwrap();

        b.fetch("origin", None).unwrap();
        assert!(!b.remote_branches("origin").unwrap().contains_key("1.0"));
    }

    #[test]
    fn non_fast_forward_is_rejected_per_ref() {
        let dir = TempDir::new().unwrap();
        let url = bare_remote(&dir);
        let a = clone(&dir, "a", &url);
        let b = clone(&dir, "b", &url);

        let a_head = a.head_oid().unwrap();
        a.create_branch("1.0", &a_head).unwrap();
        a.push("origin", &["1.0".to_string()], None).unwrap();

        // b's initial commit is unrelated to a's.
        fs::write(b.paths().work_dir.join("f"), "x").unwrap();
        b.stage_path("f").unwrap();
        let b_head = b.commit("unrelated", &identity()).unwrap().unwrap();
        b.create_branch("1.0", &b_head).unwrap();

        let outcome = b.push("origin", &["1.0".to_string()], None);
        let rejected = match outcome {
            Ok(results) => results.iter().any(|r| !r.is_ok()),
            Err(GitError::Remote { .. }) => true,
            Err(other) => panic!("unexpected error: {other}"),
        };
        assert!(rejected);
    }

    #[test]
    fn missing_remote_is_an_error() {
        let dir = TempDir::new().unwrap();
        let git = Git::init(dir.path(), "master", &identity()).unwrap();
        assert!(git.fetch("origin", None).is_err());
    }

    #[test]
    fn empty_push_is_noop() {
        let dir = TempDir::new().unwrap();
        let git = Git::init(dir.path(), "master", &identity()).unwrap();
        assert!(git.push("origin", &[], None).unwrap().is_empty());
    }
}
