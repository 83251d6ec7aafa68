//! Integration tests for the fleetconf binary.
//!
//! These tests run the CLI against stores in temporary directories. `HOME`
//! points at a scratch directory so no user configuration leaks in.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Env {
    home: TempDir,
    work: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            home: TempDir::new().unwrap(),
            work: TempDir::new().unwrap(),
        }
    }

    fn repo(&self, name: &str) -> std::path::PathBuf {
        self.work.path().join(name)
    }

    /// A command against the store at `repo`.
    fn fleetconf(&self, repo: &Path) -> Command {
        let mut cmd = Command::cargo_bin("fleetconf").unwrap();
        cmd.env("HOME", self.home.path())
            .env_remove("FLEETCONF_LOG")
            .arg("--repo")
            .arg(repo);
        cmd
    }
}

#[test]
fn help_flag_works() {
    Command::cargo_bin("fleetconf")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("replicated"));
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("fleetconf")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetconf"));
}

#[test]
fn create_and_list_versions() {
    let env = Env::new();
    let repo = env.repo("node");

    env.fleetconf(&repo)
        .args(["create-version", "1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created version 1.0"));
    env.fleetconf(&repo)
        .args(["create-version", "1.1", "--parent", "1.0"])
        .assert()
        .success();

    env.fleetconf(&repo)
        .arg("versions")
        .assert()
        .success()
        .stdout(predicate::str::contains("* 1.0"))
        .stdout(predicate::str::contains("  1.1"))
        .stdout(predicate::str::contains("master").not());
}

#[test]
fn set_and_get_settings() {
    let env = Env::new();
    let repo = env.repo("node");

    env.fleetconf(&repo).args(["create-version", "1.0"]).assert().success();
    env.fleetconf(&repo).args(["create-profile", "web"]).assert().success();
    env.fleetconf(&repo)
        .args(["set", "web", "http", "port=8080", "host=0.0.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated http in 1.0/web"));

    env.fleetconf(&repo)
        .args(["get", "web", "http"])
        .assert()
        .success()
        .stdout(predicate::str::contains("host=0.0.0.0"))
        .stdout(predicate::str::contains("port=8080"));

    env.fleetconf(&repo)
        .args(["set", "web", "http", "--unset", "host"])
        .assert()
        .success();
    env.fleetconf(&repo)
        .args(["get", "web", "http"])
        .assert()
        .success()
        .stdout(predicate::str::contains("host").not());

    env.fleetconf(&repo)
        .args(["get", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http"));
}

#[test]
fn delete_version_reports_unsupported() {
    let env = Env::new();
    let repo = env.repo("node");

    env.fleetconf(&repo).args(["create-version", "1.0"]).assert().success();
    env.fleetconf(&repo)
        .args(["delete-version", "1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not supported"));
}

#[test]
fn missing_profile_is_an_error() {
    let env = Env::new();
    let repo = env.repo("node");

    env.fleetconf(&repo).args(["create-version", "1.0"]).assert().success();
    env.fleetconf(&repo)
        .args(["set", "ghost", "http", "a=b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn pull_and_push_through_a_shared_remote() {
    let env = Env::new();
    let remote = env.repo("remote.git");
    git2::Repository::init_bare(&remote).unwrap();
    let url = remote.to_string_lossy().into_owned();

    let a = env.repo("a");
    env.fleetconf(&a)
        .args(["--remote-url", url.as_str(), "create-version", "1.0"])
        .assert()
        .success();
    env.fleetconf(&a)
        .args(["--remote-url", url.as_str(), "create-profile", "web"])
        .assert()
        .success();

    let b = env.repo("b");
    env.fleetconf(&b)
        .args(["--remote-url", url.as_str(), "pull"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date"));
    env.fleetconf(&b)
        .args(["profiles", "--at", "1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("web"));

    env.fleetconf(&b)
        .args(["--remote-url", url.as_str(), "push"])
        .assert()
        .success();
}

#[test]
fn pull_without_remote_is_skipped() {
    let env = Env::new();
    env.fleetconf(&env.repo("node"))
        .arg("pull")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to pull"));
}

#[test]
fn import_flat_directory() {
    let env = Env::new();
    let repo = env.repo("node");
    let source = env.work.path().join("import");
    std::fs::create_dir_all(source.join("web")).unwrap();
    std::fs::write(source.join("web/http.properties"), "port=80\n").unwrap();

    env.fleetconf(&repo)
        .args(["import"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("into 1.0"));

    env.fleetconf(&repo)
        .args(["get", "web", "http"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port=80"));
}

#[test]
fn init_records_repo_config() {
    let env = Env::new();
    let repo = env.repo("node");

    env.fleetconf(&repo)
        .args(["init", "--default-version", "2.0", "--integration-branch", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized store"));
    assert!(repo.join(".git/fleetconf/config.toml").is_file());

    env.fleetconf(&repo)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("default_version = 2.0"))
        .stdout(predicate::str::contains("integration_branch = main"));

    env.fleetconf(&repo)
        .args(["create-version", "2.0"])
        .assert()
        .success();
    env.fleetconf(&repo)
        .arg("versions")
        .assert()
        .success()
        .stdout(predicate::str::contains("* 2.0"));
}
