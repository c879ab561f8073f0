#![allow(clippy::unwrap_used)]
// Smoke tests for the CLI surface.

use assert_cmd::Command;
use predicates::prelude::*;

fn iotdata() -> Command {
    let mut cmd = Command::cargo_bin("iotdata").unwrap();
    // Isolate from any real config/session/env on the machine.
    let isolated = tempfile::tempdir().unwrap();
    cmd.env("HOME", isolated.path())
        .env("XDG_CONFIG_HOME", isolated.path().join("config"))
        .env_remove("IOTDATA_TOKEN")
        .env_remove("IOTDATA_PROFILE")
        .env_remove("IOTDATA_SERVER")
        .env_remove("IOTDATA_ROLE");
    // Leak the tempdir so it outlives the command run.
    std::mem::forget(isolated);
    cmd
}

#[test]
fn help_lists_subcommands() {
    iotdata()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("devices"))
        .stdout(predicate::str::contains("access"))
        .stdout(predicate::str::contains("users"))
        .stdout(predicate::str::contains("audit"));
}

#[test]
fn no_arguments_shows_usage() {
    iotdata()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn commands_require_a_session() {
    iotdata()
        .args(["devices", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not logged in"));
}

#[test]
fn unknown_named_profile_is_rejected() {
    iotdata()
        .args(["--profile", "nope", "audit"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}
