//! Focused CLI argument parsing tests.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;

fn attrgate() -> Command {
    let mut cmd = Command::cargo_bin("attrgate").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn version_command_succeeds() {
    attrgate()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("attrgate"));
}

#[test]
fn version_flag_shows_version() {
    attrgate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("attrgate"));
}

#[test]
fn help_lists_commands() {
    attrgate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("evaluate"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn evaluate_requires_request() {
    attrgate()
        .args(["evaluate", "--policy", "policy.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--request"));
}

#[test]
fn evaluate_help_shows_options() {
    attrgate()
        .args(["evaluate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--policy"))
        .stdout(predicate::str::contains("--fail-on-deny"))
        .stdout(predicate::str::contains("--language"));
}

#[test]
fn unknown_command_fails() {
    attrgate().arg("authorize").assert().failure();
}
