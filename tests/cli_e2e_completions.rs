//! End-to-end tests for the `completions` command.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_completions_bash() {
    let mut cmd = cargo_bin_cmd!("blueprint");
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_blueprint"))
        .stdout(predicate::str::contains("--skip-network"));
}

#[test]
fn test_completions_zsh() {
    let mut cmd = cargo_bin_cmd!("blueprint");
    cmd.args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef blueprint"));
}

#[test]
fn test_completions_outside_project() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("blueprint");
    cmd.current_dir(temp.path())
        .args(["completions", "fish"])
        .assert()
        .success();
}

#[test]
fn test_completions_invalid_shell() {
    let mut cmd = cargo_bin_cmd!("blueprint");
    cmd.args(["completions", "tcsh"]).assert().failure();
}
