//! CLI subprocess integration tests.
//!
//! These invoke the `drunner` binary as a subprocess and verify exit
//! codes and messages for the paths that need no docker daemon: argument
//! validation, listing an empty root, obliterating nothing, completions.

use std::process::Command;

fn drunner_bin(root: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_drunner"));
    cmd.arg("--root").arg(root);
    cmd
}

fn temp_root() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

#[test]
fn version_exits_zero() {
    let out = Command::new(env!("CARGO_BIN_EXE_drunner"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("drunner"));
}

#[test]
fn list_on_fresh_root_reports_nothing_installed() {
    let root = temp_root();
    let out = drunner_bin(root.path()).arg("list").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("no services installed"));
    // Initialisation created the layout.
    assert!(root.path().join("services").is_dir());
    assert!(root.path().join("hostvolumes").is_dir());
}

#[test]
fn uninstall_of_unknown_service_fails_with_message() {
    let root = temp_root();
    let out = drunner_bin(root.path())
        .args(["uninstall", "ghost"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("error:"));
    assert!(String::from_utf8_lossy(&out.stderr).contains("not installed"));
}

#[test]
fn obliterate_of_nothing_exits_no_change() {
    let root = temp_root();
    let out = drunner_bin(root.path())
        .args(["obliterate", "ghost"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&out.stdout).contains("nothing to remove"));
}

#[test]
fn invalid_service_name_is_rejected() {
    let root = temp_root();
    let out = drunner_bin(root.path())
        .args(["install", "bad/name", "drunner/app"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid service name"));
}

#[test]
fn restore_requires_an_existing_backup_file() {
    let root = temp_root();
    let missing = root.path().join("nope.backup");
    let out = drunner_bin(root.path())
        .args(["restore", "svc"])
        .arg(&missing)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("does not exist"));
}

#[test]
fn completions_generate_for_bash() {
    let out = Command::new(env!("CARGO_BIN_EXE_drunner"))
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("drunner"));
}

#[test]
fn missing_subcommand_shows_usage() {
    let out = Command::new(env!("CARGO_BIN_EXE_drunner")).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage"));
}
