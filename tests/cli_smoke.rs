//! CLI smoke tests. Nothing here touches the network.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("catagen")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("clear-cache"));
}

#[test]
fn version_flag_prints_version() {
    Command::cargo_bin("catagen")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn generate_with_empty_worklist_succeeds_offline() {
    let dir = tempfile::tempdir().unwrap();
    let worklist = dir.path().join("worklist.yaml");
    std::fs::write(&worklist, "[]\n").unwrap();

    let config = dir.path().join("config.yaml");
    std::fs::write(
        &config,
        format!("cache_dir: {}\n", dir.path().join("cache").display()),
    )
    .unwrap();

    Command::cargo_bin("catagen")
        .unwrap()
        .args(["--config", config.to_str().unwrap()])
        .args(["generate", worklist.to_str().unwrap()])
        .args(["--output", dir.path().join("out").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 succeeded, 0 failed"));
}

#[test]
fn resolve_rejects_malformed_coordinate() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(
        &config,
        format!("cache_dir: {}\n", dir.path().join("cache").display()),
    )
    .unwrap();

    Command::cargo_bin("catagen")
        .unwrap()
        .args(["--config", config.to_str().unwrap()])
        .args(["resolve", "not-a-coordinate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("group:name:version"));
}
