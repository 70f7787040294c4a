//! CLI integration tests for entity-scaffold.
//!
//! These tests verify command-line argument parsing, defaults, and exit
//! codes for error conditions that need no live database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the entity-scaffold binary.
fn cmd() -> Command {
    Command::cargo_bin("entity-scaffold").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_scaffold_command() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scaffold"));
}

#[test]
fn test_scaffold_help_shows_all_flags() {
    cmd()
        .args(["scaffold", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--connection"))
        .stdout(predicate::str::contains("--provider"))
        .stdout(predicate::str::contains("--namespace"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--pluralize"))
        .stdout(predicate::str::contains("--data-annotations"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_scaffold_help_shows_config_default() {
    cmd()
        .args(["scaffold", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("appsettings.json"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("entity-scaffold"));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_missing_connection_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .arg("scaffold")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("connection"));
}

#[test]
fn test_invalid_provider_value_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .args(["scaffold", "--provider", "oracle", "--connection", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("provider"));
}

#[test]
fn test_explicit_missing_config_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .args([
            "scaffold",
            "--connection",
            "x",
            "--config",
            "does-not-exist.json",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn test_connection_from_config_file_is_used() {
    // A config file supplying only the connection passes resolution and
    // fails later, at the database, proving the file was read.
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("appsettings.json");
    let mut file = std::fs::File::create(&config_path).unwrap();
    file.write_all(
        br#"{ "CodeGenerator": { "connection": "host=127.0.0.1 port=1 user=x dbname=x connect_timeout=1", "provider": "PostgreSql" } }"#,
    )
    .unwrap();

    // Resolution must succeed; the failure is connectivity, not config.
    cmd()
        .current_dir(dir.path())
        .arg("scaffold")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no connection string").not());
}

#[test]
fn test_bad_namespace_flag_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .args([
            "scaffold",
            "--connection",
            "x",
            "--namespace",
            "not a namespace",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("namespace"));
}
