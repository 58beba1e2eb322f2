//! Smoke tests for the `wt` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const RESIDENTIAL: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/residential.yml");
const CYCLE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/cycle.yml");

/// `wt` pointed at a private database and no config file
fn wt(temp_dir: &TempDir) -> Command {
    let config = temp_dir.path().join("wbs.yml");
    if !config.exists() {
        std::fs::write(&config, "log-level: warn\n").expect("Failed to write config");
    }
    let mut cmd = Command::cargo_bin("wt").expect("binary built");
    cmd.arg("--config")
        .arg(&config)
        .arg("--db")
        .arg(temp_dir.path().join("wbs.db"));
    cmd
}

#[test]
fn test_validate_valid_definition() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    wt(&temp_dir)
        .args(["validate", RESIDENTIAL])
        .assert()
        .success()
        .stdout(predicate::str::contains("RESIDENTIAL"))
        .stdout(predicate::str::contains("5 tasks"));
}

#[test]
fn test_validate_reports_cycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    wt(&temp_dir)
        .args(["validate", CYCLE])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Dependency cycle detected"));
}

#[test]
fn test_import_publish_preview_instantiate() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    wt(&temp_dir)
        .args(["import", RESIDENTIAL])
        .assert()
        .success()
        .stdout(predicate::str::contains("draft"));

    // Drafts cannot be previewed
    wt(&temp_dir)
        .args(["preview", "RESIDENTIAL", "--preset", "HOUSE"])
        .assert()
        .failure();

    wt(&temp_dir)
        .args(["publish", "RESIDENTIAL", "--version", "1"])
        .assert()
        .success();

    wt(&temp_dir)
        .args(["preview", "RESIDENTIAL", "--preset", "HOUSE", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ARC-D01\""))
        .stdout(predicate::str::contains("LND-PANO").not());

    wt(&temp_dir)
        .args(["preview", "RESIDENTIAL", "--preset", "ARC-NO-SURVEY", "--policy", "strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ARC-C02 needs ARC-C01"));

    wt(&temp_dir)
        .args([
            "instantiate",
            "RESIDENTIAL",
            "--project",
            "p-1",
            "--start",
            "2025-01-01",
            "--preset",
            "HOUSE",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created 4 tasks"))
        .stdout(predicate::str::contains("2025-01-19"));

    wt(&temp_dir)
        .args(["tasks", "--project", "p-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ARC-C01"))
        .stdout(predicate::str::contains("2025-01-09"));

    wt(&temp_dir)
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("published"));
}

#[test]
fn test_missing_definition_file_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    wt(&temp_dir)
        .args(["validate", "does-not-exist.yml"])
        .assert()
        .failure();
}
