//! Corruption recovery tests for cyclelog.
//!
//! These tests verify the system can handle:
//! - Corrupted preference files
//! - Unreadable records inside the period log
//! - Logs written in the legacy dash format
//! - Missing files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cyclelog"));
    cmd.env("XDG_CONFIG_HOME", dir.join("config"))
        .arg("--data-dir")
        .arg(dir.join("data"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn write_prefs(dir: &Path, contents: &str) {
    fs::create_dir_all(dir.join("data")).unwrap();
    fs::write(dir.join("data/prefs.json"), contents).expect("Failed to write prefs");
}

#[test]
fn test_corrupted_prefs_file() {
    let temp_dir = setup_test_dir();
    write_prefs(temp_dir.path(), "{ invalid json }}}}");

    cli(temp_dir.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No period data recorded yet"));

    // Logging replaces the corrupted file with a valid one
    cli(temp_dir.path())
        .args(["log", "--start", "2026-01-15"])
        .assert()
        .success();

    let contents = fs::read_to_string(temp_dir.path().join("data/prefs.json")).unwrap();
    let values: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(values["period_entries"], "2026-01-15");
}

#[test]
fn test_unreadable_record_is_skipped() {
    let temp_dir = setup_test_dir();
    write_prefs(
        temp_dir.path(),
        r#"{"period_entries":"2026-01-15|not-a-date|2026-02-12","average_cycle":28}"#,
    );

    cli(temp_dir.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("Period history (2 entries)"));

    cli(temp_dir.path())
        .arg("export")
        .assert()
        .success()
        .stdout(predicate::str::contains("not-a-date").not())
        .stdout(predicate::str::contains("2026-02-12,2026-02-12,1"));
}

#[test]
fn test_legacy_dash_format_is_read() {
    let temp_dir = setup_test_dir();
    write_prefs(
        temp_dir.path(),
        r#"{"period_entries":"2026-01-15-2026-01-19|2026-02-12","last_period_start":"2026-02-12","average_cycle":28}"#,
    );

    cli(temp_dir.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("2026-01-15 to 2026-01-19 (5 days)"))
        .stdout(predicate::str::contains("2026-02-12 (no end date)"));

    // New records are appended in the interval format next to the legacy ones
    cli(temp_dir.path())
        .args(["log", "--start", "2026-03-12", "--end", "2026-03-15"])
        .assert()
        .success();

    let contents = fs::read_to_string(temp_dir.path().join("data/prefs.json")).unwrap();
    let values: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(
        values["period_entries"],
        "2026-01-15-2026-01-19|2026-02-12|2026-03-12/2026-03-15"
    );
}

#[test]
fn test_legacy_format_config_keeps_writing_dashes() {
    let temp_dir = setup_test_dir();
    let config_dir = temp_dir.path().join("config/cyclelog");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[storage]\nentry_format = \"legacy\"\n",
    )
    .unwrap();

    cli(temp_dir.path())
        .args(["log", "--start", "2026-01-15", "--end", "2026-01-19"])
        .assert()
        .success();

    let contents = fs::read_to_string(temp_dir.path().join("data/prefs.json")).unwrap();
    let values: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(values["period_entries"], "2026-01-15-2026-01-19");
}

#[test]
fn test_missing_data_dir_is_created() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["log", "--start", "2026-01-15"])
        .assert()
        .success();

    assert!(temp_dir.path().join("data/prefs.json").exists());
}

#[test]
fn test_empty_prefs_file() {
    let temp_dir = setup_test_dir();
    write_prefs(temp_dir.path(), "");

    cli(temp_dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not enough data"));
}
