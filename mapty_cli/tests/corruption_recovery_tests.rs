//! Corruption recovery tests for the mapty binary.
//!
//! These tests verify the log can handle:
//! - An unreadable saved blob
//! - Individual records that no longer decode
//! - Records written by older versions

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup_test_dir() -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("config.toml"), "").expect("Failed to write config");
    fs::create_dir_all(temp_dir.path().join("data")).expect("Failed to create data dir");
    temp_dir
}

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mapty"));
    cmd.arg("--config")
        .arg(dir.join("config.toml"))
        .arg("--data-dir")
        .arg(dir.join("data"))
        .arg("--offline");
    cmd
}

fn blob_path(dir: &Path) -> std::path::PathBuf {
    dir.join("data").join("workouts.json")
}

#[test]
fn test_unreadable_blob_starts_empty() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    fs::write(blob_path(dir), "{ invalid json }}}}").expect("Failed to write corrupted blob");

    cli(dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No workouts logged yet"))
        .stderr(predicate::str::contains("Some workouts could not be restored"))
        .stderr(predicate::str::contains("original kept as workouts.corrupt-"));

    // The log is usable again after the next save
    cli(dir)
        .args(["add", "--lat", "1", "--lng", "2", "--distance", "5"])
        .args(["--duration", "25", "--cadence", "160", "--title", "Fresh start"])
        .assert()
        .success();

    let blob = fs::read_to_string(blob_path(dir)).expect("No saved workouts");
    assert!(blob.contains("Fresh start"));
}

#[test]
fn test_unreadable_history_is_kept_after_next_save() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    // One good record spoiled by a trailing comma
    let original = r#"[{"id":"keep","type":"running","createdAt":"2024-03-01T08:00:00Z","coords":[51.5,-0.12],"title":"precious","distance":5.0,"duration":30.0,"cadence":170.0},]"#;
    fs::write(blob_path(dir), original).expect("Failed to write blob");

    cli(dir)
        .args(["add", "--lat", "1", "--lng", "2", "--distance", "5"])
        .args(["--duration", "25", "--cadence", "160", "--title", "Fresh start"])
        .assert()
        .success();

    let saved = fs::read_to_string(blob_path(dir)).expect("No saved workouts");
    assert!(!saved.contains("precious"));

    let backups: Vec<_> = fs::read_dir(dir.join("data"))
        .expect("Failed to read data dir")
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.starts_with("workouts.corrupt-") && name.ends_with(".json")
        })
        .collect();
    assert_eq!(backups.len(), 1);
    let kept = fs::read_to_string(backups[0].path()).expect("Failed to read backup");
    assert_eq!(kept, original);
}

#[test]
fn test_bad_records_are_skipped() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let blob = r#"[
        {"id":"good1","type":"running","createdAt":"2024-03-01T08:00:00Z","coords":[51.5,-0.12],
         "title":"Thames path","distance":5.0,"duration":30.0,"cadence":170.0,"clicks":3},
        {"id":"bad1","type":"swimming","createdAt":"2024-03-02T08:00:00Z","coords":[51.5,-0.12],
         "title":"Pool","distance":1.0,"duration":30.0},
        {"id":"bad2","type":"cycling","createdAt":"2024-03-03T08:00:00Z","coords":[51.5,-0.12],
         "title":"No climb","distance":"far","duration":60.0},
        {"id":"good2","type":"cycling","createdAt":"2024-03-04T08:00:00Z","coords":[51.6,-0.1],
         "title":"Hills","distance":30.0,"duration":90.0,"elevationGain":400.0}
    ]"#;
    fs::write(blob_path(dir), blob).expect("Failed to write blob");

    cli(dir)
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Thames path"))
        .stdout(predicate::str::contains("Hills"))
        .stdout(predicate::str::contains("Pool").not())
        .stderr(predicate::str::contains("2 saved workout(s) were skipped"));
}

#[test]
fn test_legacy_record_is_upgraded_on_save() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    // Older records used `date` and carried no title or clicks
    let blob = r#"[
        {"id":"old","type":"running","date":"2023-06-10T07:30:00Z","coords":[48.85,2.35],
         "distance":10.0,"duration":50.0,"cadence":175.0,"pace":5.0,
         "description":"Running on June 10"}
    ]"#;
    fs::write(blob_path(dir), blob).expect("Failed to write blob");

    cli(dir)
        .args(["select", "old"])
        .assert()
        .success()
        .stdout(predicate::str::contains("48.85000, 2.35000"));

    let saved = fs::read_to_string(blob_path(dir)).expect("No saved workouts");
    assert!(saved.contains("\"createdAt\""));
    assert!(saved.contains("\"clicks\":1"));
}
