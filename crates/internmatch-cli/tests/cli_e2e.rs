//! End-to-end CLI tests using `assert_cmd`
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::tests_outside_test_module,
        clippy::absolute_paths,
        reason = "Test allows"
    )
)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

/// Binary with its data folder redirected into `temp`
fn internmatch(temp: &TempDir) -> Command {
    let mut command =
        Command::cargo_bin("internmatch").unwrap_or_else(|err| panic!("Binary not found: {err}"));
    command.env("INTERNMATCH_FOLDER", temp.path().join("data"));
    command.env("RUST_LOG", "off");
    command
}

fn write_internships(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("internships.json");
    let documents = json!([
        {
            "_id": "data",
            "title": "Data Analyst Intern",
            "skills": ["Python", "SQL"],
            "work_type": "Remote",
            "stipend": 15000,
            "views": 10
        },
        {
            "_id": "design",
            "title": "Design Intern",
            "skills": ["Figma"],
            "city": "Pune",
            "stipend": 8000,
            "views": 90
        }
    ]);
    fs::write(&path, documents.to_string()).unwrap();
    path
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).unwrap()
}

#[test]
fn test_cli_help() {
    let temp = TempDir::new().unwrap();
    internmatch(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("recommend"));
}

#[test]
fn test_cli_invalid_command() {
    let temp = TempDir::new().unwrap();
    internmatch(&temp).arg("invalid-command-xyz").assert().failure();
}

#[test]
fn test_recommend_prints_json() {
    let temp = TempDir::new().unwrap();
    let internships = write_internships(&temp);
    let student = temp.path().join("student.json");
    fs::write(&student, r#"{"id": "s1", "skills": ["Python", "SQL"]}"#).unwrap();

    let output = internmatch(&temp)
        .arg("recommend")
        .arg("--student")
        .arg(&student)
        .arg("--internships")
        .arg(&internships)
        .args(["--top-k", "1", "--location", "remote"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value = stdout_json(&output.stdout);
    assert_eq!(value["student_id"], "s1");
    assert_eq!(value["count"], 1);
    assert_eq!(value["recommendations"][0]["id"], "data");
    assert!(temp.path().join("data").join("config.toml").exists());
}

#[test]
fn test_recommend_missing_student_fails() {
    let temp = TempDir::new().unwrap();
    let internships = write_internships(&temp);

    internmatch(&temp)
        .arg("recommend")
        .arg("--student")
        .arg(temp.path().join("nobody.json"))
        .arg("--internships")
        .arg(&internships)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read student profile"));
}

#[test]
fn test_trending_orders_by_views() {
    let temp = TempDir::new().unwrap();
    let internships = write_internships(&temp);

    let output = internmatch(&temp)
        .arg("trending")
        .arg("--internships")
        .arg(&internships)
        .args(["--limit", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value = stdout_json(&output.stdout);
    assert_eq!(value[0]["id"], "design");
    assert_eq!(value[1]["id"], "data");
}

#[test]
fn test_refresh_then_stats() {
    let temp = TempDir::new().unwrap();
    let internships = write_internships(&temp);

    internmatch(&temp)
        .arg("refresh")
        .arg("--internships")
        .arg(&internships)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"indexed\": 2"));

    let output = internmatch(&temp)
        .arg("stats")
        .arg("--internships")
        .arg(&internships)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value = stdout_json(&output.stdout);
    assert_eq!(value["ready"], true);
    assert_eq!(value["index"]["records"], 2);
}
