#![allow(deprecated)]
//! End-to-end runs of the `promptgrid` binary against the offline fake model.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("config.json"),
            r#"{"models":[{"name":"fake"}],"request_delay_seconds":0,"max_concurrent_requests":2}"#,
        )
        .unwrap();
        fs::create_dir(root.join("prompts")).unwrap();
        fs::create_dir(root.join("test_cases")).unwrap();
        fs::write(root.join("prompts/A.md"), "Be terse.").unwrap();
        fs::write(root.join("prompts/B.md"), "Be verbose.").unwrap();
        fs::write(root.join("test_cases/X.md"), "What is 2+2?").unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn db(&self) -> PathBuf {
        self.root().join("results.db")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("promptgrid").unwrap();
        cmd.current_dir(self.root()).env_remove("PROMPTGRID_DB");
        cmd
    }

    fn run(&self) -> String {
        let out = self
            .cmd()
            .args(["run", "--db"])
            .arg(self.db())
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        String::from_utf8(out).unwrap().trim().to_string()
    }
}

#[test]
fn run_then_inspect_results() {
    let ws = Workspace::new();
    let run_id = ws.run();
    assert!(!run_id.is_empty());

    ws.cmd()
        .args(["results", "--db"])
        .arg(ws.db())
        .assert()
        .success()
        .stdout(predicate::str::contains("A.md"))
        .stdout(predicate::str::contains("B.md"))
        .stdout(predicate::str::contains(run_id.as_str()));

    let json = ws
        .cmd()
        .args(["results", "--format", "json", "--run-id", &run_id, "--db"])
        .arg(ws.db())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rows: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(rows.as_array().map(Vec::len), Some(2));

    ws.cmd()
        .args(["list-runs", "--db"])
        .arg(ws.db())
        .assert()
        .success()
        .stdout(predicate::str::contains(run_id.as_str()));

    ws.cmd()
        .args(["latest", "--db"])
        .arg(ws.db())
        .assert()
        .success()
        .stdout(predicate::str::contains(run_id.as_str()));
}

#[test]
fn run_progress_goes_to_stderr() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["run", "--sync", "--db"])
        .arg(ws.db())
        .assert()
        .success()
        .stderr(predicate::str::contains("[2/2]"))
        .stderr(predicate::str::contains("2/2 successful"));
}

#[test]
fn rerun_with_same_id_keeps_one_row_per_combination() {
    let ws = Workspace::new();
    for _ in 0..2 {
        ws.cmd()
            .args(["run", "--run-id", "fixed", "--db"])
            .arg(ws.db())
            .assert()
            .success();
    }
    let json = ws
        .cmd()
        .args(["results", "--format", "json", "--run-id", "fixed", "--db"])
        .arg(ws.db())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rows: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(rows.as_array().map(Vec::len), Some(2));
}

#[test]
fn export_writes_requested_format() {
    let ws = Workspace::new();
    let run_id = ws.run();
    let out = ws.root().join("out/report.md");

    ws.cmd()
        .args(["export", "--format", "markdown", "--run-id", &run_id, "-o"])
        .arg(&out)
        .arg("--db")
        .arg(ws.db())
        .assert()
        .success();
    let body = fs::read_to_string(&out).unwrap();
    assert!(body.contains(&run_id));
    assert!(body.contains("A.md"));

    // default location is exports/ under the working directory
    ws.cmd()
        .args(["export", "--format", "json", "--db"])
        .arg(ws.db())
        .assert()
        .success();
    let exported: Vec<_> = fs::read_dir(ws.root().join("exports"))
        .unwrap()
        .filter_map(Result::ok)
        .collect();
    assert_eq!(exported.len(), 1);
    let name = exported[0].file_name().to_string_lossy().into_owned();
    assert!(name.starts_with("results_") && name.ends_with(".json"));
}

#[test]
fn missing_config_exits_with_config_error() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["run", "--config", "nope.json", "--db"])
        .arg(ws.db())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config.template.json"));
}

#[test]
fn unknown_model_filter_exits_with_config_error() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["run", "--models", "gpt-ghost", "--db"])
        .arg(ws.db())
        .assert()
        .code(2);
}

#[test]
fn results_on_empty_database_fail() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["results", "--db"])
        .arg(ws.db())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("No experimental results found."));
}

#[test]
fn validate_reports_missing_inputs() {
    let ws = Workspace::new();
    ws.cmd().arg("validate").assert().success();

    fs::remove_file(ws.root().join("test_cases/X.md")).unwrap();
    ws.cmd()
        .arg("validate")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("✗"));
}
