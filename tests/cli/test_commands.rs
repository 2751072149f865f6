use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn agentpilot(workspace: &Path) -> Command {
    let mut cmd = Command::cargo_bin("agentpilot").unwrap();
    cmd.env("AGENTPILOT_BATCH", "1")
        .env_remove("RUST_LOG")
        .arg("--workspace")
        .arg(workspace);
    cmd
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn help_lists_every_command() {
    let dir = TempDir::new().unwrap();
    agentpilot(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("WORKFLOW COMMANDS")
                .and(predicate::str::contains("compile"))
                .and(predicate::str::contains("canonicalize"))
                .and(predicate::str::contains("validate"))
                .and(predicate::str::contains("normalize"))
                .and(predicate::str::contains("summarize")),
        );
}

#[test]
fn compile_prints_the_result() {
    let dir = TempDir::new().unwrap();
    let ir = write_json(
        dir.path(),
        "ir.json",
        &json!({
            "data_sources": [{"id": "sales", "type": "tabular", "source": "google-sheets", "location": "Sales"}],
            "delivery": [{"method": "email", "config": {"recipient": "team@acme.test"}}]
        }),
    );

    let output = agentpilot(dir.path()).arg("compile").arg(&ir).output().unwrap();

    assert!(output.status.success());
    let result = stdout_json(&output);
    assert_eq!(result["success"], true);
    assert_eq!(result["metadata"]["rule_used"], "simple");
    assert_eq!(result["workflow"]["workflow_steps"][1]["action"], "send_email");
}

#[test]
fn compile_failure_exits_non_zero_with_envelope() {
    let dir = TempDir::new().unwrap();
    let ir = dir.path().join("ir.yaml");
    std::fs::write(&ir, "goal: nothing to do\n").unwrap();

    let output = agentpilot(dir.path())
        .args(["compile", "--envelope"])
        .arg(&ir)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let envelope = stdout_json(&output);
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["workflow"]["workflow_steps"], json!([]));
    assert!(String::from_utf8_lossy(&output.stderr).contains("CLI-COMPILE-001"));
}

#[test]
fn validate_reports_errors_and_fails() {
    let dir = TempDir::new().unwrap();
    let workflow = write_json(
        dir.path(),
        "workflow.json",
        &json!([
            {"id": "step1", "type": "transform", "dependencies": ["step2"]},
            {"id": "step2", "type": "transform"}
        ]),
    );

    agentpilot(dir.path())
        .arg("validate")
        .arg(&workflow)
        .assert()
        .failure()
        .stdout(predicate::str::contains("WFG-PRE-003"))
        .stderr(predicate::str::contains("CLI-VAL-001"));

    agentpilot(dir.path())
        .args(["validate", "--canonicalize"])
        .arg(&workflow)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"));
}

#[test]
fn canonicalize_prints_workflow_and_report() {
    let dir = TempDir::new().unwrap();
    let workflow = write_json(
        dir.path(),
        "workflow.json",
        &json!({"steps": [
            {"id": "load", "type": "action", "plugin": "http", "action": "get"},
            {"id": "ship", "type": "action", "plugin": "http", "action": "post", "dependencies": ["load"]}
        ]}),
    );

    let output = agentpilot(dir.path()).arg("canonicalize").arg(&workflow).output().unwrap();

    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["workflow"]["workflow_steps"][1]["id"], "step2");
    assert_eq!(value["workflow"]["workflow_steps"][1]["dependencies"], json!(["step1"]));
    assert_eq!(value["report"]["ids_renumbered"], 2);
}

#[test]
fn normalize_and_summarize() {
    let dir = TempDir::new().unwrap();
    let payload = write_json(
        dir.path(),
        "payload.json",
        &json!({"amount": 2500, "currency": "jpy", "object": "charge", "created": 1704067200}),
    );

    let output = agentpilot(dir.path())
        .args(["normalize", "--plugin", "stripe"])
        .arg(&payload)
        .output()
        .unwrap();
    assert!(output.status.success());
    let record = stdout_json(&output);
    assert_eq!(record["amount"], 2500.0);
    assert_eq!(record["currency"], "JPY");
    assert_eq!(record["_source"]["plugin"], "stripe");

    let trace = write_json(
        dir.path(),
        "trace.json",
        &json!([{"stepId": "step1", "action": "append_rows", "status": "completed", "output": {"appended_rows": 3}}]),
    );
    let output = agentpilot(dir.path()).arg("summarize").arg(&trace).output().unwrap();
    assert!(output.status.success());
    let summary = stdout_json(&output);
    assert_eq!(summary["steps"][0]["message"], "Added 3 rows");
    assert_eq!(summary["summary"]["totalItems"], 3);
}

#[test]
fn missing_input_file_is_reported() {
    let dir = TempDir::new().unwrap();
    agentpilot(dir.path())
        .args(["summarize", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DOC-READ-001"));
}
