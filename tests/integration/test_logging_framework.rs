use assert_cmd::Command;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn write_workflow(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("workflow.json");
    let steps = json!([{"id": "fetch", "type": "action", "plugin": "http", "action": "get"}]);
    std::fs::write(&path, steps.to_string()).unwrap();
    path
}

fn agentpilot(workspace: &Path) -> Command {
    let mut cmd = Command::cargo_bin("agentpilot").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("AGENTPILOT_LOG_DIR")
        .env_remove("AGENTPILOT_LOG_LEVEL")
        .arg("--workspace")
        .arg(workspace);
    cmd
}

#[test]
fn log_file_is_written_under_the_workspace() {
    let workspace = TempDir::new().unwrap();
    let workflow = write_workflow(workspace.path());

    agentpilot(workspace.path())
        .env("AGENTPILOT_BATCH", "1")
        .arg("canonicalize")
        .arg(&workflow)
        .assert()
        .success();

    let log_file = workspace.path().join(".agentpilot/logs/agentpilot.log");
    assert!(log_file.exists(), "missing {}", log_file.display());
    let contents = std::fs::read_to_string(&log_file).unwrap();
    assert!(contents.contains("canonicalized workflow"));
}

#[test]
fn batch_mode_keeps_the_console_quiet() {
    let workspace = TempDir::new().unwrap();
    let workflow = write_workflow(workspace.path());

    let output = agentpilot(workspace.path())
        .env("AGENTPILOT_BATCH", "1")
        .arg("canonicalize")
        .arg(&workflow)
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(output.stderr.is_empty(), "{}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn interactive_mode_logs_to_stderr() {
    let workspace = TempDir::new().unwrap();
    let workflow = write_workflow(workspace.path());

    let output = agentpilot(workspace.path())
        .env("AGENTPILOT_BATCH", "0")
        .arg("canonicalize")
        .arg(&workflow)
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("canonicalized workflow"));
    let stdout: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stdout["workflow"]["workflow_steps"][0]["id"], "step1");
}

#[test]
fn configured_log_level_filters_file_output() {
    let workspace = TempDir::new().unwrap();
    let workflow = write_workflow(workspace.path());
    let config_dir = workspace.path().join(".agentpilot/config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("logging.toml"), "[logging]\ndefault_level = \"warn\"\n").unwrap();

    agentpilot(workspace.path())
        .env("AGENTPILOT_BATCH", "1")
        .arg("canonicalize")
        .arg(&workflow)
        .assert()
        .success();

    let contents =
        std::fs::read_to_string(workspace.path().join(".agentpilot/logs/agentpilot.log")).unwrap();
    assert!(!contents.contains("canonicalized workflow"));
}
