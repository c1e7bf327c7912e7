//! Integration tests for the agentflow CLI
//!
//! These tests run the actual binary against temporary flow files.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get the binary to test, isolated from any user config
fn agentflow_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("agentflow").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path())
        .env("HOME", home.path())
        .env_remove("AGENTFLOW_MAX_DEPTH")
        .env_remove("AGENTFLOW_PROVIDER")
        .env_remove("AGENTFLOW_MODEL")
        .env("RUST_LOG", "error")
        .env("NO_COLOR", "1");
    cmd
}

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

const GREETING: &str = r#"
code: greet
inputs:
  - name: who
    type: shortText
    required: true
steps:
  type: sequence
  steps:
    - type: step
      agent: writer
      input: "Hello @who"
    - type: step
      agent: editor
      input: "Polish: {{previous_output}}"
"#;

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    agentflow_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run agent flows"));
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_echoes_through_mock() {
    let dir = TempDir::new().unwrap();
    let flow = write(&dir, "greet.yaml", GREETING);

    agentflow_cmd(&dir)
        .args(["run", flow.to_str().unwrap(), "--input", "who=Ada"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Running flow: greet (3 nodes)"))
        .stdout(predicate::str::contains("completed (2 steps"))
        .stdout(predicate::str::contains("Polish: Hello Ada"));
}

#[test]
fn test_run_with_scripted_replies() {
    let dir = TempDir::new().unwrap();
    let flow = write(&dir, "greet.yaml", GREETING);

    agentflow_cmd(&dir)
        .args(["run", flow.to_str().unwrap(), "-i", "who=Ada"])
        .args(["--reply", "draft", "--reply", "final answer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("final answer"));
}

#[test]
fn test_run_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    let flow = write(&dir, "greet.yaml", GREETING);

    agentflow_cmd(&dir)
        .args(["run", flow.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("Required input variable 'who' is missing"));
}

#[test]
fn test_run_writes_trace_and_trace_reads_it() {
    let dir = TempDir::new().unwrap();
    let flow = write(&dir, "greet.yaml", GREETING);
    let trace = dir.path().join("run.ndjson");

    agentflow_cmd(&dir)
        .args(["run", flow.to_str().unwrap(), "-i", "who=Ada"])
        .args(["--trace", trace.to_str().unwrap()])
        .assert()
        .success();

    let contents = fs::read_to_string(&trace).unwrap();
    assert!(contents.lines().count() > 4);
    assert!(contents.lines().next().unwrap().contains("\"flow-start\""));

    agentflow_cmd(&dir)
        .args(["trace", trace.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("flow-start"))
        .stdout(predicate::str::contains("flow-complete"));
}

#[test]
fn test_run_with_subflow() {
    let dir = TempDir::new().unwrap();
    let child = write(
        &dir,
        "shout.yaml",
        r#"
code: shout
inputs:
  - name: text
    type: shortText
steps:
  type: step
  agent: loud
  input: "LOUD {{text}}"
"#,
    );
    let parent = write(
        &dir,
        "parent.yaml",
        r#"
code: parent
steps:
  type: step
  agent: shout
  input: "quiet words"
"#,
    );

    agentflow_cmd(&dir)
        .args(["run", parent.to_str().unwrap()])
        .args(["--subflow", child.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("LOUD quiet words"));
}

// ============================================================================
// validate / convert
// ============================================================================

#[test]
fn test_validate_reports_summary() {
    let dir = TempDir::new().unwrap();
    let flow = write(&dir, "greet.yaml", GREETING);

    agentflow_cmd(&dir)
        .args(["validate", flow.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("Nodes: 3"))
        .stdout(predicate::str::contains("Agents: (default)"));
}

#[test]
fn test_validate_rejects_bad_step_type() {
    let dir = TempDir::new().unwrap();
    let flow = write(
        &dir,
        "bad.yaml",
        r#"
code: bad
steps:
  type: teleport
"#,
    );

    agentflow_cmd(&dir)
        .args(["validate", flow.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_convert_both_directions() {
    let dir = TempDir::new().unwrap();
    let flow = write(&dir, "greet.yaml", GREETING);

    let output = agentflow_cmd(&dir)
        .args(["convert", flow.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let runtime = String::from_utf8(output.stdout).unwrap();
    assert!(runtime.contains("\"sequenceAgent\""));

    let node = write(&dir, "greet.json", &runtime);
    agentflow_cmd(&dir)
        .args(["convert", node.to_str().unwrap(), "--to", "steps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("type: sequence"))
        .stdout(predicate::str::contains("agent: editor"));
}

#[test]
fn test_convert_rejects_unknown_runtime_shape() {
    let dir = TempDir::new().unwrap();
    let node = write(
        &dir,
        "node.json",
        r#"{"id": "l", "agent": "loopAgent", "input": "not nested"}"#,
    );

    agentflow_cmd(&dir)
        .args(["convert", node.to_str().unwrap(), "--to", "steps"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FLOW-005"));
}
