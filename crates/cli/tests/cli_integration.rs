//! CLI integration tests for all subcommands.
//!
//! Uses `assert_cmd` to spawn the `signoff` binary and verify exit codes,
//! stdout content, and stderr content. Tests run from the workspace root so
//! the scenarios under `demos/` resolve.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

fn signoff() -> Command {
    let mut cmd = cargo_bin_cmd!("signoff");
    cmd.current_dir(workspace_root());
    cmd.env("SIGNOFF_LOG", "off");
    cmd
}

// ──────────────────────────────────────────────
// 1. Help
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    signoff()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sequential sign-off workflow engine"));
}

#[test]
fn unknown_subcommand_fails() {
    signoff().arg("approve-everything").assert().failure();
}

// ──────────────────────────────────────────────
// 2. run
// ──────────────────────────────────────────────

#[test]
fn run_handover_scenario_text() {
    signoff()
        .args(["run", "demos/handover.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "step  2  sign_initiator by E2: error wrong_role",
        ))
        .stdout(predicate::str::contains(": TAKEN_OVER (In handover)"))
        .stdout(predicate::str::contains("task 1 [IN_PROGRESS] Return badge"))
        .stdout(predicate::str::contains(
            "history verified: 6 entries, 1 task update(s)",
        ));
}

#[test]
fn run_handover_scenario_json() {
    let output = signoff()
        .args(["--output", "json", "run", "demos/handover.json"])
        .output()
        .expect("run signoff");
    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(report["snapshot"]["state"], "TAKEN_OVER");
    assert_eq!(report["audit_log"].as_array().unwrap().len(), 6);
    assert_eq!(report["steps"][1]["outcome"], "wrong_role");
    assert_eq!(report["audit_log"][0]["override"], false);
    assert!(report.get("failure").is_none());
}

#[test]
fn run_override_scenario_with_config() {
    signoff()
        .args([
            "run",
            "demos/override.json",
            "--config",
            "demos/signoff.toml",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("(override)"))
        .stdout(predicate::str::contains(": CREATED (Draft)"));
}

#[test]
fn run_override_scenario_without_administrators_fails_expectation() {
    signoff()
        .args(["run", "demos/override.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "step 2 (remove task 2 by hr-admin): expected ok, got wrong_role",
        ));
}

#[test]
fn run_missing_scenario_reports_error() {
    signoff()
        .args(["run", "demos/does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn run_error_in_json_mode_is_json() {
    signoff()
        .args(["--output", "json", "run", "demos/does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("{\"error\":"));
}

#[test]
fn run_quiet_prints_only_final_state() {
    signoff()
        .args(["--quiet", "run", "demos/handover.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TAKEN_OVER"))
        .stdout(predicate::str::contains("step").not());
}

#[test]
fn run_wait_makes_instance_overdue() {
    let dir = TempDir::new().unwrap();
    let scenario = dir.path().join("idle.json");
    fs::write(
        &scenario,
        r#"{
            "parties": { "initiator_id": "E1", "counterparty_id": "E2", "supervisor_id": "M1" },
            "start": "2025-03-03T09:00:00Z",
            "steps": [
                { "op": "action", "actor": "E1", "action": "sign_initiator", "expect": "ok" },
                { "op": "wait", "days": 20 }
            ]
        }"#,
    )
    .unwrap();
    signoff()
        .arg("run")
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "next: overdue: no action since 20 days; waiting on counterparty signature",
        ));
}

fn write_scenario(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("scenario.json");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn run_rejects_oversized_wait() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(
        &dir,
        r#"{
            "parties": { "initiator_id": "E1", "counterparty_id": "E2", "supervisor_id": "M1" },
            "steps": [ { "op": "wait", "days": 10000000 } ]
        }"#,
    );
    signoff()
        .arg("run")
        .arg(&scenario)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot wait more than 36500 days"));
}

#[test]
fn run_reports_clock_overflow_instead_of_panicking() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(
        &dir,
        r#"{
            "parties": { "initiator_id": "E1", "counterparty_id": "E2", "supervisor_id": "M1" },
            "start": "9999-12-01T00:00:00Z",
            "steps": [ { "op": "wait", "days": 100 } ]
        }"#,
    );
    signoff()
        .arg("run")
        .arg(&scenario)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("step 1 (wait 100 day(s)): cannot move clock"));
}

// ──────────────────────────────────────────────
// 3. check-config
// ──────────────────────────────────────────────

#[test]
fn check_config_accepts_demo() {
    signoff()
        .args(["check-config", "demos/signoff.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"))
        .stdout(predicate::str::contains("1 administrator(s)"));
}

#[test]
fn check_config_rejects_zero_threshold() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[engine]\noverdue_after_days = 0\n").unwrap();
    signoff()
        .arg("check-config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("overdue_after_days must be at least 1"));
}

#[test]
fn check_config_json_echoes_config() {
    let output = signoff()
        .args(["--output", "json", "check-config", "demos/signoff.toml"])
        .output()
        .expect("run signoff");
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["valid"], true);
    assert_eq!(doc["config"]["directory"]["administrators"][0], "hr-admin");
}

// ──────────────────────────────────────────────
// 4. table
// ──────────────────────────────────────────────

#[test]
fn table_lists_transitions() {
    signoff()
        .arg("table")
        .assert()
        .success()
        .stdout(predicate::str::contains("sign_initiator"))
        .stdout(predicate::str::contains("initiator|counterparty"))
        .stdout(predicate::str::contains("reopen"));
}

#[test]
fn table_json_marks_terminal_states() {
    let output = signoff()
        .args(["--output", "json", "table"])
        .output()
        .expect("run signoff");
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        doc["terminal"],
        serde_json::json!(["TAKEN_BACK", "REJECTED"])
    );
    assert_eq!(doc["actions"].as_array().unwrap().len(), 9);
}
