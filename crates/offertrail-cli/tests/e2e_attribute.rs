//! E2E tests for `ot attribute` and `ot completions`.
//!
//! Covers: JSONL output shape and row order, summary in JSON mode, stdout
//! streaming, config discovery, and failure paths that must leave no output.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test harness helpers
// ---------------------------------------------------------------------------

const PORTFOLIO: &str = r#"{"reward":10,"channels":["email","mobile","social"],"difficulty":10,"duration":7,"offer_type":"bogo","id":"bogo-7"}
{"reward":2,"channels":["web","email"],"difficulty":10,"duration":3,"offer_type":"discount","id":"disc-3"}
"#;

const PROFILES: &str = r#"{"gender":"F","age":55,"id":"alice","became_member_on":20170715,"income":112000.0}
{"gender":"M","age":75,"id":"bob","became_member_on":20180509,"income":100000.0}
{"gender":null,"age":118,"id":"ghost","became_member_on":20170804,"income":null}
"#;

const TRANSCRIPT: &str = r#"{"person":"bob","event":"offer received","value":{"offer id":"disc-3"},"time":0}
{"person":"alice","event":"offer received","value":{"offer id":"bogo-7"},"time":0}
{"person":"ghost","event":"offer received","value":{"offer id":"disc-3"},"time":0}
{"person":"alice","event":"offer viewed","value":{"offer id":"bogo-7"},"time":6}
{"person":"alice","event":"offer completed","value":{"offer_id":"bogo-7","reward":10},"time":132}
{"person":"bob","event":"offer received","value":{"offer id":"disc-3"},"time":336}
{"person":"bob","event":"transaction","value":{"amount":4.5},"time":340}
"#;

fn ot_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ot"));
    cmd.current_dir(dir);
    cmd.env("OFFERTRAIL_LOG", "error");
    cmd.env("HOME", dir);
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd.env_remove("FORMAT");
    cmd.env_remove("OFFERTRAIL_TIMING");
    cmd
}

fn write_inputs(dir: &Path, transcript: &str) {
    fs::write(dir.join("portfolio.jsonl"), PORTFOLIO).expect("write portfolio");
    fs::write(dir.join("profile.jsonl"), PROFILES).expect("write profiles");
    fs::write(dir.join("transcript.jsonl"), transcript).expect("write transcript");
}

fn attribute_args(output: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = [
        "attribute",
        "--transcript",
        "transcript.jsonl",
        "--portfolio",
        "portfolio.jsonl",
        "--profile",
        "profile.jsonl",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    if let Some(path) = output {
        args.push("--output".into());
        args.push(path.into());
    }
    args
}

fn read_rows(path: &PathBuf) -> Vec<Value> {
    fs::read_to_string(path)
        .expect("read output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("row is JSON"))
        .collect()
}

// ---------------------------------------------------------------------------
// ot attribute
// ---------------------------------------------------------------------------

#[test]
fn attribute_writes_one_row_per_receipt() {
    let dir = TempDir::new().expect("tempdir");
    write_inputs(dir.path(), TRANSCRIPT);

    ot_cmd(dir.path())
        .args(attribute_args(Some("instances.jsonl")))
        .arg("--json")
        .assert()
        .success();

    let rows = read_rows(&dir.path().join("instances.jsonl"));
    let keys: Vec<(&str, &str, u64)> = rows
        .iter()
        .map(|r| {
            (
                r["user_id"].as_str().expect("user_id"),
                r["offer_id"].as_str().expect("offer_id"),
                r["time_received"].as_u64().expect("time_received"),
            )
        })
        .collect();
    // ghost has no demographics and is filtered out.
    assert_eq!(
        keys,
        [("alice", "bogo-7", 0), ("bob", "disc-3", 0), ("bob", "disc-3", 336)]
    );

    let alice = &rows[0];
    assert_eq!(alice["viewed"], true);
    assert_eq!(alice["completed"], true);
    assert_eq!(alice["viewed_before"], true);
    assert_eq!(alice["offer_duration"], 168);
    assert_eq!(alice["gender"], "Female");
    assert_eq!(alice["member_months"], 13);

    let bob_second = &rows[2];
    assert_eq!(bob_second["offer_count"], 2);
    assert_eq!(bob_second["time_points"], "0.336");
    assert_eq!(bob_second["viewed_before"], Value::Null);
    assert_eq!(bob_second["time_viewed"], Value::Null);
}

#[test]
fn attribute_json_summary_on_stdout() {
    let dir = TempDir::new().expect("tempdir");
    write_inputs(dir.path(), TRANSCRIPT);

    let output = ot_cmd(dir.path())
        .args(attribute_args(Some("instances.jsonl")))
        .arg("--json")
        .output()
        .expect("attribute should not crash");
    assert!(
        output.status.success(),
        "attribute failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: Value = serde_json::from_slice(&output.stdout).expect("summary is JSON");
    assert_eq!(summary["instances"], 3);
    assert_eq!(summary["users"], 2);
    assert_eq!(summary["completed"], 1);
    assert_eq!(summary["repeat_receipts"], 2);
    assert_eq!(summary["output"], "instances.jsonl");
}

#[test]
fn attribute_streams_rows_to_stdout_without_output_path() {
    let dir = TempDir::new().expect("tempdir");
    write_inputs(dir.path(), TRANSCRIPT);

    let output = ot_cmd(dir.path())
        .args(attribute_args(None))
        .arg("--quiet")
        .output()
        .expect("attribute should not crash");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let rows: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("row is JSON"))
        .collect();
    assert_eq!(rows.len(), 3);
    assert!(output.stderr.is_empty());
}

#[test]
fn sequential_and_parallel_outputs_are_identical() {
    let dir = TempDir::new().expect("tempdir");
    write_inputs(dir.path(), TRANSCRIPT);

    ot_cmd(dir.path())
        .args(attribute_args(Some("par.jsonl")))
        .arg("-q")
        .assert()
        .success();
    ot_cmd(dir.path())
        .args(attribute_args(Some("seq.jsonl")))
        .args(["-q", "--sequential"])
        .assert()
        .success();

    let par = fs::read(dir.path().join("par.jsonl")).expect("read par");
    let seq = fs::read(dir.path().join("seq.jsonl")).expect("read seq");
    assert_eq!(par, seq);
}

#[test]
fn config_file_in_working_directory_is_honored() {
    let dir = TempDir::new().expect("tempdir");
    write_inputs(dir.path(), TRANSCRIPT);
    fs::write(
        dir.path().join("offertrail.toml"),
        "[enrich]\nrequire_demographics = false\n\n[attribution]\nparallel = false\n",
    )
    .expect("write config");

    ot_cmd(dir.path())
        .args(attribute_args(Some("instances.jsonl")))
        .arg("-q")
        .assert()
        .success();

    let rows = read_rows(&dir.path().join("instances.jsonl"));
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().any(|r| r["user_id"] == "ghost"));
}

#[test]
fn configured_worker_threads_produce_the_default_table() {
    let default_dir = TempDir::new().expect("tempdir");
    write_inputs(default_dir.path(), TRANSCRIPT);
    ot_cmd(default_dir.path())
        .args(attribute_args(Some("instances.jsonl")))
        .arg("-q")
        .assert()
        .success();

    let pinned_dir = TempDir::new().expect("tempdir");
    write_inputs(pinned_dir.path(), TRANSCRIPT);
    fs::write(
        pinned_dir.path().join("offertrail.toml"),
        "[attribution]\nthreads = 1\n",
    )
    .expect("write config");
    ot_cmd(pinned_dir.path())
        .args(attribute_args(Some("instances.jsonl")))
        .arg("-q")
        .assert()
        .success();

    let default_rows = fs::read(default_dir.path().join("instances.jsonl")).expect("read default");
    let pinned_rows = fs::read(pinned_dir.path().join("instances.jsonl")).expect("read pinned");
    assert!(!pinned_rows.is_empty());
    assert_eq!(default_rows, pinned_rows);
}

#[test]
fn invalid_config_fails_with_code() {
    let dir = TempDir::new().expect("tempdir");
    write_inputs(dir.path(), TRANSCRIPT);
    fs::write(dir.path().join("offertrail.toml"), "[attribution\nparallel = ").expect("write");

    ot_cmd(dir.path())
        .args(attribute_args(Some("instances.jsonl")))
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
    assert!(!dir.path().join("instances.jsonl").exists());
}

#[test]
fn unknown_offer_aborts_without_output() {
    let dir = TempDir::new().expect("tempdir");
    let transcript = format!(
        "{TRANSCRIPT}{}\n",
        r#"{"person":"alice","event":"offer received","value":{"offer id":"retired-9"},"time":500}"#
    );
    write_inputs(dir.path(), &transcript);

    ot_cmd(dir.path())
        .args(attribute_args(Some("instances.jsonl")))
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3001"))
        .stderr(predicate::str::contains("retired-9"));

    assert!(!dir.path().join("instances.jsonl").exists());
    assert!(!dir.path().join("instances.jsonl.tmp").exists());
}

#[test]
fn malformed_transcript_line_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let transcript = format!("{TRANSCRIPT}not json\n");
    write_inputs(dir.path(), &transcript);

    ot_cmd(dir.path())
        .args(attribute_args(Some("instances.jsonl")))
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2002"))
        .stderr(predicate::str::contains("line 8"));
    assert!(!dir.path().join("instances.jsonl").exists());
}

#[test]
fn missing_input_file_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    write_inputs(dir.path(), TRANSCRIPT);

    ot_cmd(dir.path())
        .args([
            "attribute",
            "--transcript",
            "nope.jsonl",
            "--portfolio",
            "portfolio.jsonl",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"))
        .stderr(predicate::str::contains("nope.jsonl"));
}

#[test]
fn timing_flag_reports_attribution_stages() {
    let dir = TempDir::new().expect("tempdir");
    write_inputs(dir.path(), TRANSCRIPT);

    ot_cmd(dir.path())
        .args(attribute_args(Some("instances.jsonl")))
        .args(["-q", "--timing", "--sequential"])
        .assert()
        .success()
        .stderr(predicate::str::contains("timing report"))
        .stderr(predicate::str::contains("attribute.users"));
}

// ---------------------------------------------------------------------------
// ot completions
// ---------------------------------------------------------------------------

#[test]
fn completions_emit_script_for_ot() {
    let dir = TempDir::new().expect("tempdir");
    ot_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("attribute"));
}
