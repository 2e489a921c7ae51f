use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[[regions]]
barrel_ec = 0
layer = 1
tot_threshold = 3
fei3_latency = 255
analog_threshold = 3500
in_time_threshold = 5000

[[modules]]
hash = 0
barrel_ec = 0
layer = 1
technology = "fei3"
circuits = 1

[[modules]]
hash = 1
barrel_ec = 0
layer = 1
technology = "fei3"
circuits = 1
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn pixcal_json(dir: &tempfile::TempDir, records: Option<&Path>, args: &[&str]) -> Command {
    let cfg = write_valid_config(dir);
    let mut cmd = Command::cargo_bin("pixcal").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg);
    if let Some(path) = records {
        cmd.arg("--records").arg(path);
    }
    cmd.args(args);
    cmd
}

fn json_line(bytes: &[u8], key: &str) -> serde_json::Value {
    let text = String::from_utf8_lossy(bytes);
    let line = text
        .lines()
        .find(|l| l.contains(&format!("\"{key}\"")))
        .unwrap_or("");
    assert!(!line.is_empty(), "no JSON line with {key} found; output was: {text}");
    serde_json::from_str(line).expect("valid JSON")
}

/// Ingestion summary: counts are numbers, failures an array.
#[rstest]
fn json_ingest_schema() {
    let dir = tempdir().unwrap();
    let records = dir.path().join("records.json");
    fs::write(
        &records,
        r#"{"records": [{"module": 0, "data_array": [[1, 2, 3]]}, {"module": 7, "data": "h"}]}"#,
    )
    .unwrap();

    let mut cmd = pixcal_json(&dir, Some(records.as_path()), &["ingest"]);

    let out = cmd.assert().success().get_output().stdout.clone();
    let v = json_line(&out, "populated");

    for key in ["modules", "populated", "defaulted", "skipped_channels", "overridden"] {
        assert!(v.get(key).and_then(|x| x.as_u64()).is_some(), "{key} should be a count");
    }
    assert_eq!(v["modules"], 2);
    assert_eq!(v["skipped_channels"], 1);
    let failed = v["failed"].as_array().expect("failed array");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["module"], 0);
    assert!(failed[0]["error"].as_str().is_some_and(|s| !s.is_empty()));
}

/// Query result: numeric value plus identifying fields.
#[rstest]
fn json_query_schema() {
    let dir = tempdir().unwrap();
    let mut cmd = pixcal_json(&dir, None, &["tot", "--module", "1", "--diode", "long", "--charge", "10000"]);

    let out = cmd.assert().success().get_output().stdout.clone();
    let v = json_line(&out, "tot");

    assert!(v["tot"].as_f64().is_some_and(|t| (t - 12.5556).abs() < 1e-3));
    assert_eq!(v["module"], 1);
    assert_eq!(v["front_end"], 0);
    assert_eq!(v["diode"], "long");
    assert_eq!(v["strategy"], "RUN1PIX");
}

/// Errors in JSON mode: a reason name and a message on stderr.
#[rstest]
fn json_error_schema() {
    let dir = tempdir().unwrap();
    let mut cmd = pixcal_json(&dir, None, &["charge", "--module", "5", "--tot", "3"]);

    let out = cmd.assert().code(5).get_output().stderr.clone();
    let v = json_line(&out, "reason");

    assert_eq!(v["reason"], "QueryOutOfRange");
    assert!(v["message"].as_str().is_some_and(|m| m.contains("Module 5")));
    assert!(v["details"]["error"].as_str().is_some());
}
