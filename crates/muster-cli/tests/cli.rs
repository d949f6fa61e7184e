// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the muster binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn muster() -> Command {
    Command::cargo_bin("muster").expect("binary builds")
}

#[test]
fn no_args_shows_help() {
    muster()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
    muster()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("muster"));
}

#[test]
fn plugins_lists_builtins() {
    muster()
        .args(["plugins", "--quiet"])
        .env("MUSTER_OFFLINE", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("command"))
        .stdout(predicate::str::contains("sarif-file"))
        .stdout(predicate::str::contains("json-file"));
}

#[test]
fn plugins_kind_filter() {
    muster()
        .args(["plugins", "--kind", "reporter"])
        .env("MUSTER_OFFLINE", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("json-file"))
        .stdout(predicate::str::contains("command").not());
}

#[test]
fn scan_empty_tree_produces_report() {
    let tmp = tempfile::tempdir().unwrap();

    muster()
        .args(["scan", "--source"])
        .arg(tmp.path())
        .args(["--offline", "--quiet"])
        .assert()
        .success();

    assert!(tmp.path().join(".muster/reports/report.sarif.json").is_file());
}

#[test]
fn scan_json_output_is_parseable() {
    let tmp = tempfile::tempdir().unwrap();

    let output = muster()
        .args(["scan", "--source"])
        .arg(tmp.path())
        .args(["--offline", "-o", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(parsed["version"], "2.1.0");
}

#[test]
fn tools_status_reports_path_binary() {
    muster()
        .args(["tools", "status", "sh"])
        .env("MUSTER_OFFLINE", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("pre-installed:  true"));
}

#[test]
fn completion_generate_bash() {
    muster()
        .args(["completion", "generate", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("muster"));
}

#[test]
fn unknown_scanner_filter_still_succeeds() {
    let tmp = tempfile::tempdir().unwrap();

    muster()
        .args(["scan", "--source"])
        .arg(tmp.path())
        .args(["--offline", "--quiet", "--scanners", "does-not-exist"])
        .assert()
        .success();
}
