// Binary-level tests: exit codes, JSON output, staging mode
// and the small helper subcommands.
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;

mod util;

fn ctxpack() -> Command {
    let mut cmd = Command::cargo_bin("ctxpack").expect("bin");
    // Keep the user's environment out of the layered config
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn clean_run_exits_zero_and_writes_artifacts() {
    let tmp = util::make_python_fixture();

    ctxpack()
        .current_dir(tmp.path())
        .args(["run", ".", "--quiet", "--no-color"])
        .assert()
        .success();

    tmp.child("transcript/transcription_full_context.txt")
        .assert(predicate::path::exists());
    tmp.child("transcript/transcription_modules.txt")
        .assert(predicate::str::contains("src/app.py"));
    tmp.child("transcript/transcription_errors.txt")
        .assert(predicate::path::missing());
}

#[test]
fn per_file_failures_exit_two() {
    let tmp = assert_fs::TempDir::new().unwrap();
    tmp.child("bad.py")
        .write_str("def broken(:\n    pass\n")
        .unwrap();

    ctxpack()
        .args(["run", "--quiet"])
        .arg(tmp.path())
        .assert()
        .code(2);

    tmp.child("transcript/transcription_errors.txt")
        .assert(predicate::str::contains("bad.py: ParseFailure"));
}

#[test]
fn missing_root_is_fatal() {
    let tmp = assert_fs::TempDir::new().unwrap();

    ctxpack()
        .args(["run", "--quiet", "--no-color"])
        .arg(tmp.path().join("nope"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn second_run_refuses_to_overwrite() {
    let tmp = util::make_python_fixture();

    ctxpack()
        .args(["run", "--quiet"])
        .arg(tmp.path())
        .assert()
        .success();

    ctxpack()
        .args(["run", "--quiet", "--no-color"])
        .arg(tmp.path())
        .assert()
        .code(1);

    ctxpack()
        .args(["run", "--quiet", "--overwrite"])
        .arg(tmp.path())
        .assert()
        .success();
}

#[test]
fn dry_run_json_reports_without_writing() {
    let tmp = util::make_python_fixture();

    let out = ctxpack()
        .args(["--dry-run", "run", "--json", "--ext", "py,md"])
        .arg(tmp.path())
        .output()
        .expect("run");

    assert!(out.status.success());
    tmp.child("transcript").assert(predicate::path::missing());

    let v: Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    assert_eq!(v["dry_run"], Value::Bool(true));
    assert_eq!(v["breakdown"]["modules"], 1);
    assert_eq!(v["breakdown"]["tests"], 1);
    assert_eq!(v["breakdown"]["resources"], 1);
    assert!(v["token_estimate_by_artifact"]["full_context"].as_u64().unwrap() > 0);
    assert!(v["staged"]["transcription_tree.txt"].is_string());
}

#[test]
fn conflicting_options_are_rejected() {
    let tmp = util::make_python_fixture();

    ctxpack()
        .args([
            "run",
            "--no-color",
            "--no-tree",
            "--no-modules",
            "--no-tests",
            "--no-resources",
        ])
        .arg(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("conflicting"));
}

#[test]
fn init_writes_config_once() {
    let tmp = assert_fs::TempDir::new().unwrap();

    ctxpack()
        .args(["init", "--quiet"])
        .arg(tmp.path())
        .assert()
        .success();
    tmp.child("ctxpack.toml")
        .assert(predicate::str::contains("output_prefix"));

    ctxpack()
        .args(["init", "--quiet"])
        .arg(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn completions_print_to_stdout() {
    ctxpack()
        .args(["completions", "bash", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ctxpack"));
}

#[test]
fn tree_only_depth_writes_no_category_files() {
    let tmp = util::make_python_fixture();

    ctxpack()
        .args(["run", "--quiet", "--depth", "tree-only"])
        .arg(tmp.path())
        .assert()
        .success();

    tmp.child("transcript/transcription_tree.txt")
        .assert(predicate::str::contains("class Foo"));
    tmp.child("transcript/transcription_modules.txt")
        .assert(predicate::path::missing());
}
