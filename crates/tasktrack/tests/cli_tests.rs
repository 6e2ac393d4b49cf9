use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use git2::{IndexAddOption, Repository, Signature};
use tempfile::TempDir;

fn tasktrack(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tasktrack"))
        .arg("--working-dir")
        .arg(dir)
        .args(["--log-level", "off", "--log-format", "compact"])
        .args(args)
        .output()
        .expect("failed to run tasktrack")
}

/// Run with the user data directory redirected into `data_home`
fn tasktrack_with_data_home(dir: &Path, data_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tasktrack"))
        .env("XDG_DATA_HOME", data_home)
        .arg("--working-dir")
        .arg(dir)
        .args(["--log-level", "off", "--log-format", "compact"])
        .args(args)
        .output()
        .expect("failed to run tasktrack")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "tasktrack failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn repo_with_commit() -> TempDir {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();

    let mut index = repo.index().unwrap();
    index.add_all(["*"], IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();

    dir
}

#[test]
fn test_status_json_for_plain_directory() {
    let dir = TempDir::new().unwrap();

    let json = stdout_json(&tasktrack(dir.path(), &["status", "--json"]));

    assert_eq!(json["is_repo"], false);
    assert_eq!(json["dirty_files"], serde_json::json!([]));
    assert_eq!(json["untracked_files"], serde_json::json!([]));
    assert!(json.get("head_commit").is_none());
}

#[test]
fn test_fingerprint_is_stable_across_runs() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("file.txt"), "content\n").unwrap();

    let first = stdout_json(&tasktrack(dir.path(), &["fingerprint", "--json"]));
    let second = stdout_json(&tasktrack(dir.path(), &["fingerprint", "--json"]));

    assert_eq!(first, second);
    assert_eq!(first["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn test_baseline_then_diff_against_baseline() {
    let dir = repo_with_commit();
    let snapshots = TempDir::new().unwrap();
    let snapshot = snapshots.path().to_str().unwrap();

    let record = stdout_json(&tasktrack(
        dir.path(),
        &["baseline", "--snapshot-dir", snapshot, "--json"],
    ));
    assert!(record["head_commit"].is_string());

    fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n").unwrap();

    let diff = stdout_json(&tasktrack(
        dir.path(),
        &["diff", "--baseline", "--snapshot-dir", snapshot, "--no-patch", "--json"],
    ));
    assert_eq!(diff["files"][0]["path"], "a.txt");
    assert_eq!(diff["files"][0]["status"], "modified");
    assert_eq!(diff["files"][0]["additions"], 1);
    assert!(diff.get("patch").is_none());
}

#[cfg(target_os = "linux")]
#[test]
fn test_default_baseline_location_leaves_tracked_tree_untouched() {
    let dir = repo_with_commit();
    let data_home = TempDir::new().unwrap();
    let run = |args: &[&str]| stdout_json(&tasktrack_with_data_home(dir.path(), data_home.path(), args));

    let before = run(&["fingerprint", "--json"]);
    run(&["baseline", "--json"]);

    let status = run(&["status", "--json"]);
    assert_eq!(status["untracked_files"], serde_json::json!([]));
    assert_eq!(before, run(&["fingerprint", "--json"]));

    let diff = run(&["diff", "--baseline", "--include-untracked", "--json"]);
    assert_eq!(diff["files"], serde_json::json!([]));

    let snapshots = data_home.path().join("tasktrack").join("snapshots");
    let stored: Vec<_> = fs::read_dir(&snapshots).unwrap().collect();
    assert_eq!(stored.len(), 1);
    let snapshot = stored[0].as_ref().unwrap().path();
    assert!(snapshot.join("baseline.json").is_file());
}

#[test]
fn test_diff_on_clean_repository_prints_null() {
    let dir = repo_with_commit();

    let json = stdout_json(&tasktrack(dir.path(), &["diff", "--json"]));

    assert!(json.is_null());
}

#[test]
fn test_malformed_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tasktrack.toml"), "command_timeout = 12\n").unwrap();

    let output = tasktrack(dir.path(), &["status"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("tasktrack.toml"));
}
