//! CLI Integration Tests
//!
//! Spawn the built tool-runner binary against throwaway repositories.

use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use wait_timeout::ChildExt;

/// Run tool-runner with `args`, failing the test if it hangs
fn run_cli(args: &[&str]) -> Output {
    run_cli_in(&std::env::temp_dir(), args)
}

fn run_cli_in(cwd: &Path, args: &[&str]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tool-runner"))
        .args(args)
        .current_dir(cwd)
        .env_remove("TOOL_RUNNER_ROOT")
        .env_remove("TOOL_RUNNER_WORKERS")
        .env_remove("TOOL_RUNNER_FORMAT")
        .env_remove("TOOL_RUNNER_JUNIT_XML")
        .env_remove("CLOUDRAIL_API_KEY")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute tool-runner");

    match child.wait_timeout(Duration::from_secs(30)).unwrap() {
        Some(_) => child.wait_with_output().unwrap(),
        None => {
            child.kill().unwrap();
            panic!("tool-runner {:?} timed out", args);
        }
    }
}

fn add_case(root: &Path, rel: &str) {
    let dir = root.join("test-cases").join(rel);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("main.tf"), "").unwrap();
}

/// tool-runner.toml swapping the provisioner for sh scripts
fn write_sh_config(root: &Path) {
    let config = r#"
workers = 4

[provisioner]
program = "sh"
init_args = ["-c", "mkdir -p .terraform"]
plan_args = ["-c", "echo plan > plan.out"]
"#;
    fs::write(root.join("tool-runner.toml"), config).unwrap();
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_tools_lists_cloudrail() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_str().unwrap();

    let output = run_cli(&["--root", root, "tools"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("cloudrail\tCloudrail"));
}

#[test]
fn test_cases_lists_state() {
    let temp = TempDir::new().unwrap();
    add_case(temp.path(), "aws/s3/public/case_1");
    let root = temp.path().to_str().unwrap();

    let output = run_cli(&["--root", root, "cases"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "uninitialized\taws/s3/public/case_1");
}

#[test]
fn test_cases_listing_ignores_working_directory() {
    let repo = TempDir::new().unwrap();
    add_case(repo.path(), "aws/ec2/imdsv2/case_1");
    let root = repo.path().to_str().unwrap();

    // A decoy tree under the working directory must not be picked up
    let elsewhere = TempDir::new().unwrap();
    add_case(elsewhere.path(), "gcp/gke/private/case_9");

    let from_elsewhere = run_cli_in(elsewhere.path(), &["--root", root, "cases"]);
    let from_repo = run_cli_in(repo.path(), &["--root", root, "cases"]);

    assert!(from_elsewhere.status.success(), "stderr: {}", stderr(&from_elsewhere));
    assert_eq!(
        stdout(&from_elsewhere).trim(),
        "uninitialized\taws/ec2/imdsv2/case_1"
    );
    assert_eq!(stdout(&from_elsewhere), stdout(&from_repo));
}

#[test]
fn test_init_then_cases_shows_initialized() {
    let temp = TempDir::new().unwrap();
    add_case(temp.path(), "aws/s3/public/case_1");
    add_case(temp.path(), "aws/s3/public/case_2");
    write_sh_config(temp.path());
    let root = temp.path().to_str().unwrap();

    let output = run_cli(&["--root", root, "--no-preflight", "init"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = run_cli(&["--root", root, "cases"]);
    let listing = stdout(&output);
    assert_eq!(listing.lines().count(), 2);
    assert!(listing.lines().all(|l| l.starts_with("initialized\t")));
}

#[test]
fn test_default_command_is_init() {
    let temp = TempDir::new().unwrap();
    add_case(temp.path(), "a/b/c/d");
    write_sh_config(temp.path());
    let root = temp.path().to_str().unwrap();

    let output = run_cli(&["--root", root, "--no-preflight"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(temp.path().join("test-cases/a/b/c/d/plan.out").is_file());
}

#[test]
fn test_unknown_tool_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_str().unwrap();

    let output = run_cli(&["--root", root, "--no-preflight", "run", "nonexistent"]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("nonexistent was not found"), "stderr: {}", err);
    assert!(err.contains("cloudrail"), "stderr: {}", err);
}

#[test]
fn test_missing_api_key_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_str().unwrap();

    let output = run_cli(&["--root", root, "--no-preflight", "run", "cloudrail"]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("CLOUDRAIL_API_KEY environment variable is required"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn test_missing_api_key_still_writes_junit() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_str().unwrap();
    let xml = temp.path().join("junit.xml");

    let output = run_cli(&[
        "--root",
        root,
        "--no-preflight",
        "--junit-xml",
        xml.to_str().unwrap(),
        "run",
        "cloudrail",
    ]);
    assert!(!output.status.success());
    let report = fs::read_to_string(&xml).expect("JUnit report should be written");
    assert!(report.contains("errors=\"1\""), "report: {}", report);
    assert!(report.contains("CLOUDRAIL_API_KEY"), "report: {}", report);
}

#[test]
fn test_malformed_config_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("tool-runner.toml"), "workers = [").unwrap();
    let root = temp.path().to_str().unwrap();

    let output = run_cli(&["--root", root, "cases"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("tool-runner.toml"));
}

#[test]
fn test_preflight_failure_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    let config = r#"
[provisioner]
program = "definitely-not-a-real-binary-4821"
"#;
    fs::write(temp.path().join("tool-runner.toml"), config).unwrap();
    let root = temp.path().to_str().unwrap();

    let output = run_cli(&["--root", root, "init"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("installed?"), "stderr: {}", stderr(&output));
}
