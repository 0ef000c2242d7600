//! Integration tests for the initialization scheduler
//!
//! The provisioner is replaced by `sh` scripts that create the state
//! directory and plan artifact and append one line per invocation to a log
//! file, so invocation counts can be asserted.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tool_runner::discovery::{Locator, TEST_CASES_DIR};
use tool_runner::provision::{CaseState, Initializer, Provisioner, ProvisionerConfig};
use tool_runner::scheduler::InitScheduler;

struct Fixture {
    temp: TempDir,
    log: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("invocations.log");
        fs::write(&log, "").unwrap();
        Self { temp, log }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn add_case(&self, rel: &str) -> PathBuf {
        let dir = self.root().join(TEST_CASES_DIR).join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("main.tf"), "").unwrap();
        dir.canonicalize().unwrap()
    }

    /// Provisioner whose init/plan succeed and log each call
    fn provisioner(&self) -> Provisioner {
        let log = self.log.display();
        Provisioner::new(ProvisionerConfig {
            program: "sh".to_string(),
            init_args: vec![
                "-c".to_string(),
                format!("mkdir -p .terraform && echo \"init $(pwd -P)\" >> '{}'", log),
            ],
            plan_args: vec![
                "-c".to_string(),
                format!("echo plan > plan.out && echo \"plan $(pwd -P)\" >> '{}'", log),
            ],
            ..ProvisionerConfig::default()
        })
    }

    /// Provisioner whose init fails without creating state
    fn failing_provisioner(&self) -> Provisioner {
        let log = self.log.display();
        Provisioner::new(ProvisionerConfig {
            program: "sh".to_string(),
            init_args: vec!["-c".to_string(), format!("echo init >> '{}'; exit 1", log)],
            plan_args: vec!["-c".to_string(), format!("echo plan >> '{}'; exit 1", log)],
            ..ProvisionerConfig::default()
        })
    }

    fn invocations(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn locator(&self) -> Locator {
        Locator::new(self.root(), "main.tf")
    }
}

#[test]
fn test_single_case_end_to_end() {
    let fx = Fixture::new();
    let case = fx.add_case("a/b/c/d");
    assert!(!case.join(".terraform").exists());

    let provisioner = Arc::new(fx.provisioner());
    let scheduler = InitScheduler::new(Arc::clone(&provisioner), 25);

    let first = scheduler.run_pass(&fx.locator()).unwrap();
    assert_eq!(first.attempted, 1);
    assert_eq!(first.settled, 1);
    assert!(case.join(".terraform").is_dir());
    assert!(case.join("plan.out").is_file());
    assert_eq!(provisioner.state(&case), CaseState::Initialized);
    assert_eq!(fx.invocations().len(), 2);

    let second = scheduler.run_pass(&fx.locator()).unwrap();
    assert_eq!(second.attempted, 0);
    assert_eq!(second.already_initialized, 1);
    assert_eq!(fx.invocations().len(), 2, "second pass must run no commands");
}

#[test]
fn test_commands_run_inside_each_case() {
    let fx = Fixture::new();
    let cases: Vec<PathBuf> = (0..6)
        .map(|i| fx.add_case(&format!("aws/s3/rule/case_{}", i)))
        .collect();

    InitScheduler::new(Arc::new(fx.provisioner()), 3)
        .run_pass(&fx.locator())
        .unwrap();

    let lines = fx.invocations();
    for case in &cases {
        assert!(lines.contains(&format!("init {}", case.display())));
        assert!(lines.contains(&format!("plan {}", case.display())));
    }
}

#[test]
fn test_invocations_equal_pending_count_for_any_worker_count() {
    for workers in [1, 4, 25, 64] {
        let fx = Fixture::new();
        for i in 0..30 {
            fx.add_case(&format!("cloud/svc/rule_{}/case", i));
        }

        let summary = InitScheduler::new(Arc::new(fx.provisioner()), workers)
            .run_pass(&fx.locator())
            .unwrap();

        assert_eq!(summary.attempted, 30, "workers={}", workers);
        assert_eq!(summary.settled, 30, "workers={}", workers);
        // One init + one plan per directory
        assert_eq!(fx.invocations().len(), 60, "workers={}", workers);
    }
}

#[test]
fn test_already_initialized_cases_are_skipped() {
    let fx = Fixture::new();
    let done = fx.add_case("aws/s3/rule/done");
    fs::create_dir(done.join(".terraform")).unwrap();
    fs::write(done.join("plan.out"), "").unwrap();
    let half = fx.add_case("aws/s3/rule/half");
    fs::create_dir(half.join(".terraform")).unwrap();
    fx.add_case("aws/s3/rule/fresh");

    let summary = InitScheduler::new(Arc::new(fx.provisioner()), 25)
        .run_pass(&fx.locator())
        .unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.already_initialized, 1);
    assert_eq!(summary.attempted, 2);
    assert!(!fx.invocations().iter().any(|l| l.ends_with("/done")));
}

#[test]
fn test_failed_initialization_is_retried_next_pass() {
    let fx = Fixture::new();
    let case = fx.add_case("aws/s3/rule/flaky");

    let failing = Arc::new(fx.failing_provisioner());
    let summary = InitScheduler::new(Arc::clone(&failing), 25)
        .run_pass(&fx.locator())
        .unwrap();
    assert_eq!(summary.unsettled(), 1);
    assert_eq!(failing.state(&case), CaseState::Uninitialized);
    // Plan is attempted even though init failed
    assert_eq!(fx.invocations(), vec!["init", "plan"]);

    let summary = InitScheduler::new(Arc::new(fx.provisioner()), 25)
        .run_pass(&fx.locator())
        .unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.settled, 1);
}

#[test]
fn test_empty_repository() {
    let fx = Fixture::new();
    let summary = InitScheduler::new(Arc::new(fx.provisioner()), 25)
        .run_pass(&fx.locator())
        .unwrap();
    assert_eq!(summary.discovered, 0);
    assert!(fx.invocations().is_empty());
}
