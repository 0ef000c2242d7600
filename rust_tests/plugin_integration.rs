//! Integration tests for the tool contract, registry and invoker
//!
//! `ScriptTool` stands in for a real analysis tool: its commands are `sh`
//! scripts, so exit codes and result files can be controlled per test.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tool_runner::command::CommandSpec;
use tool_runner::discovery::{Locator, TEST_CASES_DIR};
use tool_runner::error::Error;
use tool_runner::invoker::ToolInvoker;
use tool_runner::junit::JunitReporter;
use tool_runner::plugin::Tool;
use tool_runner::provision::ProvisionerConfig;
use tool_runner::registry::ToolRegistry;
use tool_runner::reporter::Reporter;

struct ScriptTool {
    name: &'static str,
    run_script: String,
    setup_script: String,
    setup_dir: Option<PathBuf>,
    env_vars: Vec<&'static str>,
    codes: Vec<i32>,
}

impl ScriptTool {
    fn new(name: &'static str, run_script: &str) -> Self {
        Self {
            name,
            run_script: run_script.to_string(),
            setup_script: "true".to_string(),
            setup_dir: None,
            env_vars: Vec::new(),
            codes: vec![0],
        }
    }
}

impl Tool for ScriptTool {
    fn name(&self) -> &str {
        self.name
    }
    fn run_command(&self, _case_dir: &Path) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", self.run_script.as_str()])
    }
    fn version_command(&self) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", "echo script-tool v9.9"])
    }
    fn setup_command(&self) -> CommandSpec {
        let cmd = CommandSpec::new("sh").args(["-c", self.setup_script.as_str()]);
        match &self.setup_dir {
            Some(dir) => cmd.current_dir(dir),
            None => cmd,
        }
    }
    fn required_env_vars(&self) -> &[&str] {
        &self.env_vars
    }
    fn acceptable_exit_codes(&self) -> &[i32] {
        &self.codes
    }
    fn results_file_name(&self) -> &str {
        "results.txt"
    }
}

fn make_cases(root: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let dir = root.join(TEST_CASES_DIR).join("aws/s3/rule").join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("main.tf"), "").unwrap();
            dir.canonicalize().unwrap()
        })
        .collect()
}

#[derive(Default)]
struct Recorder {
    started: Vec<(String, usize)>,
    finished: Vec<(String, bool)>,
    summary: Option<(usize, usize)>,
    errors: Vec<String>,
}

impl Reporter for Recorder {
    fn on_run_start(&mut self, tool: &str, count: usize) {
        self.started.push((tool.to_string(), count));
    }
    fn on_case_finished(&mut self, case: &str, success: bool, _duration_ms: u64) {
        self.finished.push((case.to_string(), success));
    }
    fn on_run_finished(&mut self, passed: usize, failed: usize, _duration_ms: u64) {
        self.summary = Some((passed, failed));
    }
    fn on_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

// =============================================================================
// Run classification
// =============================================================================

#[test]
fn test_exit_zero_without_result_file_is_failure() {
    let temp = TempDir::new().unwrap();
    let tool = ScriptTool::new("quiet", "exit 0");
    assert!(!tool.run(temp.path()));
}

#[test]
fn test_acceptable_nonzero_exit_with_result_file_is_success() {
    let temp = TempDir::new().unwrap();
    let mut tool = ScriptTool::new("findings", "echo finding > results.txt; exit 1");
    tool.codes = vec![0, 1];
    assert!(tool.run(temp.path()));
}

#[test]
fn test_unacceptable_exit_with_result_file_is_failure() {
    let temp = TempDir::new().unwrap();
    let tool = ScriptTool::new("crashy", "echo partial > results.txt; exit 2");
    assert!(!tool.run(temp.path()));
}

#[test]
fn test_run_uses_case_dir_as_working_directory() {
    let temp = TempDir::new().unwrap();
    let case = temp.path().join("case");
    fs::create_dir(&case).unwrap();
    let tool = ScriptTool::new("writer", "pwd -P > results.txt");

    assert!(tool.run(&case));
    let written = fs::read_to_string(case.join("results.txt")).unwrap();
    assert_eq!(written.trim(), case.canonicalize().unwrap().to_string_lossy());
}

// =============================================================================
// Setup
// =============================================================================

#[test]
fn test_setup_fails_on_missing_env_var_without_running_command() {
    let temp = TempDir::new().unwrap();
    std::env::remove_var("X_API_KEY");

    let mut tool = ScriptTool::new("needs-key", "true");
    tool.env_vars = vec!["X_API_KEY"];
    tool.setup_script = "touch setup-ran".to_string();
    tool.setup_dir = Some(temp.path().to_path_buf());

    match tool.setup() {
        Err(Error::MissingEnvVar { var, tool }) => {
            assert_eq!(var, "X_API_KEY");
            assert_eq!(tool, "needs-key");
        }
        other => panic!("expected MissingEnvVar, got {:?}", other),
    }
    assert!(!temp.path().join("setup-ran").exists());
}

#[test]
fn test_setup_runs_command_when_env_present() {
    let temp = TempDir::new().unwrap();
    std::env::set_var("TOOL_RUNNER_IT_PRESENT_KEY", "secret");

    let mut tool = ScriptTool::new("has-key", "true");
    tool.env_vars = vec!["TOOL_RUNNER_IT_PRESENT_KEY"];
    tool.setup_script = "touch setup-ran".to_string();
    tool.setup_dir = Some(temp.path().to_path_buf());

    tool.setup().unwrap();
    std::env::remove_var("TOOL_RUNNER_IT_PRESENT_KEY");
    assert!(temp.path().join("setup-ran").exists());
}

#[test]
fn test_setup_ignores_setup_command_exit_status() {
    let mut tool = ScriptTool::new("bad-setup", "true");
    tool.setup_script = "exit 5".to_string();
    assert!(tool.setup().is_ok());
}

#[test]
fn test_version_from_command_output() {
    let tool = ScriptTool::new("versioned", "true");
    assert_eq!(tool.version(), Some("v9.9".to_string()));
}

// =============================================================================
// Invoker
// =============================================================================

#[test]
fn test_invoker_classifies_every_case() {
    let temp = TempDir::new().unwrap();
    let cases = make_cases(temp.path(), &["good_1", "bad", "good_2"]);

    // Writes results everywhere except in the "bad" case
    let tool = ScriptTool::new(
        "selective",
        "case \"$(basename \"$(pwd -P)\")\" in bad) exit 0;; *) echo ok > results.txt;; esac",
    );
    let registry = ToolRegistry::from_tools(vec![Box::new(tool)]).unwrap();
    let locator = Locator::new(temp.path(), "main.tf");

    let mut recorder = Recorder::default();
    let report = ToolInvoker::new(&registry, &locator)
        .run("selective", &mut recorder)
        .unwrap();

    assert_eq!(report.tool, "selective");
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.passed(), 2);
    assert_eq!(report.failed(), 1);
    assert!(!report.interrupted);

    let bad = report.outcomes.iter().find(|o| o.case == cases[1]).unwrap();
    assert!(!bad.success);

    assert_eq!(recorder.started, vec![("selective".to_string(), 3)]);
    assert_eq!(recorder.summary, Some((2, 1)));
    assert!(recorder
        .finished
        .contains(&("aws/s3/rule/bad".to_string(), false)));
}

#[test]
fn test_invoker_unknown_tool() {
    let temp = TempDir::new().unwrap();
    let registry = ToolRegistry::discover(&ProvisionerConfig::default()).unwrap();
    let locator = Locator::new(temp.path(), "main.tf");

    let mut recorder = Recorder::default();
    match ToolInvoker::new(&registry, &locator).run("nonexistent", &mut recorder) {
        Err(Error::ToolNotFound { name, known }) => {
            assert_eq!(name, "nonexistent");
            assert!(known.contains(&"cloudrail".to_string()));
        }
        other => panic!("expected ToolNotFound, got {:?}", other),
    }
    assert!(recorder.started.is_empty());
}

#[test]
fn test_invoker_stops_when_setup_fails() {
    let temp = TempDir::new().unwrap();
    make_cases(temp.path(), &["case_1"]);
    std::env::remove_var("TOOL_RUNNER_IT_NEVER_SET");

    let mut tool = ScriptTool::new("locked", "echo ok > results.txt");
    tool.env_vars = vec!["TOOL_RUNNER_IT_NEVER_SET"];
    let registry = ToolRegistry::from_tools(vec![Box::new(tool)]).unwrap();
    let locator = Locator::new(temp.path(), "main.tf");

    let mut recorder = Recorder::default();
    let result = ToolInvoker::new(&registry, &locator).run("locked", &mut recorder);

    assert!(matches!(result, Err(Error::MissingEnvVar { .. })));
    assert!(recorder.finished.is_empty());
    assert_eq!(recorder.started, vec![("locked".to_string(), 0)]);
    assert_eq!(recorder.errors.len(), 1);
    assert!(recorder.errors[0].contains("TOOL_RUNNER_IT_NEVER_SET"));
    assert_eq!(recorder.summary, Some((0, 0)));
    assert!(!temp
        .path()
        .join(TEST_CASES_DIR)
        .join("aws/s3/rule/case_1/results.txt")
        .exists());
}

#[test]
fn test_setup_failure_still_writes_junit_report() {
    let temp = TempDir::new().unwrap();
    make_cases(temp.path(), &["case_1"]);
    std::env::remove_var("TOOL_RUNNER_IT_JUNIT_KEY");

    let mut tool = ScriptTool::new("unkeyed", "echo ok > results.txt");
    tool.env_vars = vec!["TOOL_RUNNER_IT_JUNIT_KEY"];
    let registry = ToolRegistry::from_tools(vec![Box::new(tool)]).unwrap();
    let locator = Locator::new(temp.path(), "main.tf");

    let xml_path = temp.path().join("junit.xml");
    let mut junit = JunitReporter::new(xml_path.clone());
    let result = ToolInvoker::new(&registry, &locator).run("unkeyed", &mut junit);

    assert!(matches!(result, Err(Error::MissingEnvVar { .. })));
    let xml = fs::read_to_string(&xml_path).expect("JUnit report should be written");
    assert!(xml.contains("<testsuite name=\"unkeyed\""));
    assert!(xml.contains("errors=\"1\""));
    assert!(xml.contains("TOOL_RUNNER_IT_JUNIT_KEY environment variable is required for unkeyed"));
}

#[test]
fn test_registry_rejects_duplicate_script_tools() {
    let result = ToolRegistry::from_tools(vec![
        Box::new(ScriptTool::new("same", "true")),
        Box::new(ScriptTool::new("same", "true")),
    ]);
    assert!(matches!(result, Err(Error::DuplicateTool { name }) if name == "same"));
}
