//! Reporter Module: Trait-based output for tool runs
//!
//! ## Architecture
//!
//! - `Reporter` trait defines the event callbacks
//! - `JsonReporter` outputs NDJSON to stdout (for --format=json)
//! - `HumanReporter` prints the run summary to stderr
//! - `MultiReporter` fans events out to several reporters
//!
//! Per-case log lines are emitted by the invoker through `tracing`, whatever
//! reporters are active.
//!
//! ## Stdout Purity
//!
//! When JsonReporter is active, ONLY valid JSON goes to stdout. Logs go to
//! stderr.

use serde::Serialize;

/// Machine-readable events for JSON output
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MachineEvent<'a> {
    /// Emitted after setup, before the first test case
    RunStart { tool: &'a str, count: usize },
    /// Emitted when a test case completes
    CaseFinished {
        case: &'a str,
        status: &'a str, // "pass", "fail"
        duration_ms: u64,
    },
    /// Emitted at end of run
    RunFinished {
        passed: usize,
        failed: usize,
        duration_ms: u64,
    },
    /// Emitted on fatal error or interruption
    Error { message: &'a str },
}

/// Status string for a classified run
pub fn status_str(success: bool) -> &'static str {
    if success {
        "pass"
    } else {
        "fail"
    }
}

/// Reporter trait for output abstraction
pub trait Reporter {
    /// Called once the tool is set up and the test cases are known
    fn on_run_start(&mut self, tool: &str, count: usize);

    /// Called when a test case has been classified
    fn on_case_finished(&mut self, case: &str, success: bool, duration_ms: u64);

    /// Called at end of run
    fn on_run_finished(&mut self, passed: usize, failed: usize, duration_ms: u64);

    /// Called on fatal error or interruption
    fn on_error(&mut self, message: &str);
}

fn emit(event: &MachineEvent<'_>) {
    // ONLY JsonReporter touches stdout
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::error!("Failed to serialize event: {}", e),
    }
}

/// JSON Reporter - outputs NDJSON to stdout
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn on_run_start(&mut self, tool: &str, count: usize) {
        emit(&MachineEvent::RunStart { tool, count });
    }

    fn on_case_finished(&mut self, case: &str, success: bool, duration_ms: u64) {
        emit(&MachineEvent::CaseFinished {
            case,
            status: status_str(success),
            duration_ms,
        });
    }

    fn on_run_finished(&mut self, passed: usize, failed: usize, duration_ms: u64) {
        emit(&MachineEvent::RunFinished {
            passed,
            failed,
            duration_ms,
        });
    }

    fn on_error(&mut self, message: &str) {
        emit(&MachineEvent::Error { message });
    }
}

/// Human Reporter - run summary on stderr
#[derive(Default)]
pub struct HumanReporter {
    tool: String,
}

impl HumanReporter {
    /// Line prefix: the tool name once the run started
    fn label(&self) -> &str {
        if self.tool.is_empty() {
            "tool-runner"
        } else {
            &self.tool
        }
    }
}

impl Reporter for HumanReporter {
    fn on_run_start(&mut self, tool: &str, count: usize) {
        self.tool = tool.to_string();
        eprintln!("[{}] Running against {} test case(s)...\n", tool, count);
    }

    fn on_case_finished(&mut self, _case: &str, _success: bool, _duration_ms: u64) {
        // Per-case lines come from the invoker's log output
    }

    fn on_run_finished(&mut self, passed: usize, failed: usize, duration_ms: u64) {
        eprintln!();
        eprintln!(
            "[{}] {} complete, {} invalid run(s) in {}ms",
            self.label(),
            passed, failed, duration_ms
        );
    }

    fn on_error(&mut self, message: &str) {
        eprintln!("[{}] ERROR: {}", self.label(), message);
    }
}

// =============================================================================
// MultiReporter
// =============================================================================

/// MultiReporter - broadcasts events to multiple reporters
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        Self { reporters }
    }
}

impl Reporter for MultiReporter {
    fn on_run_start(&mut self, tool: &str, count: usize) {
        for r in &mut self.reporters {
            r.on_run_start(tool, count);
        }
    }

    fn on_case_finished(&mut self, case: &str, success: bool, duration_ms: u64) {
        for r in &mut self.reporters {
            r.on_case_finished(case, success, duration_ms);
        }
    }

    fn on_run_finished(&mut self, passed: usize, failed: usize, duration_ms: u64) {
        for r in &mut self.reporters {
            r.on_run_finished(passed, failed, duration_ms);
        }
    }

    fn on_error(&mut self, message: &str) {
        for r in &mut self.reporters {
            r.on_error(message);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
