//! Sequential tool invocation across all test cases
//!
//! Never parallelized: tools may share external resources (rate-limited
//! APIs, cloud accounts) and setup must complete before the first run.

use crate::discovery::{case_name, Locator};
use crate::error::Result;
use crate::plugin::Tool;
use crate::registry::ToolRegistry;
use crate::reporter::Reporter;
use crate::signals;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};

/// Classified run of one tool against one test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    pub case: PathBuf,
    pub success: bool,
    pub duration_ms: u64,
}

/// Result of running one tool across every test case
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub tool: String,
    pub outcomes: Vec<CaseOutcome>,
    /// Stopped early by a shutdown signal
    pub interrupted: bool,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }

    pub fn all_passed(&self) -> bool {
        !self.interrupted && self.failed() == 0
    }
}

pub struct ToolInvoker<'a> {
    registry: &'a ToolRegistry,
    locator: &'a Locator,
    shutdown: &'static AtomicBool,
}

impl<'a> ToolInvoker<'a> {
    pub fn new(registry: &'a ToolRegistry, locator: &'a Locator) -> Self {
        Self {
            registry,
            locator,
            shutdown: &signals::SHUTDOWN_REQUESTED,
        }
    }

    /// Poll `flag` instead of the process-wide signal flag
    pub fn with_shutdown_flag(mut self, flag: &'static AtomicBool) -> Self {
        self.shutdown = flag;
        self
    }

    /// Look up `tool_name`, set it up, then run it against every test case.
    ///
    /// A setup failure is reported as an empty run carrying the error.
    pub fn run(&self, tool_name: &str, reporter: &mut dyn Reporter) -> Result<RunReport> {
        let tool = self.registry.get(tool_name)?;
        let start = Instant::now();
        if let Err(e) = tool.setup() {
            reporter.on_run_start(tool.name(), 0);
            reporter.on_error(&e.to_string());
            reporter.on_run_finished(0, 0, start.elapsed().as_millis() as u64);
            return Err(e);
        }
        let cases = self.locator.locate()?;
        Ok(self.run_cases(tool, &cases, reporter))
    }

    /// Run an already set-up tool against `cases`, in order
    pub fn run_cases(
        &self,
        tool: &dyn Tool,
        cases: &[PathBuf],
        reporter: &mut dyn Reporter,
    ) -> RunReport {
        let start = Instant::now();
        let name = tool.name();
        let mut report = RunReport {
            tool: name.to_string(),
            ..Default::default()
        };

        reporter.on_run_start(name, cases.len());

        for case in cases {
            if self.shutdown.load(Ordering::SeqCst) {
                warn!("{} - shutdown requested, stopping", name);
                reporter.on_error("Shutdown requested");
                report.interrupted = true;
                break;
            }

            let case_start = Instant::now();
            let success = tool.run(case);
            let duration_ms = case_start.elapsed().as_millis() as u64;

            if success {
                info!("{} - {} - complete", name, case_name(case));
            } else {
                error!("{} - {} - invalid run", name, case_name(case));
                error!("{}", case.display());
            }

            reporter.on_case_finished(&self.locator.case_id(case), success, duration_ms);
            report.outcomes.push(CaseOutcome {
                case: case.clone(),
                success,
                duration_ms,
            });
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        reporter.on_run_finished(report.passed(), report.failed(), report.duration_ms);
        report
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandSpec;
    use std::path::Path;

    /// Succeeds on every case and requests shutdown after the first
    struct Stopping {
        flag: &'static AtomicBool,
    }

    impl Tool for Stopping {
        fn name(&self) -> &str {
            "stopping"
        }
        fn run_command(&self, _case_dir: &Path) -> CommandSpec {
            CommandSpec::new("true")
        }
        fn version_command(&self) -> CommandSpec {
            CommandSpec::new("true")
        }
        fn setup_command(&self) -> CommandSpec {
            CommandSpec::new("true")
        }
        fn required_env_vars(&self) -> &[&str] {
            &[]
        }
        fn acceptable_exit_codes(&self) -> &[i32] {
            &[0]
        }
        fn results_file_name(&self) -> &str {
            "out.txt"
        }
        fn run(&self, _case_dir: &Path) -> bool {
            self.flag.store(true, Ordering::SeqCst);
            true
        }
    }

    #[derive(Default)]
    struct Events(Vec<String>);

    impl Reporter for Events {
        fn on_run_start(&mut self, tool: &str, count: usize) {
            self.0.push(format!("start {} {}", tool, count));
        }
        fn on_case_finished(&mut self, case: &str, success: bool, _duration_ms: u64) {
            self.0.push(format!("case {} {}", case, success));
        }
        fn on_run_finished(&mut self, passed: usize, failed: usize, _duration_ms: u64) {
            self.0.push(format!("finish {} {}", passed, failed));
        }
        fn on_error(&mut self, message: &str) {
            self.0.push(format!("error {}", message));
        }
    }

    #[test]
    fn test_shutdown_stops_before_next_case() {
        static STOP: AtomicBool = AtomicBool::new(false);
        let tool = Stopping { flag: &STOP };
        let registry = ToolRegistry::from_tools(Vec::new()).unwrap();
        let locator = Locator::new("/repo", "main.tf");
        let cases: Vec<PathBuf> = ["a", "b", "c"]
            .iter()
            .map(|c| PathBuf::from("/repo/test-cases/x/y/z").join(c))
            .collect();

        let mut events = Events::default();
        let report = ToolInvoker::new(&registry, &locator)
            .with_shutdown_flag(&STOP)
            .run_cases(&tool, &cases, &mut events);

        assert!(report.interrupted);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].case, cases[0]);
        assert!(!report.all_passed());
        assert_eq!(
            events.0,
            vec![
                "start stopping 3",
                "case x/y/z/a true",
                "error Shutdown requested",
                "finish 1 0",
            ]
        );
    }

    #[test]
    fn test_unrelated_flag_does_not_interrupt() {
        static STOP: AtomicBool = AtomicBool::new(false);
        static SET_BY_TOOL: AtomicBool = AtomicBool::new(false);
        let tool = Stopping {
            flag: &SET_BY_TOOL,
        };
        let registry = ToolRegistry::from_tools(Vec::new()).unwrap();
        let locator = Locator::new("/repo", "main.tf");
        let cases = vec![
            PathBuf::from("/repo/test-cases/a/b/c/1"),
            PathBuf::from("/repo/test-cases/a/b/c/2"),
        ];

        let report = ToolInvoker::new(&registry, &locator)
            .with_shutdown_flag(&STOP)
            .run_cases(&tool, &cases, &mut Events::default());

        assert!(!report.interrupted);
        assert_eq!(report.passed(), 2);
        assert!(report.all_passed());
    }

    fn outcome(success: bool) -> CaseOutcome {
        CaseOutcome {
            case: PathBuf::from("/x"),
            success,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_report_counts() {
        let report = RunReport {
            tool: "t".to_string(),
            outcomes: vec![outcome(true), outcome(false), outcome(true)],
            interrupted: false,
            duration_ms: 0,
        };
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_passed());
    }

    #[test]
    fn test_interrupted_report_is_not_all_passed() {
        let report = RunReport {
            tool: "t".to_string(),
            outcomes: vec![outcome(true)],
            interrupted: true,
            duration_ms: 0,
        };
        assert!(!report.all_passed());
    }

    #[test]
    fn test_empty_report_passes() {
        assert!(RunReport::default().all_passed());
    }
}
