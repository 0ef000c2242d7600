//! JUnit XML Reporter for CI Integration
//!
//! One `<testsuite>` per tool run; each test case becomes a `<testcase>`
//! whose classname is its parent path (`aws.s3.public`) and whose name is
//! the case directory. A fatal error (setup failure, interruption) is
//! counted in `errors` and its message lands in `<system-err>`.

use crate::reporter::Reporter;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{error, info};

// =============================================================================
// XML Schema Structs (JUnit Format)
// =============================================================================

#[derive(Serialize)]
#[serde(rename = "testsuites")]
struct TestSuites {
    #[serde(rename = "testsuite")]
    suites: Vec<TestSuite>,
}

#[derive(Serialize)]
struct TestSuite {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@tests")]
    tests: usize,
    #[serde(rename = "@failures")]
    failures: usize,
    #[serde(rename = "@errors")]
    errors: usize,
    #[serde(rename = "@time")]
    time: f64,
    #[serde(rename = "testcase")]
    cases: Vec<TestCase>,
    #[serde(rename = "system-err", skip_serializing_if = "Option::is_none")]
    system_err: Option<String>,
}

#[derive(Serialize)]
struct TestCase {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@classname")]
    classname: String,
    #[serde(rename = "@time")]
    time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<Failure>,
}

#[derive(Serialize)]
struct Failure {
    #[serde(rename = "@message")]
    message: String,
    #[serde(rename = "$text")]
    body: String,
}

// =============================================================================
// JunitReporter
// =============================================================================

/// Reporter that buffers results and writes JUnit XML on completion
pub struct JunitReporter {
    output_path: PathBuf,
    tool: String,
    cases: Vec<TestCase>,
    error_message: Option<String>,
}

impl JunitReporter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            output_path: path,
            tool: String::new(),
            cases: Vec::new(),
            error_message: None,
        }
    }

    fn write_report(&self, root: &TestSuites) -> std::io::Result<()> {
        let xml = quick_xml::se::to_string(root)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let mut writer = BufWriter::new(File::create(&self.output_path)?);
        writer.write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
        writer.write_all(xml.as_bytes())?;
        writer.flush()
    }
}

impl Reporter for JunitReporter {
    fn on_run_start(&mut self, tool: &str, _count: usize) {
        self.tool = tool.to_string();
        self.cases.clear();
        self.error_message = None;
    }

    fn on_case_finished(&mut self, case: &str, success: bool, duration_ms: u64) {
        // "aws/s3/public/case_1" -> classname "aws.s3.public", name "case_1"
        let (classname, name) = match case.rsplit_once('/') {
            Some((parent, leaf)) => (parent.replace('/', "."), leaf.to_string()),
            None => (self.tool.clone(), case.to_string()),
        };

        let failure = (!success).then(|| Failure {
            message: "invalid run".to_string(),
            body: format!(
                "{} did not exit with an acceptable code or did not write its results file",
                self.tool
            ),
        });

        self.cases.push(TestCase {
            name,
            classname,
            time: duration_ms as f64 / 1000.0,
            failure,
        });
    }

    fn on_run_finished(&mut self, passed: usize, failed: usize, duration_ms: u64) {
        let suite = TestSuite {
            name: self.tool.clone(),
            tests: passed + failed,
            failures: failed,
            errors: usize::from(self.error_message.is_some()),
            time: duration_ms as f64 / 1000.0,
            cases: std::mem::take(&mut self.cases),
            system_err: self.error_message.take(),
        };

        let root = TestSuites {
            suites: vec![suite],
        };

        match self.write_report(&root) {
            Ok(()) => info!("JUnit report written to {}", self.output_path.display()),
            Err(e) => error!(
                "Failed to write JUnit report to {}: {}",
                self.output_path.display(),
                e
            ),
        }
    }

    fn on_error(&mut self, message: &str) {
        self.error_message = Some(message.to_string());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_junit_reporter_creation() {
        let reporter = JunitReporter::new(PathBuf::from("/tmp/test.xml"));
        assert!(reporter.cases.is_empty());
    }

    #[test]
    fn test_junit_reporter_buffers_cases() {
        let mut reporter = JunitReporter::new(PathBuf::from("/tmp/test.xml"));

        reporter.on_run_start("cloudrail", 2);
        reporter.on_case_finished("aws/s3/public/case_1", true, 42);
        reporter.on_case_finished("aws/s3/public/case_2", false, 100);

        assert_eq!(reporter.cases.len(), 2);
        assert_eq!(reporter.cases[0].name, "case_1");
        assert_eq!(reporter.cases[0].classname, "aws.s3.public");
        assert!(reporter.cases[0].failure.is_none());
        assert!(reporter.cases[1].failure.is_some());
    }

    #[test]
    fn test_junit_case_without_parent_uses_tool_as_classname() {
        let mut reporter = JunitReporter::new(PathBuf::from("/tmp/test.xml"));
        reporter.on_run_start("cloudrail", 1);
        reporter.on_case_finished("lonely", true, 10);

        assert_eq!(reporter.cases[0].classname, "cloudrail");
        assert_eq!(reporter.cases[0].name, "lonely");
    }

    #[test]
    fn test_junit_time_conversion() {
        let mut reporter = JunitReporter::new(PathBuf::from("/tmp/test.xml"));
        reporter.on_run_start("cloudrail", 1);
        reporter.on_case_finished("a/b/c/d", true, 1500);

        assert!((reporter.cases[0].time - 1.5).abs() < 0.001);
    }

    #[test]
    fn test_junit_run_start_clears_state() {
        let mut reporter = JunitReporter::new(PathBuf::from("/tmp/test.xml"));
        reporter.on_case_finished("a/b/c/d", true, 10);
        reporter.on_error("some error");

        reporter.on_run_start("cloudrail", 0);
        assert!(reporter.cases.is_empty());
        assert!(reporter.error_message.is_none());
    }

    #[test]
    fn test_junit_writes_xml_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.xml");
        let mut reporter = JunitReporter::new(path.clone());

        reporter.on_run_start("cloudrail", 2);
        reporter.on_case_finished("aws/s3/public/case_1", true, 5);
        reporter.on_case_finished("aws/s3/public/case_2", false, 5);
        reporter.on_run_finished(1, 1, 10);

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<testsuite name=\"cloudrail\""));
        assert!(xml.contains("failures=\"1\""));
        assert!(xml.contains("name=\"case_2\""));
        assert!(xml.contains("<failure message=\"invalid run\""));
    }

    #[test]
    fn test_junit_setup_error_still_writes_report() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.xml");
        let mut reporter = JunitReporter::new(path.clone());

        reporter.on_run_start("cloudrail", 0);
        reporter.on_error("CLOUDRAIL_API_KEY environment variable is required for cloudrail");
        reporter.on_run_finished(0, 0, 3);

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("tests=\"0\""));
        assert!(xml.contains("errors=\"1\""));
        assert!(xml.contains(
            "<system-err>CLOUDRAIL_API_KEY environment variable is required for cloudrail</system-err>"
        ));
    }
}
