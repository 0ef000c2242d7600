//! Analysis-tool contract
//!
//! Every pluggable analysis tool implements `Tool`. Implementors only
//! describe themselves (commands, env vars, exit codes, result file); the
//! provided methods implement setup, run and success classification.
//!
//! ## Success
//!
//! A run succeeds only when BOTH hold:
//! - the tool wrote `results_file_name()` into the test-case directory
//! - the exit code is in `acceptable_exit_codes()`
//!
//! Exit codes alone are not enough: some tools exit 0 without writing output,
//! others exit 1 to mean "findings present".

use crate::command::{CommandSpec, Output};
use crate::error::{Error, Result};
use std::path::Path;
use tracing::{debug, info, warn};

pub trait Tool: Send + Sync {
    /// Unique identifier used for lookup
    fn name(&self) -> &str;

    /// Display label
    fn pretty_name(&self) -> &str {
        self.name()
    }

    /// Command that analyses the provisioned artifacts in `case_dir`
    fn run_command(&self, case_dir: &Path) -> CommandSpec;

    /// Command whose stdout reports the tool's version
    fn version_command(&self) -> CommandSpec;

    /// Command that installs or prepares the tool
    fn setup_command(&self) -> CommandSpec;

    /// Environment variables that must be non-empty before setup/run
    fn required_env_vars(&self) -> &[&str];

    /// Exit codes meaning the tool ran to completion, regardless of findings
    fn acceptable_exit_codes(&self) -> &[i32];

    /// File the tool writes inside the test-case directory
    fn results_file_name(&self) -> &str;

    /// Fails on the first required variable that is unset or empty
    fn check_required_env_vars(&self) -> Result<()> {
        for var in self.required_env_vars() {
            let present = std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false);
            if !present {
                return Err(Error::MissingEnvVar {
                    var: var.to_string(),
                    tool: self.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Check env vars, then run the setup command with output discarded.
    ///
    /// The setup command's exit status is logged but not enforced.
    fn setup(&self) -> Result<()> {
        info!("Setting up {}", self.pretty_name());
        self.check_required_env_vars()?;

        let cmd = self.setup_command();
        match cmd.status(Output::Discard) {
            Ok(Some(0)) => debug!("`{}` succeeded", cmd),
            Ok(code) => warn!("`{}` exited with {:?}", cmd, code),
            Err(e) => warn!("`{}` failed to start: {}", cmd, e),
        }
        Ok(())
    }

    /// Run against one test case and classify the outcome
    fn run(&self, case_dir: &Path) -> bool {
        let cmd = self.run_command(case_dir).current_dir(case_dir);
        debug!("Running `{}` in {}", cmd, case_dir.display());
        match cmd.status(Output::Inherit) {
            Ok(code) => self.is_successful_run(case_dir, code),
            Err(e) => {
                warn!("`{}` failed to start: {}", cmd, e);
                false
            }
        }
    }

    /// `exit_code` is `None` when the process was killed by a signal
    fn is_successful_run(&self, case_dir: &Path, exit_code: Option<i32>) -> bool {
        if !case_dir.join(self.results_file_name()).is_file() {
            return false;
        }
        match exit_code {
            Some(code) => self.acceptable_exit_codes().contains(&code),
            None => false,
        }
    }

    /// Version string: last word of the first non-empty line of the version
    /// command's stdout
    fn version(&self) -> Option<String> {
        let (_, out) = self.version_command().stdout().ok()?;
        parse_version(&out)
    }
}

fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================
