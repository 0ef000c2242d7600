//! Provisioning-tool lifecycle for a single test case
//!
//! A test case is initialized once the provisioner's state directory and the
//! plan artifact both exist. That state is recomputed from disk on every
//! pass; nothing is cached between runs.

use crate::command::{CommandSpec, Output};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Derived initialization state of a test-case directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Uninitialized,
    Initialized,
}

impl CaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseState::Uninitialized => "uninitialized",
            CaseState::Initialized => "initialized",
        }
    }
}

/// Brings one test-case directory to the initialized state.
///
/// `initialize` never reports failure: a directory that did not settle stays
/// `Uninitialized` and is picked up again by the next pass.
pub trait Initializer: Send + Sync + 'static {
    fn state(&self, dir: &Path) -> CaseState;
    fn initialize(&self, dir: &Path);
}

/// `[provisioner]` section of tool-runner.toml
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionerConfig {
    /// Provisioning binary
    pub program: String,
    pub init_args: Vec<String>,
    /// Must write `plan_file` into the working directory
    pub plan_args: Vec<String>,
    /// Marker file identifying a test case
    pub root_file: String,
    /// Directory the provisioner creates on init
    pub state_dir: String,
    pub plan_file: String,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            program: "terraform".to_string(),
            init_args: vec!["init".to_string()],
            plan_args: vec!["plan".to_string(), "-out=plan.out".to_string()],
            root_file: "main.tf".to_string(),
            state_dir: ".terraform".to_string(),
            plan_file: "plan.out".to_string(),
        }
    }
}

/// `Initializer` backed by the external provisioning tool
#[derive(Debug, Clone)]
pub struct Provisioner {
    config: ProvisionerConfig,
}

impl Provisioner {
    pub fn new(config: ProvisionerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    pub fn init_command(&self, dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.config.program)
            .args(&self.config.init_args)
            .current_dir(dir)
    }

    pub fn plan_command(&self, dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.config.program)
            .args(&self.config.plan_args)
            .current_dir(dir)
    }

    fn run_step(&self, step: &CommandSpec) {
        match step.status(Output::Discard) {
            Ok(Some(0)) => {}
            Ok(code) => debug!("`{}` exited with {:?}", step, code),
            Err(e) => debug!("`{}` failed to start: {}", step, e),
        }
    }
}

impl Initializer for Provisioner {
    fn state(&self, dir: &Path) -> CaseState {
        let has_state = dir.join(&self.config.state_dir).is_dir();
        let has_plan = dir.join(&self.config.plan_file).is_file();
        if has_state && has_plan {
            CaseState::Initialized
        } else {
            CaseState::Uninitialized
        }
    }

    /// Init then plan. The plan step runs even if init failed; the next
    /// pass's state check decides whether the directory settled.
    fn initialize(&self, dir: &Path) {
        self.run_step(&self.init_command(dir));
        self.run_step(&self.plan_command(dir));
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
