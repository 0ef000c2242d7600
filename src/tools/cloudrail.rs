//! Cloudrail (indeni/cloudrail-cli) run from its container image

use crate::command::CommandSpec;
use crate::plugin::Tool;
use crate::provision::ProvisionerConfig;
use std::path::Path;

const IMAGE: &str = "indeni/cloudrail-cli";

pub struct Cloudrail {
    /// Plan artifact the provisioner writes into each test case
    plan_file: String,
}

impl Cloudrail {
    pub fn new(provisioner: &ProvisionerConfig) -> Self {
        Self {
            plan_file: provisioner.plan_file.clone(),
        }
    }
}

impl Tool for Cloudrail {
    fn name(&self) -> &str {
        "cloudrail"
    }

    fn pretty_name(&self) -> &str {
        "Cloudrail"
    }

    /// Mounts the test case at /data and evaluates its plan offline
    fn run_command(&self, case_dir: &Path) -> CommandSpec {
        CommandSpec::new("docker")
            .args(["run", "--rm", "-u", "0:0", "-v"])
            .arg(format!("{}:/data", case_dir.display()))
            .args(["-e", "CLOUDRAIL_API_KEY", IMAGE])
            .args([
                "run",
                "--tf-plan",
                self.plan_file.as_str(),
                "--output-file",
                self.results_file_name(),
                "--no-cloud-account",
                "--auto-approve",
                "-v",
            ])
            .current_dir(case_dir)
    }

    fn version_command(&self) -> CommandSpec {
        CommandSpec::new("docker").args(["run", "--rm", IMAGE, "--version"])
    }

    fn setup_command(&self) -> CommandSpec {
        CommandSpec::new("docker").args(["pull", "indeni/cloudrail-cli:latest"])
    }

    fn required_env_vars(&self) -> &[&str] {
        &["CLOUDRAIL_API_KEY"]
    }

    fn acceptable_exit_codes(&self) -> &[i32] {
        &[0]
    }

    fn results_file_name(&self) -> &str {
        "cloudrail_results.txt"
    }
}
