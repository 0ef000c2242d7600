//! Environment preflight
//!
//! Verifies the external binaries the run depends on are callable before any
//! work starts. Each probe must exit 0; the first failure aborts.

use crate::command::{CommandSpec, Output};
use crate::error::{Error, Result};
use crate::provision::ProvisionerConfig;
use tracing::debug;

/// One external dependency and the command that proves it works
#[derive(Debug, Clone)]
pub struct Probe {
    pub tool: String,
    pub command: CommandSpec,
}

impl Probe {
    pub fn new(tool: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            tool: tool.into(),
            command,
        }
    }

    pub fn check(&self) -> Result<()> {
        debug!("Preflight: {}", self.command);
        match self.command.status(Output::Discard) {
            Ok(Some(0)) => Ok(()),
            _ => Err(Error::Preflight {
                tool: self.tool.clone(),
                command: self.command.to_string(),
            }),
        }
    }
}

/// Container runtime, provisioner and both cloud CLIs (with credentials)
pub fn default_probes(provisioner: &ProvisionerConfig) -> Vec<Probe> {
    vec![
        Probe::new("Docker", CommandSpec::new("docker").arg("--version")),
        Probe::new(
            provisioner.program.clone(),
            CommandSpec::new(&provisioner.program).arg("--version"),
        ),
        Probe::new(
            "Azure CLI",
            CommandSpec::new("az").args(["account", "list"]),
        ),
        Probe::new(
            "AWS CLI",
            CommandSpec::new("aws").args(["sts", "get-caller-identity"]),
        ),
    ]
}

/// Run every probe in order, failing on the first that does not exit 0
pub fn check(probes: &[Probe]) -> Result<()> {
    for probe in probes {
        probe.check()?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passing_probes() {
        let probes = vec![
            Probe::new("sh", CommandSpec::new("sh").args(["-c", "exit 0"])),
            Probe::new("true", CommandSpec::new("true")),
        ];
        assert!(check(&probes).is_ok());
    }

    #[test]
    fn test_nonzero_probe_names_tool() {
        let probes = vec![
            Probe::new("ok", CommandSpec::new("true")),
            Probe::new("Broken", CommandSpec::new("sh").args(["-c", "exit 2"])),
        ];
        match check(&probes) {
            Err(Error::Preflight { tool, command }) => {
                assert_eq!(tool, "Broken");
                assert_eq!(command, "sh -c \"exit 2\"");
            }
            other => panic!("expected Preflight error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_binary_is_preflight_error() {
        let probe = Probe::new(
            "Ghost",
            CommandSpec::new("definitely-not-a-real-binary-4821").arg("--version"),
        );
        assert!(matches!(probe.check(), Err(Error::Preflight { .. })));
    }

    #[test]
    fn test_default_probes_use_provisioner_program() {
        let config = ProvisionerConfig {
            program: "tofu".to_string(),
            ..ProvisionerConfig::default()
        };
        let probes = default_probes(&config);
        let commands: Vec<String> = probes.iter().map(|p| p.command.to_string()).collect();
        assert_eq!(
            commands,
            vec![
                "docker --version",
                "tofu --version",
                "az account list",
                "aws sts get-caller-identity",
            ]
        );
    }
}
