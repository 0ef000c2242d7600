//! Built-in analysis tools
//!
//! To add a tool, implement `crate::plugin::Tool` in a new module here and
//! append it to `builtin()`. The registry rejects duplicate names at startup.

pub mod cloudrail;

use crate::plugin::Tool;
use crate::provision::ProvisionerConfig;

/// Registration table of every built-in tool.
///
/// Tools that read provisioned artifacts take their file names from
/// `provisioner`.
pub fn builtin(provisioner: &ProvisionerConfig) -> Vec<Box<dyn Tool>> {
    vec![Box::new(cloudrail::Cloudrail::new(provisioner))]
}
