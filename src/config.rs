//! Configuration Loader
//! - Reads tool-runner.toml at the repository root (workers, provisioner, env)
//! - Provides CLI argument parsing with clap

use crate::error::{Error, Result};
use crate::provision::ProvisionerConfig;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional config file at the repository root
pub const CONFIG_FILE: &str = "tool-runner.toml";

/// Worker count used when neither the CLI nor the config file sets one
pub const DEFAULT_WORKERS: usize = 25;

// =============================================================================
// CLI Configuration
// =============================================================================

/// Output format for tool run results
#[derive(ValueEnum, Clone, Debug, Default, PartialEq)]
pub enum OutputFormat {
    /// Human-readable summary (to stderr)
    #[default]
    Human,
    /// Machine-readable NDJSON (to stdout)
    Json,
}

/// tool-runner - provision IaC test cases and run analysis tools against them
#[derive(Parser)]
#[command(name = "tool-runner", version, about = "IaC test-case orchestrator")]
pub struct Cli {
    /// Repository root (default: resolved from the executable's location)
    #[arg(long, env = "TOOL_RUNNER_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Number of concurrent initialization workers
    #[arg(long, short = 'j', env = "TOOL_RUNNER_WORKERS", global = true)]
    pub workers: Option<usize>,

    /// Output format for tool runs (also: TOOL_RUNNER_FORMAT env var)
    #[arg(long, value_enum, default_value_t = OutputFormat::Human, env = "TOOL_RUNNER_FORMAT", global = true)]
    pub format: OutputFormat,

    /// Path to generate a JUnit XML report for tool runs
    #[arg(long, env = "TOOL_RUNNER_JUNIT_XML", global = true)]
    pub junit_xml: Option<PathBuf>,

    /// Skip the external binary checks
    #[arg(long, global = true)]
    pub no_preflight: bool,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Commands {
    /// Initialize and plan every test case (default if no subcommand)
    Init,
    /// Run one analysis tool against every test case
    Run {
        /// Registered tool name
        tool: String,
        /// Run an initialization pass first
        #[arg(long)]
        init: bool,
        /// Exit non-zero when any test case fails
        #[arg(long)]
        strict: bool,
    },
    /// List registered tools
    Tools,
    /// List discovered test cases and their state
    Cases,
    /// Print a tool's version
    Version {
        /// Registered tool name
        tool: String,
    },
}

// =============================================================================
// tool-runner.toml
// =============================================================================

/// Contents of tool-runner.toml; every key is optional.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub workers: usize,
    pub provisioner: ProvisionerConfig,
    /// Exported into the process environment before any tool setup
    pub env: BTreeMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            provisioner: ProvisionerConfig::default(),
            env: BTreeMap::new(),
        }
    }
}

impl RunnerConfig {
    /// Load `tool-runner.toml` from `root`. A missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)?;
        toml::from_str(&contents).map_err(|source| Error::InvalidConfig {
            path: config_path,
            source,
        })
    }

    /// Export `[env]` entries into the current process.
    ///
    /// Must run before tool setup so required-variable checks and child
    /// processes see the values.
    pub fn apply_env(&self) {
        for (key, value) in &self.env {
            std::env::set_var(key, value);
            tracing::debug!("Set env: {}", key);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
