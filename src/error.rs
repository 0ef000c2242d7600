//! Error types for tool-runner

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the tool-runner Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// An external binary required before any work is not callable
    #[error("\"{command}\" status code is not zero; is {tool} installed?")]
    Preflight { tool: String, command: String },

    /// A tool's required environment variable is absent at setup time
    #[error("{var} environment variable is required for {tool}")]
    MissingEnvVar { var: String, tool: String },

    #[error("The tool {name} was not found (known tools: {})", .known.join(", "))]
    ToolNotFound { name: String, known: Vec<String> },

    /// Two registered tools share a name
    #[error("Tool name {name} is registered more than once")]
    DuplicateTool { name: String },

    #[error("Invalid configuration in {}: {source}", .path.display())]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
