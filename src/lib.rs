//! tool-runner Library
//!
//! This library exposes the core modules for integration testing.
//! The binary entry point is in main.rs.

pub mod command;
pub mod config;
pub mod discovery;
pub mod error;
pub mod invoker;
pub mod junit;
pub mod plugin;
pub mod preflight;
pub mod provision;
pub mod queue;
pub mod registry;
pub mod reporter;
pub mod scheduler;
pub mod signals;
pub mod tools;

pub use error::{Error, Result};
