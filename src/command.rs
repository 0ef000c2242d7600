//! Structured process invocation
//!
//! Every external program (provisioner, probes, analysis tools) is described
//! by a `CommandSpec`: program + argument list + working directory + env
//! overrides. Nothing is ever passed through a shell string.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// What to do with a child's stdout/stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Send both streams to /dev/null
    Discard,
    /// Share the parent's streams
    Inherit,
}

/// Description of one child-process invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run to completion and return the exit code.
    ///
    /// `Ok(None)` means the child was terminated by a signal. Spawn failures
    /// (program missing, bad working directory) are returned as `Err`.
    pub fn status(&self, output: Output) -> io::Result<Option<i32>> {
        let mut cmd = self.to_command();
        cmd.stdin(Stdio::null());
        if output == Output::Discard {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let status = cmd.status()?;
        Ok(status.code())
    }

    /// Run to completion capturing stdout; stderr is discarded.
    pub fn stdout(&self) -> io::Result<(Option<i32>, String)> {
        let out = self
            .to_command()
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;
        Ok((
            out.status.code(),
            String::from_utf8_lossy(&out.stdout).into_owned(),
        ))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
