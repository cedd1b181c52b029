//! Building and running git processes.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::process::{Command, Output, Stdio};

use crate::error::{Error, Result};
use crate::traits::Executor;

/// What happens to a git process's output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputMode {
    /// stdout and stderr go straight to the caller's streams.
    #[default]
    Inherit,
    /// stdout and stderr are captured into the [`ExecutionResult`].
    Capture,
    /// stdout is discarded and stderr is captured but never echoed.
    ///
    /// Nothing reaches the caller's streams, yet a failure still carries
    /// git's error message.
    Quiet,
}

/// A fully built git command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run, normally `git`.
    pub program: OsString,
    /// Arguments following the program name.
    pub args: Vec<OsString>,
    /// Output handling.
    pub mode: OutputMode,
}

impl Invocation {
    /// The complete argument vector, program first, lossily converted.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    /// Whether the argument list contains `arg`.
    #[must_use]
    pub fn has_arg(&self, arg: impl AsRef<OsStr>) -> bool {
        self.args.iter().any(|a| a == arg.as_ref())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Outcome of one git process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionResult {
    /// Exit code; `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    /// Captured stdout, if it was captured.
    pub stdout: Option<String>,
    /// Captured stderr, if it was captured.
    pub stderr: Option<String>,
}

impl ExecutionResult {
    /// A result with the given exit code and no captured output.
    #[must_use]
    pub const fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            stdout: None,
            stderr: None,
        }
    }

    /// Attach captured stdout.
    #[must_use]
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = Some(stdout.into());
        self
    }

    /// Attach captured stderr.
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }

    /// Whether the process exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Captured stdout, or `""` if none was captured.
    #[must_use]
    pub fn stdout_str(&self) -> &str {
        self.stdout.as_deref().unwrap_or_default()
    }

    /// Captured stderr, or `""` if none was captured.
    #[must_use]
    pub fn stderr_str(&self) -> &str {
        self.stderr.as_deref().unwrap_or_default()
    }

    /// Turn a non-zero exit into [`Error::CommandFailed`].
    ///
    /// # Errors
    /// Returns [`Error::CommandFailed`] unless the exit code is 0.
    pub fn check(self, invocation: &Invocation) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                command: invocation.to_string(),
                code: self.code,
                stderr: self.stderr.unwrap_or_default(),
            })
        }
    }

    fn from_output(output: Output, mode: OutputMode) -> Self {
        let decode = |bytes: Vec<u8>| String::from_utf8_lossy(&bytes).into_owned();
        match mode {
            OutputMode::Inherit => Self {
                code: output.status.code(),
                stdout: None,
                stderr: None,
            },
            OutputMode::Capture => Self {
                code: output.status.code(),
                stdout: Some(decode(output.stdout)),
                stderr: Some(decode(output.stderr)),
            },
            OutputMode::Quiet => Self {
                code: output.status.code(),
                stdout: None,
                stderr: Some(decode(output.stderr)),
            },
        }
    }
}

/// Runs invocations as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);

        match invocation.mode {
            OutputMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
            OutputMode::Quiet => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::piped());
            }
        }

        let output = cmd.output().map_err(|source| Error::Spawn {
            program: invocation.program.to_string_lossy().into_owned(),
            source,
        })?;

        let result = ExecutionResult::from_output(output, invocation.mode);
        tracing::trace!(command = %invocation, code = ?result.code, "git exited");
        Ok(result)
    }
}
