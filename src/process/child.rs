//! Supervised child process.
//!
//! This module provides a builder for configuring the child process
//! (executable, arguments, working directory, which output streams are
//! captured) and a thin handle over the running process.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::config::WrapperConfig;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The executable was not found.
    #[error("Executable not found: {program}")]
    NotFound { program: String },
    /// Permission denied when spawning.
    #[error("Permission denied: {program}")]
    PermissionDenied { program: String },
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(program: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                program: program.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                program: program.to_string(),
            },
            _ => Self::Io(err),
        }
    }
}

/// Why a child process did not exit cleanly.
#[derive(thiserror::Error, Debug)]
pub enum ExitError {
    /// The process exited with a non-zero code or was killed by a signal.
    #[error("process exited with {0}")]
    Status(ExitStatus),
    /// Waiting on the process failed.
    #[error("failed to wait for process: {0}")]
    Wait(#[from] std::io::Error),
}

/// Outcome of a child process; `Ok(())` for a successful exit code.
pub type ExitResult = Result<(), ExitError>;

/// Builder for configuring the supervised process.
#[derive(Debug, Clone, Default)]
pub struct ChildProcessBuilder {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    capture_stdout: bool,
    capture_stderr: bool,
}

impl ChildProcessBuilder {
    /// Create a new builder for the given executable.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Create a builder from the wrapper configuration.
    #[must_use]
    pub fn from_config(config: &WrapperConfig) -> Self {
        let mut builder = Self::new(config.run.clone())
            .args(config.args.iter().cloned())
            .capture_stdout(config.capture_stdout)
            .capture_stderr(config.capture_stderr);
        if let Some(dir) = config.working_dir() {
            builder = builder.working_dir(dir);
        }
        builder
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory for the process.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Pipe stdout back to us instead of discarding it.
    #[must_use]
    pub fn capture_stdout(mut self, capture: bool) -> Self {
        self.capture_stdout = capture;
        self
    }

    /// Pipe stderr back to us instead of discarding it.
    #[must_use]
    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }

    /// Get the executable.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the argument list.
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the working directory, if set.
    #[must_use]
    pub fn get_working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    fn stdio(capture: bool) -> Stdio {
        if capture {
            Stdio::piped()
        } else {
            Stdio::null()
        }
    }
}

/// A running supervised process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    /// Spawn a process with the given builder configuration.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(builder: &ChildProcessBuilder) -> Result<Self, SpawnError> {
        let mut cmd = Command::new(&builder.program);
        cmd.args(&builder.args)
            .stdin(Stdio::null())
            .stdout(ChildProcessBuilder::stdio(builder.capture_stdout))
            .stderr(ChildProcessBuilder::stdio(builder.capture_stderr));

        if let Some(ref dir) = builder.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_io(&builder.program, e))?;

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// Returns `None` if stdout is not captured or was already taken.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// Returns `None` if stderr is not captured or was already taken.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// Cancel safe, so it can sit in a `select!` next to kill requests.
    ///
    /// # Errors
    ///
    /// Returns `ExitError::Status` for a non-successful exit and
    /// `ExitError::Wait` if waiting itself fails.
    pub async fn wait(&mut self) -> ExitResult {
        let status = self.child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(ExitError::Status(status))
        }
    }

    /// Request forcible termination without waiting for the exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }

    /// Forcefully kill the process and reap it.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}
