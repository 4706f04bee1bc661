//! Configuration types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for the supervised service.
///
/// Set once when the supervisor is constructed and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperConfig {
    /// Path to the service executable to spawn.
    pub run: String,
    /// Arguments passed to the service executable, in order.
    pub args: Vec<String>,
    /// Working directory for the spawned service. Empty or absent inherits ours.
    pub cwd: Option<PathBuf>,
    /// Capture stdout of the supervised process and send it to the log.
    pub capture_stdout: bool,
    /// Capture stderr of the supervised process and send it to the log.
    pub capture_stderr: bool,
}

impl WrapperConfig {
    /// Create a configuration for the given executable with no arguments.
    #[must_use]
    pub fn new(run: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            ..Default::default()
        }
    }

    /// Set the argument list.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Enable or disable stdout capture.
    #[must_use]
    pub fn with_capture_stdout(mut self, capture: bool) -> Self {
        self.capture_stdout = capture;
        self
    }

    /// Enable or disable stderr capture.
    #[must_use]
    pub fn with_capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }

    /// Working directory to spawn in, or `None` to inherit the current one.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}
