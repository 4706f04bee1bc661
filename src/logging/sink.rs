//! Log sinks for captured output lines.

use std::fmt;

/// Which output stream of the child a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    /// Name of the log sub-channel for this stream.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for complete lines read from the child's output.
///
/// Constructed by the caller and handed to the supervisor, so the caller
/// decides where lines go and owns the sink's lifetime.
pub trait LogSink: Send + Sync {
    /// Record one informational line from the given stream.
    fn line(&self, stream: StreamKind, line: &str);
}

/// Sink that forwards lines to `tracing` under `svcwrap::stdout` and
/// `svcwrap::stderr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn line(&self, stream: StreamKind, line: &str) {
        match stream {
            StreamKind::Stdout => tracing::info!(target: "svcwrap::stdout", "{line}"),
            StreamKind::Stderr => tracing::info!(target: "svcwrap::stderr", "{line}"),
        }
    }
}
