//! Shared test doubles.

use std::sync::{Arc, Mutex};

use svcwrap::logging::{LogSink, StreamKind};
use svcwrap::process::ExitResult;
use svcwrap::supervisor::FatalHandler;

/// Sink that keeps every line in memory.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(StreamKind, String)>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<(StreamKind, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn stream(&self, stream: StreamKind) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, line)| line)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn line(&self, stream: StreamKind, line: &str) {
        self.lines.lock().unwrap().push((stream, line.to_string()));
    }
}

/// Fatal handler that records instead of exiting the test binary.
#[derive(Default)]
pub struct RecordingFatal {
    exits: Mutex<Vec<bool>>,
}

impl RecordingFatal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// One entry per unexpected exit; `true` when the child exited cleanly.
    pub fn exits(&self) -> Vec<bool> {
        self.exits.lock().unwrap().clone()
    }
}

impl FatalHandler for RecordingFatal {
    fn unexpected_exit(&self, result: &ExitResult) {
        self.exits.lock().unwrap().push(result.is_ok());
    }
}
