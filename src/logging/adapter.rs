//! Byte stream to log line adapter.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};

use super::{LogSink, StreamKind};

/// Size of each read from a child output pipe.
const READ_CHUNK_SIZE: usize = 4096;

/// Lock shared by the stdout and stderr adapters of one supervisor.
///
/// Line extraction on both streams is serialized through it so that
/// interleaved output keeps a stable order in the sink.
pub type LogLock = Arc<Mutex<()>>;

/// Splits an unstructured byte stream into lines and forwards each one to a
/// [`LogSink`].
///
/// Bytes after the last line terminator are held until more input arrives
/// or [`flush`](Self::flush) is called.
pub struct LineLogAdapter {
    sink: Arc<dyn LogSink>,
    stream: StreamKind,
    lock: LogLock,
    buf: Vec<u8>,
}

impl LineLogAdapter {
    /// Create an adapter for one stream.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>, stream: StreamKind, lock: LogLock) -> Self {
        Self {
            sink,
            stream,
            lock,
            buf: Vec::new(),
        }
    }

    /// Which stream this adapter is attached to.
    #[must_use]
    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Bytes received but not yet emitted.
    #[must_use]
    pub fn residual(&self) -> &[u8] {
        &self.buf
    }

    /// Append bytes and emit every complete line.
    ///
    /// Always accepts the whole input.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.buf.extend_from_slice(bytes);

        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let mut line = &self.buf[start..end];
            while let [rest @ .., b'\r'] = line {
                line = rest;
            }
            self.sink
                .line(self.stream, &String::from_utf8_lossy(line));
            start = end + 1;
        }
        self.buf.drain(..start);

        bytes.len()
    }

    /// Emit any residual bytes as a final line.
    ///
    /// Does nothing if every received byte already belonged to a complete line.
    pub fn flush(&mut self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.buf.is_empty() {
            self.sink
                .line(self.stream, &String::from_utf8_lossy(&self.buf));
            self.buf.clear();
        }
    }

    /// Feed everything from `reader` through the adapter until EOF.
    ///
    /// A read error ends the pump. The adapter is handed back unflushed so
    /// the caller decides when the trailing partial line goes out.
    pub async fn consume<R>(mut self, mut reader: R) -> Self
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    self.write(&chunk[..n]);
                }
                Err(e) => {
                    tracing::warn!(stream = %self.stream, error = %e, "Failed to read output of supervised process");
                    break;
                }
            }
        }
        self
    }
}

impl std::fmt::Debug for LineLogAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineLogAdapter")
            .field("stream", &self.stream)
            .field("residual", &self.buf.len())
            .finish_non_exhaustive()
    }
}
