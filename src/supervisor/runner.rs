//! Supervisor for a single long-running child process.
//!
//! `start` spawns the child and two background tasks: a wait-watcher that
//! owns the child and reports its exit, and the control loop. `stop` posts a
//! request to the control loop and waits for it to confirm the exit.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::WrapperConfig;
use crate::logging::{LineLogAdapter, LogLock, LogSink, StreamKind};
use crate::process::{ChildProcess, ChildProcessBuilder, ExitResult, SpawnError};
use crate::supervisor::{
    ControlEvent, ControlLoop, FatalHandler, ProcessExit, StateMachine, SupervisorState,
    Terminate, CONTROL_CHANNEL_CAPACITY,
};

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// `start` was already called on this supervisor.
    #[error("Supervisor already started")]
    AlreadyStarted,
    /// `stop` was called before a successful `start`.
    #[error("Supervisor not started")]
    NotStarted,
    /// The child process could not be spawned.
    #[error("Could not start supervised service: {0}")]
    Spawn(#[from] SpawnError),
    /// The control loop ended before answering.
    #[error("Control loop exited before the stop completed")]
    ControlLoopExited,
}

type KillReply = oneshot::Sender<std::io::Result<()>>;

/// Routes kill requests to the watcher task, which owns the child.
#[derive(Debug, Clone)]
pub struct KillHandle {
    tx: mpsc::Sender<KillReply>,
}

#[async_trait]
impl Terminate for KillHandle {
    async fn kill(&self) -> std::io::Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let gone = || std::io::Error::other("supervised process already reaped");
        self.tx.send(reply_tx).await.map_err(|_| gone())?;
        reply_rx.await.map_err(|_| gone())?
    }
}

/// Supervisor for one child process.
///
/// Lifecycle: `Idle -> Running -> Stopping -> Stopped`, or
/// `Running -> FatalExit` when the child dies on its own. A supervisor is
/// started at most once.
pub struct Supervisor {
    config: WrapperConfig,
    sink: Arc<dyn LogSink>,
    fatal: Arc<dyn FatalHandler>,
    log_lock: LogLock,
    state: Arc<StateMachine>,
    ctl_tx: mpsc::Sender<ControlEvent>,
    ctl_rx: Option<mpsc::Receiver<ControlEvent>>,
    watcher: Option<JoinHandle<()>>,
    started: bool,
}

impl Supervisor {
    /// Create a supervisor. Nothing is validated until `start`.
    #[must_use]
    pub fn new(config: WrapperConfig, sink: Arc<dyn LogSink>) -> Self {
        let (ctl_tx, ctl_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);

        tracing::debug!("Supervisor instantiated");
        Self {
            config,
            sink,
            fatal: Arc::new(ProcessExit),
            log_lock: LogLock::default(),
            state: Arc::new(StateMachine::new()),
            ctl_tx,
            ctl_rx: Some(ctl_rx),
            watcher: None,
            started: false,
        }
    }

    /// Replace the reaction to an unexpected child exit.
    ///
    /// Defaults to [`ProcessExit`].
    #[must_use]
    pub fn with_fatal_handler(mut self, fatal: Arc<dyn FatalHandler>) -> Self {
        self.fatal = fatal;
        self
    }

    /// The configuration this supervisor was built with.
    #[must_use]
    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state.state()
    }

    /// Watch lifecycle transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Spawn the child and the background tasks, then return.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Spawn` if the child cannot be spawned, in
    /// which case no background task is started, and
    /// `SupervisorError::AlreadyStarted` on a second call.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        tracing::debug!("Starting supervisor...");
        let ctl_rx = self.ctl_rx.take().ok_or(SupervisorError::AlreadyStarted)?;

        let builder = ChildProcessBuilder::from_config(&self.config);
        let mut process = ChildProcess::spawn(&builder).map_err(|e| {
            tracing::error!(error = %e, program = %self.config.run, "Could not start service to be supervised");
            SupervisorError::Spawn(e)
        })?;
        tracing::info!(pid = ?process.id(), program = %self.config.run, "Supervised service started");

        let mut pumps = Vec::with_capacity(2);
        if self.config.capture_stdout {
            tracing::debug!("Stdout capture is enabled");
            if let Some(stdout) = process.take_stdout() {
                pumps.push(self.spawn_pump(StreamKind::Stdout, stdout));
            }
        }
        if self.config.capture_stderr {
            tracing::debug!("Stderr capture is enabled");
            if let Some(stderr) = process.take_stderr() {
                pumps.push(self.spawn_pump(StreamKind::Stderr, stderr));
            }
        }

        let (kill_tx, kill_rx) = mpsc::channel(1);
        self.state.transition(SupervisorState::Running);
        self.started = true;

        let control = ControlLoop::new(
            ctl_rx,
            KillHandle { tx: kill_tx },
            self.fatal.clone(),
            self.state.clone(),
        );
        tokio::spawn(async move {
            if let Err(fault) = control.run().await {
                tracing::debug!(%fault, "Control loop ended");
            }
        });

        self.watcher = Some(tokio::spawn(watch_child(
            process,
            kill_rx,
            self.ctl_tx.clone(),
            pumps,
        )));

        Ok(())
    }

    fn spawn_pump<R>(&self, stream: StreamKind, reader: R) -> JoinHandle<LineLogAdapter>
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let adapter = LineLogAdapter::new(self.sink.clone(), stream, self.log_lock.clone());
        tokio::spawn(adapter.consume(reader))
    }

    /// Stop the child and wait until its exit has been observed.
    ///
    /// The child's exit result is only logged. A completed stop returns
    /// `Ok(())` whether or not the child exited cleanly. There is no
    /// timeout: if the child never exits this never returns.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::NotStarted` before a successful `start` and
    /// `SupervisorError::ControlLoopExited` if the control loop ended without
    /// answering (for example on overlapping stop calls).
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        tracing::debug!("Processing request to stop supervised process...");
        match self.request_stop().await? {
            Err(e) => {
                tracing::info!(error = %e, "Request to stop supervised process completed with error");
            }
            Ok(()) => tracing::info!("Request to stop supervised process completed"),
        }
        Ok(())
    }

    async fn request_stop(&self) -> Result<ExitResult, SupervisorError> {
        if !self.started {
            return Err(SupervisorError::NotStarted);
        }

        let (done_tx, done_rx) = oneshot::channel();
        self.ctl_tx
            .send(ControlEvent::StopRequested(done_tx))
            .await
            .map_err(|_| SupervisorError::ControlLoopExited)?;
        done_rx.await.map_err(|_| SupervisorError::ControlLoopExited)
    }

    /// Wait until the child has exited and its output has been flushed.
    ///
    /// Returns immediately if the supervisor was never started.
    pub async fn wait_for_exit(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            if let Err(e) = watcher.await {
                tracing::warn!(error = %e, "Watcher task failed");
            }
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .field("state", &self.state.state())
            .finish_non_exhaustive()
    }
}

/// Wait for the child to exit, serving kill requests meanwhile, then report
/// the exit to the control loop and flush captured output.
async fn watch_child(
    mut process: ChildProcess,
    mut kill_rx: mpsc::Receiver<KillReply>,
    events: mpsc::Sender<ControlEvent>,
    pumps: Vec<JoinHandle<LineLogAdapter>>,
) {
    let result = loop {
        tokio::select! {
            result = process.wait() => break result,
            Some(reply) = kill_rx.recv() => {
                tracing::debug!(pid = ?process.id(), "Killing supervised process");
                let _ = reply.send(process.start_kill());
            }
        }
    };
    drop(kill_rx);
    tracing::debug!(clean = result.is_ok(), "Supervised process exited");

    if events.send(ControlEvent::Terminated(result)).await.is_err() {
        tracing::debug!("Control loop gone, exit not reported");
    }

    for pump in pumps {
        match pump.await {
            Ok(mut adapter) => adapter.flush(),
            Err(e) => tracing::warn!(error = %e, "Output pump failed"),
        }
    }
}
