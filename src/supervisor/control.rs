//! Control loop: the single authority over supervisor state transitions.
//!
//! The wait-watcher and `Supervisor::stop` never touch lifecycle state
//! directly. They post [`ControlEvent`]s into a bounded channel and this loop
//! consumes them one at a time, so the pending stop reply needs no lock.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::process::ExitResult;
use crate::supervisor::{FatalHandler, StateMachine, SupervisorState};

/// Capacity of the control channel: one in-flight stop plus one exit notice.
pub const CONTROL_CHANNEL_CAPACITY: usize = 2;

/// Message consumed by the control loop.
#[derive(Debug)]
pub enum ControlEvent {
    /// The child exited, with `Ok(())` for a clean exit.
    Terminated(ExitResult),
    /// A stop was requested; the child's exit result goes back on the sender.
    StopRequested(oneshot::Sender<ExitResult>),
}

/// Why the control loop stopped processing events.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFault {
    /// A second stop arrived while one was still pending.
    #[error("stop requested while another stop is pending")]
    ConcurrentStop,
    /// The child exited with no stop pending.
    #[error("supervised process exited unexpectedly")]
    UnexpectedExit,
}

/// Forcible termination of the supervised child.
#[async_trait]
pub trait Terminate: Send + Sync {
    /// Request a kill. Success means the request was delivered, not that the
    /// child has exited.
    async fn kill(&self) -> std::io::Result<()>;
}

/// Serial consumer of [`ControlEvent`]s for one supervisor.
pub struct ControlLoop<T> {
    events: mpsc::Receiver<ControlEvent>,
    terminator: T,
    fatal: Arc<dyn FatalHandler>,
    state: Arc<StateMachine>,
    pending_stop: Option<oneshot::Sender<ExitResult>>,
}

impl<T: Terminate> ControlLoop<T> {
    #[must_use]
    pub fn new(
        events: mpsc::Receiver<ControlEvent>,
        terminator: T,
        fatal: Arc<dyn FatalHandler>,
        state: Arc<StateMachine>,
    ) -> Self {
        Self {
            events,
            terminator,
            fatal,
            state,
            pending_stop: None,
        }
    }

    /// Process events until every sender is gone.
    ///
    /// # Errors
    ///
    /// Returns the [`ControlFault`] that ended the loop early.
    pub async fn run(mut self) -> Result<(), ControlFault> {
        while let Some(event) = self.events.recv().await {
            self.handle(event).await?;
        }
        tracing::debug!("Control channel closed, control loop exiting");
        Ok(())
    }

    async fn handle(&mut self, event: ControlEvent) -> Result<(), ControlFault> {
        match event {
            ControlEvent::Terminated(result) => self.on_terminated(result),
            ControlEvent::StopRequested(reply) => self.on_stop_requested(reply).await,
        }
    }

    fn on_terminated(&mut self, result: ExitResult) -> Result<(), ControlFault> {
        if let Some(reply) = self.pending_stop.take() {
            self.state.transition(SupervisorState::Stopped);
            if reply.send(result).is_err() {
                tracing::debug!("Stop requester went away before the exit was reported");
            }
            return Ok(());
        }

        match &result {
            Err(e) => {
                tracing::error!(error = %e, "Supervised service exited unexpectedly with error");
            }
            Ok(()) => tracing::error!("Supervised service exited unexpectedly without error"),
        }
        self.state.transition(SupervisorState::FatalExit);
        self.fatal.unexpected_exit(&result);
        Err(ControlFault::UnexpectedExit)
    }

    async fn on_stop_requested(
        &mut self,
        reply: oneshot::Sender<ExitResult>,
    ) -> Result<(), ControlFault> {
        if self.pending_stop.is_some() {
            tracing::error!("Stop requested while another stop is pending");
            self.state.transition(SupervisorState::Faulted);
            return Err(ControlFault::ConcurrentStop);
        }

        if self.state.state() == SupervisorState::Stopped {
            tracing::debug!("Stop requested after the supervised process already stopped");
            let _ = reply.send(Ok(()));
            return Ok(());
        }

        self.pending_stop = Some(reply);
        self.state.transition(SupervisorState::Stopping);

        if let Err(e) = self.terminator.kill().await {
            tracing::warn!(error = %e, "Failed to kill supervised process, continuing...");
        }
        Ok(())
    }
}
