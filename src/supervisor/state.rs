//! Supervisor state machine.

use tokio::sync::watch;

/// Lifecycle state of a supervisor.
///
/// `Running -> Stopping -> Stopped` is the expected path. `Running ->
/// FatalExit` happens when the child exits without a pending stop. There is
/// no transition back to `Running`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupervisorState {
    /// Constructed, not started.
    #[default]
    Idle,
    /// Child spawned and being watched.
    Running,
    /// Stop requested, kill issued, waiting for the child to exit.
    Stopping,
    /// Child exited after a stop request.
    Stopped,
    /// Child exited on its own; the host process is being torn down.
    FatalExit,
    /// Control loop ended on an internal contract violation.
    Faulted,
}

impl SupervisorState {
    /// Whether the child process has been observed to exit.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::FatalExit | Self::Faulted)
    }
}

/// Publishes state transitions to any number of observers.
#[derive(Debug)]
pub struct StateMachine {
    tx: watch::Sender<SupervisorState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SupervisorState::Idle);
        Self { tx }
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.tx.subscribe()
    }

    pub fn transition(&self, new_state: SupervisorState) {
        let old = self.tx.send_replace(new_state);
        tracing::debug!(from = ?old, to = ?new_state, "State transition");
    }
}
