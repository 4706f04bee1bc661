//! Escalation policy for an unexpected child exit.
//!
//! When the supervised child dies without a stop having been requested, the
//! whole wrapper exits with [`UNEXPECTED_EXIT_CODE`]. The external service
//! manager sees the failure and restarts the wrapper, which starts a fresh
//! child. The supervisor never restarts the child itself.

use crate::process::ExitResult;

/// Exit status of the wrapper when the child exits unexpectedly.
pub const UNEXPECTED_EXIT_CODE: i32 = 3;

/// Reaction to the child exiting with no stop pending.
pub trait FatalHandler: Send + Sync {
    /// Called once, after the unexpected exit has been logged.
    fn unexpected_exit(&self, result: &ExitResult);
}

/// Terminates the host process with [`UNEXPECTED_EXIT_CODE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl FatalHandler for ProcessExit {
    fn unexpected_exit(&self, _result: &ExitResult) {
        std::process::exit(UNEXPECTED_EXIT_CODE);
    }
}
