//! Supervisor module: lifecycle state machine and control loop.

mod control;
mod fatal;
mod runner;
mod state;

pub use control::*;
pub use fatal::*;
pub use runner::*;
pub use state::*;
