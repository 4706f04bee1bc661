//! svcwrap - Run an arbitrary daemon as a managed service.

pub mod config;
pub mod logging;
pub mod process;
pub mod service;
pub mod supervisor;
