//! Host service lifecycle glue.
//!
//! The host starts a [`Runnable`], keeps it running until a termination
//! signal arrives, then stops it.
//!
//! ## Signals
//! **Unix platforms:** `SIGINT`, `SIGTERM`, `SIGQUIT`
//!
//! **Other platforms:** Ctrl-C via [`tokio::signal::ctrl_c`]

use async_trait::async_trait;

use crate::supervisor::{Supervisor, SupervisorError};

/// Name and description the service is registered under.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    pub description: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: "svcwrap".to_string(),
            description: "Service hosting adapter".to_string(),
        }
    }
}

/// Something the host can start and stop.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Start running; returns once started.
    async fn start(&mut self) -> Result<(), SupervisorError>;

    /// Stop running; returns once stopped.
    async fn stop(&self) -> Result<(), SupervisorError>;
}

#[async_trait]
impl Runnable for Supervisor {
    async fn start(&mut self) -> Result<(), SupervisorError> {
        Supervisor::start(self)
    }

    async fn stop(&self) -> Result<(), SupervisorError> {
        Supervisor::stop(self).await
    }
}

/// Errors from running a service to completion.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Failed to start service: {0}")]
    Start(#[source] SupervisorError),
    #[error("Failed to stop service: {0}")]
    Stop(#[source] SupervisorError),
    #[error("Failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

/// Start `runnable`, wait for a termination signal, then stop it.
///
/// # Errors
///
/// Returns `ServiceError` if starting, signal registration, or stopping fails.
pub async fn run_service<R: Runnable + ?Sized>(
    info: &ServiceInfo,
    runnable: &mut R,
) -> Result<(), ServiceError> {
    runnable.start().await.map_err(ServiceError::Start)?;
    tracing::info!(service = %info.name, "Service started");

    let signal = wait_for_shutdown_signal().await;
    tracing::info!(service = %info.name, "Shutdown requested");

    let stopped = runnable.stop().await.map_err(ServiceError::Stop);
    signal?;
    stopped?;

    tracing::info!(service = %info.name, "Service stopped");
    Ok(())
}

/// Completes when the process receives a termination signal.
///
/// # Errors
///
/// Returns an error if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Completes when the process receives a termination signal.
///
/// # Errors
///
/// Returns an error if signal registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
