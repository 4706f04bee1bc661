//! svcwrap - Run an arbitrary daemon as a managed service.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use svcwrap::config::{ConfigLoader, WrapperConfig};
use svcwrap::logging::TracingSink;
use svcwrap::service::{run_service, ServiceInfo};
use svcwrap::supervisor::Supervisor;

#[derive(Parser)]
#[command(
    name = "svcwrap",
    about = "Run an arbitrary daemon as a managed service",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to service executable to spawn.
    #[arg(long)]
    run: Option<String>,

    /// Argument to pass to service executable (specify multiple times).
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Working directory to use for spawned service.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Capture stdout of supervised process and send it to the log.
    #[arg(long)]
    capture_stdout: bool,

    /// Capture stderr of supervised process and send it to the log.
    #[arg(long)]
    capture_stderr: bool,
}

impl Cli {
    /// Overlay command-line values on the file configuration.
    fn apply(self, mut config: WrapperConfig) -> WrapperConfig {
        if let Some(run) = self.run {
            config.run = run;
        }
        if !self.args.is_empty() {
            config.args = self.args;
        }
        if let Some(cwd) = self.cwd {
            config.cwd = Some(cwd);
        }
        config.capture_stdout |= self.capture_stdout;
        config.capture_stderr |= self.capture_stderr;
        config
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path.clone()),
        None => ConfigLoader::new(),
    };
    let config = match loader.load() {
        Ok(config) => cli.apply(config),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let info = ServiceInfo::default();
    tracing::info!(
        service = %info.name,
        description = %info.description,
        run = %config.run,
        args = ?config.args,
        "Starting service wrapper"
    );

    let mut supervisor = Supervisor::new(config, Arc::new(TracingSink));
    match run_service(&info, &mut supervisor).await {
        Ok(()) => {
            supervisor.wait_for_exit().await;
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Service wrapper failed");
            ExitCode::FAILURE
        }
    }
}
