//! COINOP kiosk binary.
//!
//! Loads the kiosk configuration, starts the kiosk service and runs one
//! front-end against it until the operator stops the process.

mod console;
mod demo_core;
mod web;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use coinop_core::error::ConfigError;
use coinop_core::session::DoneSignal;
use coinop_core::{KioskConfigExt, service};
use coinop_types::KioskConfig;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Coin-operated arcade kiosk")]
struct Cli {
    /// Front-end to drive the kiosk with
    #[arg(long, value_enum, default_value_t = Frontend::Web)]
    frontend: Frontend,

    /// Read configuration from this TOML file instead of the user store
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address the web front-end listens on
    #[arg(long)]
    bind: Option<String>,

    /// Session seconds granted per purchased minute
    #[arg(long)]
    seconds_per_minute: Option<u32>,

    /// Store the effective configuration in the user store before starting
    #[arg(long)]
    save_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Frontend {
    Web,
    Console,
}

/// Initialize logging.
///
/// With `COINOP_LOG_DIR` set, logs go to a daily rolling file there. The
/// console front-end owns the terminal, so it always logs to a file (the user
/// data directory when no override is given).
fn init_logging(frontend: Frontend) -> Option<WorkerGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    let log_dir = std::env::var_os("COINOP_LOG_DIR").map(PathBuf::from).or_else(|| {
        (frontend == Frontend::Console)
            .then(|| dirs::data_local_dir().map(|d| d.join("coinop").join("logs")))
            .flatten()
    });

    if let Some(dir) = log_dir {
        let appender = tracing_appender::rolling::daily(dir, "coinop.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .init();
        return Some(guard);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    None
}

fn load_config(cli: &Cli) -> Result<KioskConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => KioskConfig::load_from(path)?,
        None => KioskConfig::load(),
    };
    if let Some(seconds) = cli.seconds_per_minute {
        config.pricing.seconds_per_minute = seconds;
    }
    if let Some(bind) = &cli.bind {
        config.web.bind = bind.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.frontend);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if cli.save_config {
        match config.save() {
            Ok(()) => info!("Configuration saved to the user store"),
            Err(e) => warn!(error = %e, "Failed to save configuration"),
        }
    }
    if config.games.is_empty() {
        warn!("No games configured; the selection screen will be empty");
    }

    match run(cli.frontend, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Kiosk stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(frontend: Frontend, config: KioskConfig) -> Result<(), String> {
    let bind = config.web.bind.clone();
    let factory = demo_core::factory(config.engine.window);
    let (handle, service_task) = service::start(config, factory);

    let done = DoneSignal::new();
    {
        let done = done.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                done.close();
            }
        });
    }

    info!(?frontend, games = handle.games().len(), "Kiosk started");
    let result = match frontend {
        Frontend::Web => web::serve(handle.clone(), &bind, done.clone())
            .await
            .map_err(|e| format!("web front-end failed on {bind}: {e}")),
        Frontend::Console => console::run(handle.clone(), done.clone())
            .await
            .map_err(|e| format!("console front-end failed: {e}")),
    };

    done.close();
    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "Service already stopped");
    }
    if let Err(e) = service_task.await {
        error!(error = %e, "Kiosk service task failed");
    }
    info!("Kiosk stopped");
    result
}
