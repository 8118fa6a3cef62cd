//! procvisor: supervise the programs declared in a YAML file.
//!
//! # Usage
//!
//! ```bash
//! procvisor --config programs.yaml
//! procvisor --config programs.yaml --log-file procvisor.log --refresh 5
//! RUST_LOG=procvisor=debug procvisor --no-console
//! ```
//!
//! Commands are read from stdin (`help` lists them). `SIGINT`, `SIGTERM` and
//! `SIGQUIT` stop every managed process before exiting.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt};

use procvisor::{Console, LogWriter, Supervisor, SupervisorConfig};

#[derive(Parser)]
#[command(name = "procvisor")]
#[command(about = "Single-host process supervisor", long_about = None)]
#[command(version)]
struct Cli {
    /// Program file to load (and re-read on `reload`)
    #[arg(short, long, default_value = "procvisor.yaml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the program list every N seconds
    #[arg(long)]
    refresh: Option<u64>,

    /// Do not read commands from stdin
    #[arg(long)]
    no_console: bool,

    /// Seconds added to the longest stoptime when shutting down
    #[arg(long, default_value_t = 1)]
    shutdown_slack: u64,
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level)
            .with_context(|| format!("invalid log level `{}`", cli.log_level))?,
    };
    let builder = fmt().with_env_filter(filter).with_target(true);

    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let programs = procvisor::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!(
        config = %cli.config.display(),
        programs = programs.len(),
        "starting supervisor"
    );

    let cfg = SupervisorConfig {
        shutdown_slack: Duration::from_secs(cli.shutdown_slack),
        ..SupervisorConfig::default()
    };
    let sup = Supervisor::builder(cfg)
        .with_subscribers(vec![Arc::new(LogWriter::new())])
        .build();
    let handle = sup.handle();
    let core = tokio::spawn(sup.run(programs));

    if !cli.no_console {
        let console = Console::new(handle, cli.config.clone(), tokio::io::stdout())
            .with_refresh(cli.refresh.map(Duration::from_secs));
        tokio::spawn(async move {
            if let Err(err) = console.run(BufReader::new(tokio::io::stdin())).await {
                tracing::warn!(error = %err, "console stopped");
            }
        });
    }

    core.await.context("supervisor task failed")??;
    tracing::info!("all processes stopped");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(&cli) {
        eprintln!("procvisor: {err:#}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("procvisor: cannot start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(cli));
    // A pending stdin read cannot be cancelled; do not wait for it.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "procvisor failed");
            eprintln!("procvisor: {err:#}");
            ExitCode::FAILURE
        }
    }
}
