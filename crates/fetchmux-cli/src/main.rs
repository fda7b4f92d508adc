mod cli;
mod commands;
mod error;
mod metadata;
mod output;

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;
use crate::metadata::Metadata;
use crate::output::Envelope;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let started = Instant::now();
    let orchestrator = commands::build_orchestrator(&cli)?;
    let outcome = commands::run(&cli, &orchestrator).await;
    orchestrator.close().await;
    let result = outcome?;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let envelope = Envelope {
        meta: Metadata::new(latency_ms),
        data: result.data,
        stats: result.stats,
    };
    output::render(&envelope, cli.pretty)?;

    if !result.success {
        return Ok(ExitCode::from(3));
    }

    Ok(ExitCode::SUCCESS)
}

/// Logs go to stderr; stdout carries only the JSON envelope.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "warn,fetchmux_core=debug,fetchmux=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
