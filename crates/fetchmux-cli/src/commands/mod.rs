mod fetch;
mod search;

use fetchmux_core::{
    BudgetState, CacheMode, FetchConfig, FetchOptions, FetchOrchestrator, Operation,
    ProviderStats,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command, ProviderSelector};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    /// False when any request came back with `success == false`.
    pub success: bool,
    pub stats: Option<Value>,
}

#[derive(Debug, Serialize)]
struct StatsSnapshot {
    providers: Vec<ProviderStats>,
    budget: BudgetState,
    remaining_requests: RemainingRequests,
}

#[derive(Debug, Serialize)]
struct RemainingRequests {
    read: u32,
    search: u32,
}

/// Loads the config file (if any), overlays the environment and builds the
/// orchestrator.
pub fn build_orchestrator(cli: &Cli) -> Result<FetchOrchestrator, CliError> {
    let config = match &cli.config {
        Some(path) => FetchConfig::from_json_file(path)?,
        None => FetchConfig::default(),
    }
    .apply_env()?;

    Ok(FetchOrchestrator::from_config(config)?)
}

pub async fn run(cli: &Cli, orchestrator: &FetchOrchestrator) -> Result<CommandResult, CliError> {
    let options = fetch_options(cli);

    let (data, success) = match &cli.command {
        Command::Fetch(args) => fetch::run(args, orchestrator, options).await?,
        Command::Search(args) => search::run(args, orchestrator, options).await?,
    };

    let stats = if cli.stats {
        Some(serde_json::to_value(StatsSnapshot {
            providers: orchestrator.provider_stats(),
            budget: orchestrator.budget(),
            remaining_requests: RemainingRequests {
                read: orchestrator.remaining_requests(Operation::Read),
                search: orchestrator.remaining_requests(Operation::Search),
            },
        })?)
    } else {
        None
    };

    Ok(CommandResult {
        data,
        success,
        stats,
    })
}

fn fetch_options(cli: &Cli) -> FetchOptions {
    if cli.strict && cli.provider == ProviderSelector::Auto {
        debug!("--strict has no effect without --provider");
    }

    let mut options = FetchOptions::default()
        .with_strategy(cli.provider.strategy(cli.strict))
        .with_cache_mode(if cli.no_cache {
            CacheMode::Bypass
        } else {
            CacheMode::Use
        });
    if cli.compare {
        options = options.with_quality_comparison(true);
    }
    options
}
