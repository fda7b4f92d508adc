use fetchmux_core::{FetchOptions, FetchOrchestrator};
use serde_json::Value;

use crate::cli::FetchArgs;
use crate::error::CliError;

/// A single URL yields one result object; several yield an array in input
/// order.
pub async fn run(
    args: &FetchArgs,
    orchestrator: &FetchOrchestrator,
    options: FetchOptions,
) -> Result<(Value, bool), CliError> {
    let results = orchestrator.fetch_many_with(args.urls.as_slice(), options).await;
    let success = results.iter().all(|result| result.success);

    let data = match results.as_slice() {
        [single] => serde_json::to_value(single)?,
        _ => serde_json::to_value(&results)?,
    };

    Ok((data, success))
}
