use fetchmux_core::{FetchOptions, FetchOrchestrator};
use serde_json::Value;

use crate::cli::SearchArgs;
use crate::error::CliError;

pub async fn run(
    args: &SearchArgs,
    orchestrator: &FetchOrchestrator,
    options: FetchOptions,
) -> Result<(Value, bool), CliError> {
    if args.limit == 0 {
        return Err(CliError::Usage(String::from(
            "--limit must be greater than zero",
        )));
    }

    let query = args.query.trim();
    if query.is_empty() {
        return Err(CliError::Usage(String::from("query must not be empty")));
    }

    let response = orchestrator.search_with(query, args.limit, options).await;
    let success = response.success;

    Ok((serde_json::to_value(response)?, success))
}
