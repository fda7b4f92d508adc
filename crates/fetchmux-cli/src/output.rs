use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;
use crate::metadata::Metadata;

/// Top-level JSON document written to stdout.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub meta: Metadata,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
}

pub fn render(envelope: &Envelope, pretty: bool) -> Result<(), CliError> {
    println!("{}", to_json(envelope, pretty)?);
    Ok(())
}

fn to_json(envelope: &Envelope, pretty: bool) -> Result<String, CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    Ok(payload)
}
