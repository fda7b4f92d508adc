use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors. These are raised while building an orchestrator,
/// never while serving a request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("no providers are enabled")]
    NoProvidersEnabled,
    #[error("invalid provider '{value}', expected one of reader, crawler")]
    InvalidProvider { value: String },
    #[error("provider '{provider}' is listed more than once")]
    DuplicateProvider { provider: String },

    #[error("field '{field}' must be within 0..=100, got {value}")]
    PercentOutOfRange { field: &'static str, value: f64 },
    #[error("field '{field}' must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("field '{field}' is not a valid URL: '{value}'")]
    InvalidUrl { field: &'static str, value: String },
    #[error("crawler command must not be empty")]
    EmptyCrawlerCommand,

    #[error("environment variable '{name}' has an invalid value: '{value}'")]
    InvalidEnvValue { name: String, value: String },

    #[error("failed to read config file '{path}': {message}")]
    Read { path: PathBuf, message: String },
    #[error("failed to parse config file '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

/// Request input validation errors. The orchestrator reports these as failed
/// results rather than returning them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("url cannot be empty")]
    EmptyUrl,
    #[error("url '{value}' is not a valid http(s) URL")]
    InvalidUrl { value: String },
    #[error("search query cannot be empty")]
    EmptyQuery,
    #[error("max_results must be greater than zero")]
    ZeroResultLimit,
}
