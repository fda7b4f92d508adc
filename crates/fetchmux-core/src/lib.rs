//! # Fetchmux Core
//!
//! Multi-provider content fetching: documents and search results from
//! interchangeable backends behind one uniform, never-failing result contract.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Provider adapters** for a hosted document-reader/search API and a
//!   browser-automation crawler bridge
//! - **Rate limiting** with a sliding 60-second window per operation
//! - **Performance tracking** of per-provider success rate, latency and quality
//! - **Budget accounting** for the quota-limited provider
//! - **Caching** with a per-entry TTL
//! - **Selection policy** ordering providers for every request
//! - **Orchestration** with per-attempt timeout, panic isolation and fallback
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Reader and crawler adapters |
//! | [`budget`] | Daily/hourly usage budget |
//! | [`cache`] | TTL cache and key normalization |
//! | [`config`] | File and environment configuration |
//! | [`data_source`] | Adapter trait and the types crossing it |
//! | [`domain`] | Result models and timestamps |
//! | [`error`] | Configuration and validation errors |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`performance`] | Per-provider statistics |
//! | [`provider_policy`] | Provider ordering |
//! | [`retry`] | Backoff for transient HTTP failures |
//! | [`routing`] | The fetch orchestrator |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Sliding-window rate limiter |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fetchmux_core::{FetchConfig, FetchOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FetchConfig::default().apply_env()?;
//!     let orchestrator = FetchOrchestrator::from_config(config)?;
//!
//!     let page = orchestrator.fetch("https://example.com").await;
//!     if page.success {
//!         println!("{} words via {}", page.word_count, page.provider_used);
//!     }
//!
//!     orchestrator.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  CLI / Caller    │
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ FetchOrchestrator│────▶│ Cache / Limiter  │
//! └────────┬─────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ SelectionPolicy  │◀────│ Stats / Budget   │
//! └────────┬─────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ ProviderAdapter  │────▶│ HTTP / Bridge    │
//! │ (reader/crawler) │     │ process          │
//! └──────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Request-time problems never surface as `Err`: they become results with
//! `success == false`. Only configuration is fallible:
//!
//! ```rust
//! use fetchmux_core::{ConfigError, FetchConfig, FetchOrchestrator};
//!
//! let mut config = FetchConfig::default();
//! config.reader.enabled = false;
//! config.crawler.enabled = false;
//!
//! let error = FetchOrchestrator::from_config(config).err();
//! assert_eq!(error, Some(ConfigError::NoProvidersEnabled));
//! ```
//!
//! ## Security
//!
//! - The reader API key is read from config or environment and never logged
//!   or serialized
//! - The crawler bridge runs as a child process killed when its adapter drops

pub mod adapters;
pub mod budget;
pub mod cache;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod performance;
pub mod provider_policy;
pub mod retry;
pub mod routing;
pub mod source;
pub mod throttling;

// Adapter implementations
pub use adapters::{BrowserCrawlAdapter, DocumentReaderAdapter};

// Budget
pub use budget::{BudgetState, BudgetThresholds, BudgetTracker, HourMarker};

// Caching
pub use cache::{normalize_query, normalize_url, CacheKey, CacheMode, CacheStore, CachedPayload};

// Configuration
pub use config::{CrawlerConfig, FetchConfig, ReaderConfig};

// Adapter trait and types
pub use data_source::{
    AdapterFuture, CapabilitySet, FetchedDocument, Operation, ProviderAdapter, ProviderError,
    ProviderErrorKind,
};

// Domain models
pub use domain::{
    count_words, quality_from_word_count, FetchResult, SearchResponse, SearchResult, UtcDateTime,
    FULL_QUALITY_WORD_COUNT,
};

// Error types
pub use error::{ConfigError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Performance tracking
pub use performance::{AttemptOutcome, PerformanceTracker, ProviderStats};

// Provider selection
pub use provider_policy::{Candidate, SelectionContext, SelectionPolicy, SourceStrategy};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Orchestration
pub use routing::{FetchOptions, FetchOrchestrator, FetchOrchestratorBuilder};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::{OperationLimits, RateLimiter, RATE_WINDOW};
