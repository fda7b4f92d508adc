use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::adapters::{BrowserCrawlAdapter, DocumentReaderAdapter};
use crate::cache::{normalize_url, CacheKey, CacheMode, CacheStore, CachedPayload};
use crate::data_source::{AdapterFuture, FetchedDocument, Operation, ProviderAdapter, ProviderError};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::performance::{AttemptOutcome, PerformanceTracker, ProviderStats};
use crate::provider_policy::{Candidate, SelectionContext, SelectionPolicy, SourceStrategy};
use crate::throttling::OperationLimits;
use crate::{
    count_words, quality_from_word_count, BudgetState, BudgetTracker, ConfigError, FetchConfig,
    FetchResult, ProviderId, SearchResponse, SearchResult, ValidationError,
};

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FetchOptions {
    pub strategy: SourceStrategy,
    pub cache_mode: CacheMode,
    /// Overrides the configured quality-comparison switch for this call.
    pub compare_quality: Option<bool>,
}

impl FetchOptions {
    pub fn with_strategy(mut self, strategy: SourceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn with_quality_comparison(mut self, enabled: bool) -> Self {
        self.compare_quality = Some(enabled);
        self
    }
}

/// Builds a [`FetchOrchestrator`] from a [`FetchConfig`].
///
/// Enabled providers without an explicitly supplied adapter get the
/// production one: [`DocumentReaderAdapter`] over reqwest for the reader,
/// [`BrowserCrawlAdapter`] for the crawler.
///
/// ```rust,ignore
/// use fetchmux_core::{FetchConfig, FetchOrchestrator};
///
/// let config = FetchConfig::default().apply_env()?;
/// let orchestrator = FetchOrchestrator::builder().with_config(config).build()?;
/// let result = orchestrator.fetch("https://example.com").await;
/// orchestrator.close().await;
/// ```
#[derive(Default)]
pub struct FetchOrchestratorBuilder {
    config: FetchConfig,
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl FetchOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `adapter` for its provider instead of the production adapter.
    /// Whether the provider is enabled is still decided by the config.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.id(), adapter);
        self
    }

    /// Transport for the production reader adapter.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn build(mut self) -> Result<FetchOrchestrator, ConfigError> {
        self.config.validate()?;
        let config = self.config;
        let enabled = config.enabled_providers();

        let mut adapters = HashMap::with_capacity(enabled.len());
        let mut timeouts = HashMap::with_capacity(enabled.len());
        for provider in &enabled {
            let adapter: Arc<dyn ProviderAdapter> = match self.adapters.remove(provider) {
                Some(adapter) => adapter,
                None => match provider {
                    ProviderId::Reader => {
                        let http_client = self
                            .http_client
                            .clone()
                            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
                        Arc::new(DocumentReaderAdapter::new(http_client, &config.reader))
                    }
                    ProviderId::Crawler => Arc::new(BrowserCrawlAdapter::new(&config.crawler)),
                },
            };
            adapters.insert(*provider, adapter);
            timeouts.insert(*provider, config.timeout_for(*provider));
        }

        info!(
            providers = ?enabled,
            cache_ttl_secs = config.cache_ttl_secs,
            "fetch orchestrator ready"
        );

        Ok(FetchOrchestrator {
            adapters,
            timeouts,
            policy: SelectionPolicy::new(config.performance_threshold),
            limits: OperationLimits::new(
                config.read_requests_per_minute,
                config.search_requests_per_minute,
            ),
            performance: PerformanceTracker::new(),
            budget: BudgetTracker::new(BudgetState::new(
                config.daily_budget_limit,
                config.hourly_budget_limit,
                config.budget_thresholds(),
            )),
            cache: CacheStore::new(config.cache_ttl()),
            read_cost_units: config.read_cost_units,
            search_cost_units: config.search_cost_units,
            quality_comparison: config.quality_comparison,
            enabled,
        })
    }
}

/// Entry point for fetching documents and running searches across providers.
///
/// Every call returns a uniform result; provider errors, timeouts and panics
/// are absorbed into fallback and, if nothing succeeds, a result with
/// `success == false`. One orchestrator is meant to be shared by reference
/// across concurrent calls and closed once with [`close`](Self::close).
pub struct FetchOrchestrator {
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
    timeouts: HashMap<ProviderId, Duration>,
    /// Enabled providers in priority order.
    enabled: Vec<ProviderId>,
    policy: SelectionPolicy,
    limits: OperationLimits,
    performance: PerformanceTracker,
    budget: BudgetTracker,
    cache: CacheStore,
    read_cost_units: u64,
    search_cost_units: u64,
    quality_comparison: bool,
}

/// Outcome of walking a provider chain.
enum RouteOutcome<T> {
    Success {
        provider: ProviderId,
        value: T,
        elapsed: Duration,
    },
    Failure {
        provider: ProviderId,
        message: String,
        elapsed: Duration,
    },
}

impl FetchOrchestrator {
    pub fn builder() -> FetchOrchestratorBuilder {
        FetchOrchestratorBuilder::new()
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn from_config(config: FetchConfig) -> Result<Self, ConfigError> {
        FetchOrchestratorBuilder::new().with_config(config).build()
    }

    pub fn enabled_providers(&self) -> &[ProviderId] {
        &self.enabled
    }

    pub async fn fetch(&self, url: &str) -> FetchResult {
        self.fetch_with(url, FetchOptions::default()).await
    }

    pub async fn fetch_with(&self, url: &str, options: FetchOptions) -> FetchResult {
        let normalized = match normalize_url(url) {
            Ok(normalized) => normalized,
            Err(error) => return self.rejected_fetch(url, &error),
        };

        let key = CacheKey::read(normalized.as_str());
        if options.cache_mode.reads() {
            if let Some(CachedPayload::Document(hit)) = self.cache.get(&key).await {
                debug!(url = %normalized, provider = %hit.provider_used, "cache hit");
                return hit.into_cached();
            }
            debug!(url = %normalized, "cache miss");
        }

        self.limits.for_operation(Operation::Read).wait_if_needed().await;

        let chain = self.provider_chain(Operation::Read, options.strategy);
        debug!(url = %normalized, chain = ?chain, "provider order");

        let target = normalized.as_str();
        let outcome = self
            .route(
                Operation::Read,
                &chain,
                |adapter, timeout| fetch_non_empty(adapter, target, timeout),
                |document: &FetchedDocument| quality_from_word_count(count_words(&document.content)),
            )
            .await;

        match outcome {
            RouteOutcome::Success {
                provider,
                value,
                elapsed,
            } => {
                let result = FetchResult::success(
                    normalized.as_str(),
                    provider,
                    value.content,
                    value.title,
                    millis(elapsed),
                );

                if options.compare_quality.unwrap_or(self.quality_comparison) {
                    self.compare_quality(&result).await;
                }
                if options.cache_mode.writes() {
                    self.cache
                        .put(key, CachedPayload::Document(result.clone()))
                        .await;
                }
                result
            }
            RouteOutcome::Failure {
                provider,
                message,
                elapsed,
            } => {
                warn!(url = %normalized, error = %message, "all providers failed");
                FetchResult::failure(normalized, provider, message, millis(elapsed))
            }
        }
    }

    /// Fetches every URL concurrently; results keep the input order.
    pub async fn fetch_many<S: AsRef<str>>(&self, urls: &[S]) -> Vec<FetchResult> {
        self.fetch_many_with(urls, FetchOptions::default()).await
    }

    pub async fn fetch_many_with<S: AsRef<str>>(
        &self,
        urls: &[S],
        options: FetchOptions,
    ) -> Vec<FetchResult> {
        join_all(urls.iter().map(|url| self.fetch_with(url.as_ref(), options))).await
    }

    pub async fn search(&self, query: &str, max_results: usize) -> SearchResponse {
        self.search_with(query, max_results, FetchOptions::default())
            .await
    }

    pub async fn search_with(
        &self,
        query: &str,
        max_results: usize,
        options: FetchOptions,
    ) -> SearchResponse {
        let query = query.trim();
        if query.is_empty() {
            return self.rejected_search(query, &ValidationError::EmptyQuery);
        }
        if max_results == 0 {
            return self.rejected_search(query, &ValidationError::ZeroResultLimit);
        }

        let key = CacheKey::search(query, max_results);
        if options.cache_mode.reads() {
            if let Some(CachedPayload::Search(hit)) = self.cache.get(&key).await {
                debug!(query, provider = %hit.provider_used, "cache hit");
                return hit.into_cached();
            }
            debug!(query, "cache miss");
        }

        self.limits
            .for_operation(Operation::Search)
            .wait_if_needed()
            .await;

        let chain = self.provider_chain(Operation::Search, options.strategy);
        debug!(query, chain = ?chain, "provider order");

        let outcome = self
            .route(
                Operation::Search,
                &chain,
                |adapter, timeout| adapter.search(query, max_results, timeout),
                |results: &Vec<SearchResult>| {
                    (results.len() as f64 / max_results as f64).min(1.0)
                },
            )
            .await;

        match outcome {
            RouteOutcome::Success {
                provider,
                value,
                elapsed,
            } => {
                let response =
                    SearchResponse::success(query, provider, value, max_results, millis(elapsed));
                if options.cache_mode.writes() {
                    self.cache
                        .put(key, CachedPayload::Search(response.clone()))
                        .await;
                }
                response
            }
            RouteOutcome::Failure {
                provider,
                message,
                elapsed,
            } => {
                warn!(query, error = %message, "all providers failed");
                SearchResponse::failure(query, provider, message, millis(elapsed))
            }
        }
    }

    /// Order in which providers would be tried for `operation` right now.
    pub fn provider_chain(&self, operation: Operation, strategy: SourceStrategy) -> Vec<ProviderId> {
        let candidates = self
            .enabled
            .iter()
            .filter_map(|provider| {
                let adapter = self.adapters.get(provider)?;
                adapter.capabilities().supports(operation).then(|| Candidate {
                    provider: *provider,
                    quota_limited: adapter.quota_limited(),
                    stats: self.performance.snapshot(*provider),
                })
            })
            .collect::<Vec<_>>();
        let budget = self.budget.snapshot();

        self.policy.order(&SelectionContext {
            strategy,
            candidates: &candidates,
            budget: &budget,
        })
    }

    /// Stats for every enabled provider, including untried ones.
    pub fn provider_stats(&self) -> Vec<ProviderStats> {
        self.enabled
            .iter()
            .map(|provider| self.performance.snapshot(*provider))
            .collect()
    }

    pub fn budget(&self) -> BudgetState {
        self.budget.snapshot()
    }

    pub fn remaining_requests(&self, operation: Operation) -> u32 {
        self.limits.for_operation(operation).remaining()
    }

    /// Drops every cache entry, returning how many were removed.
    pub async fn clear_cache(&self) -> usize {
        let removed = self.cache.clear().await;
        info!(removed, "cache cleared");
        removed
    }

    /// Releases adapter resources such as the crawler bridge process.
    pub async fn close(&self) {
        for provider in &self.enabled {
            if let Some(adapter) = self.adapters.get(provider) {
                adapter.close().await;
            }
        }
        info!("fetch orchestrator closed");
    }

    async fn route<'r, T, F, Q>(
        &'r self,
        operation: Operation,
        chain: &[ProviderId],
        invoke: F,
        quality: Q,
    ) -> RouteOutcome<T>
    where
        F: Fn(&'r dyn ProviderAdapter, Duration) -> AdapterFuture<'r, Result<T, ProviderError>>,
        Q: Fn(&T) -> f64,
    {
        let started = Instant::now();
        let mut last_attempted = None;
        let mut last_error = None;

        for provider in chain.iter().copied() {
            let Some(adapter) = self.adapters.get(&provider) else {
                debug!(%provider, %operation, "skipping provider that is not enabled");
                last_error = Some((provider, ProviderError::not_enabled(provider)));
                continue;
            };
            if !adapter.capabilities().supports(operation) {
                debug!(%provider, %operation, "skipping provider without capability");
                last_error = Some((provider, ProviderError::unsupported(operation)));
                continue;
            }

            last_attempted = Some(provider);
            let attempt_started = Instant::now();
            let result = self
                .attempt(provider, adapter.as_ref(), operation, |timeout| {
                    invoke(adapter.as_ref(), timeout)
                })
                .await;
            let elapsed = attempt_started.elapsed();

            match result {
                Ok(value) => {
                    let quality_score = quality(&value);
                    self.performance.record_attempt(
                        provider,
                        AttemptOutcome::Success { quality_score },
                        elapsed,
                    );
                    info!(
                        %provider,
                        %operation,
                        elapsed_ms = millis(elapsed),
                        quality_score,
                        "provider attempt succeeded"
                    );
                    return RouteOutcome::Success {
                        provider,
                        value,
                        elapsed,
                    };
                }
                Err(error) => {
                    self.performance
                        .record_attempt(provider, AttemptOutcome::Failure, elapsed);
                    warn!(
                        %provider,
                        %operation,
                        code = error.code(),
                        retryable = error.retryable(),
                        error = error.message(),
                        "provider attempt failed"
                    );
                    last_error = Some((provider, error));
                }
            }
        }

        let message = match &last_error {
            Some((provider, error)) => format!("{provider}: {}", error.message()),
            None => format!("no provider available for {operation}"),
        };
        let provider = last_attempted
            .or_else(|| chain.first().copied())
            .unwrap_or(self.policy.default_provider);

        RouteOutcome::Failure {
            provider,
            message,
            elapsed: started.elapsed(),
        }
    }

    /// One guarded adapter call: budget charge, timeout and panic isolation.
    /// Adapters that enforce the timeout themselves are not wrapped in a
    /// second one, so time spent queued inside them does not count.
    async fn attempt<T, F, Fut>(
        &self,
        provider: ProviderId,
        adapter: &dyn ProviderAdapter,
        operation: Operation,
        call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnOnce(Duration) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        if adapter.quota_limited() {
            self.budget.record_usage(self.cost_units(operation));
        }

        let timeout = self.timeout_for(provider);
        let guarded = AssertUnwindSafe(async move { call(timeout).await }).catch_unwind();

        let outcome = if adapter.enforces_timeout() {
            Ok(guarded.await)
        } else {
            tokio::time::timeout(timeout, guarded).await
        };

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(ProviderError::internal(format!(
                "adapter panicked: {}",
                panic_message(payload.as_ref())
            ))),
            Err(_) => Err(ProviderError::timeout(timeout)),
        }
    }

    /// Best-effort read of the same URL from another provider. The outcome
    /// feeds the stats only; the primary result is returned unchanged. The
    /// read takes a slot from the read limiter and is skipped when none is
    /// free.
    async fn compare_quality(&self, primary: &FetchResult) {
        let Some((provider, adapter)) = self.enabled.iter().find_map(|provider| {
            let adapter = self.adapters.get(provider)?;
            (*provider != primary.provider_used && adapter.capabilities().supports(Operation::Read))
                .then_some((*provider, adapter))
        }) else {
            debug!(url = %primary.url, "no second provider for quality comparison");
            return;
        };

        if !self.limits.for_operation(Operation::Read).try_acquire() {
            debug!(url = %primary.url, secondary = %provider, "read ceiling reached, skipping quality comparison");
            return;
        }

        let url = primary.url.as_str();
        let started = Instant::now();
        let result = self
            .attempt(provider, adapter.as_ref(), Operation::Read, |timeout| {
                fetch_non_empty(adapter.as_ref(), url, timeout)
            })
            .await;
        let elapsed = started.elapsed();

        match result {
            Ok(document) => {
                let quality_score = quality_from_word_count(count_words(&document.content));
                self.performance.record_attempt(
                    provider,
                    AttemptOutcome::Success { quality_score },
                    elapsed,
                );
                info!(
                    url = %primary.url,
                    primary = %primary.provider_used,
                    primary_quality = primary.quality_score,
                    secondary = %provider,
                    secondary_quality = quality_score,
                    "quality comparison"
                );
            }
            Err(error) => {
                self.performance
                    .record_attempt(provider, AttemptOutcome::Failure, elapsed);
                debug!(url = %primary.url, secondary = %provider, error = %error, "comparison fetch failed");
            }
        }
    }

    fn rejected_fetch(&self, url: &str, error: &ValidationError) -> FetchResult {
        warn!(url, error = %error, "rejected fetch request");
        FetchResult::failure(url.trim(), self.head_provider(), error.to_string(), 0)
    }

    fn rejected_search(&self, query: &str, error: &ValidationError) -> SearchResponse {
        warn!(query, error = %error, "rejected search request");
        SearchResponse::failure(query, self.head_provider(), error.to_string(), 0)
    }

    fn head_provider(&self) -> ProviderId {
        self.enabled
            .first()
            .copied()
            .unwrap_or(self.policy.default_provider)
    }

    fn timeout_for(&self, provider: ProviderId) -> Duration {
        self.timeouts
            .get(&provider)
            .copied()
            .unwrap_or(Duration::from_secs(30))
    }

    fn cost_units(&self, operation: Operation) -> u64 {
        match operation {
            Operation::Read => self.read_cost_units,
            Operation::Search => self.search_cost_units,
        }
    }
}

/// Reads `url`, treating blank content as a provider failure.
fn fetch_non_empty<'a>(
    adapter: &'a dyn ProviderAdapter,
    url: &'a str,
    timeout: Duration,
) -> AdapterFuture<'a, Result<FetchedDocument, ProviderError>> {
    Box::pin(async move {
        let document = adapter.fetch(url, timeout).await?;
        if document.content.trim().is_empty() {
            return Err(ProviderError::empty_content());
        }
        Ok(document)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic payload")
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
