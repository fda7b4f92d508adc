//! Provider adapter contract and the types crossing it.
//!
//! Every backend implements [`ProviderAdapter`]. Adapters normalize whatever
//! their transport returns into a [`FetchedDocument`] or a list of
//! [`SearchResult`]s, and report every problem as a [`ProviderError`]. The
//! orchestrator never inspects backend response shapes.
//!
//! # Operations
//!
//! | Operation | Adapter method | Orchestrator result |
//! |-----------|----------------|---------------------|
//! | Read | [`ProviderAdapter::fetch`] | [`FetchResult`](crate::FetchResult) |
//! | Search | [`ProviderAdapter::search`] | [`SearchResponse`](crate::SearchResponse) |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ProviderId, SearchResult};

/// Boxed future returned by adapter calls.
pub type AdapterFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operation kind, used for rate limiting, cache keys and capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Search,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Search => "search",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported operation matrix for an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub read: bool,
    pub search: bool,
}

impl CapabilitySet {
    pub const fn new(read: bool, search: bool) -> Self {
        Self { read, search }
    }

    pub const fn full() -> Self {
        Self::new(true, true)
    }

    pub const fn supports(self, operation: Operation) -> bool {
        match operation {
            Operation::Read => self.read,
            Operation::Search => self.search,
        }
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Timeout,
    Transport,
    RateLimited,
    InvalidResponse,
    EmptyContent,
    Unsupported,
    NotEnabled,
    Internal,
}

/// Structured adapter error. Always absorbed by the orchestrator and turned
/// into a failure record plus fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    retryable: bool,
}

impl ProviderError {
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: ProviderErrorKind::Timeout,
            message: format!("timed out after {} ms", after.as_millis()),
            retryable: true,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transport,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::InvalidResponse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn empty_content() -> Self {
        Self {
            kind: ProviderErrorKind::EmptyContent,
            message: String::from("provider returned empty content"),
            retryable: false,
        }
    }

    pub fn unsupported(operation: Operation) -> Self {
        Self {
            kind: ProviderErrorKind::Unsupported,
            message: format!("operation '{operation}' is not supported by this provider"),
            retryable: false,
        }
    }

    pub fn not_enabled(provider: ProviderId) -> Self {
        Self {
            kind: ProviderErrorKind::NotEnabled,
            message: format!("provider '{provider}' is not enabled"),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    /// Overrides the retry hint implied by the constructor.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::Timeout => "provider.timeout",
            ProviderErrorKind::Transport => "provider.transport",
            ProviderErrorKind::RateLimited => "provider.rate_limited",
            ProviderErrorKind::InvalidResponse => "provider.invalid_response",
            ProviderErrorKind::EmptyContent => "provider.empty_content",
            ProviderErrorKind::Unsupported => "provider.unsupported",
            ProviderErrorKind::NotEnabled => "provider.not_enabled",
            ProviderErrorKind::Internal => "provider.internal",
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ProviderError {}

/// Normalized document returned by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub content: String,
    pub title: Option<String>,
}

impl FetchedDocument {
    pub fn new(content: impl Into<String>, title: Option<String>) -> Self {
        Self {
            content: content.into(),
            title,
        }
    }
}

/// Provider adapter contract.
///
/// | Method | Description |
/// |--------|-------------|
/// | [`id`](ProviderAdapter::id) | Provider identifier |
/// | [`capabilities`](ProviderAdapter::capabilities) | Supported operations |
/// | [`quota_limited`](ProviderAdapter::quota_limited) | Whether usage counts against the budget |
/// | [`enforces_timeout`](ProviderAdapter::enforces_timeout) | Whether the adapter applies `timeout` itself |
/// | [`fetch`](ProviderAdapter::fetch) | Read one document |
/// | [`search`](ProviderAdapter::search) | Run one search |
/// | [`close`](ProviderAdapter::close) | Release long-lived resources |
///
/// Implementations must be `Send + Sync`; one adapter instance is shared by
/// every concurrent call of its orchestrator. The `timeout` argument is the
/// per-attempt deadline. The orchestrator enforces it around the whole call
/// unless [`enforces_timeout`](ProviderAdapter::enforces_timeout) says the
/// adapter applies it on its own.
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    /// Quota-limited providers are subject to budget accounting and are
    /// demoted under budget pressure.
    fn quota_limited(&self) -> bool {
        false
    }

    /// Adapters that queue calls internally return `true` and start the
    /// `timeout` clock only once their own exchange begins. Time spent queued
    /// is then not counted against the attempt.
    fn enforces_timeout(&self) -> bool {
        false
    }

    /// Fetches the document at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transport failure, timeout, unusable
    /// backend response or empty content.
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> AdapterFuture<'a, Result<FetchedDocument, ProviderError>>;

    /// Searches for `query`, returning at most `max_results` ranked hits.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transport failure, timeout or unusable
    /// backend response.
    fn search<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
        timeout: Duration,
    ) -> AdapterFuture<'a, Result<Vec<SearchResult>, ProviderError>>;

    fn close<'a>(&'a self) -> AdapterFuture<'a, ()> {
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_set_reports_operations() {
        let read_only = CapabilitySet::new(true, false);
        assert!(read_only.supports(Operation::Read));
        assert!(!read_only.supports(Operation::Search));
        assert!(CapabilitySet::full().supports(Operation::Search));
    }

    #[test]
    fn error_codes_and_retryability() {
        let timeout = ProviderError::timeout(Duration::from_millis(1500));
        assert_eq!(timeout.code(), "provider.timeout");
        assert!(timeout.retryable());
        assert_eq!(timeout.message(), "timed out after 1500 ms");

        let empty = ProviderError::empty_content();
        assert_eq!(empty.kind(), ProviderErrorKind::EmptyContent);
        assert!(!empty.retryable());

        let rejected = ProviderError::transport("status 404").with_retryable(false);
        assert_eq!(rejected.kind(), ProviderErrorKind::Transport);
        assert!(!rejected.retryable());
        assert_eq!(
            empty.to_string(),
            "provider returned empty content (provider.empty_content)"
        );
    }
}
