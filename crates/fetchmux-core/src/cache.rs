//! In-memory TTL cache for fetched documents and search responses.
//!
//! Expiry is evaluated lazily on read; there is no background sweep. An
//! entry is a hit iff `now - stored_at < ttl`.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::data_source::Operation;
use crate::{FetchResult, SearchResponse, ValidationError};

/// Per-call cache behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Serve a live entry if present; otherwise fetch and store. (Default)
    #[default]
    Use,
    /// Skip the lookup but store the fresh result.
    Refresh,
    /// Neither read nor write the cache.
    Bypass,
}

impl CacheMode {
    pub const fn reads(self) -> bool {
        matches!(self, Self::Use)
    }

    pub const fn writes(self) -> bool {
        !matches!(self, Self::Bypass)
    }
}

/// Cache key: operation kind plus normalized target, so reads and searches
/// never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: Operation,
    target: String,
}

impl CacheKey {
    /// Key for a read of an already-normalized URL.
    pub fn read(normalized_url: impl Into<String>) -> Self {
        Self {
            operation: Operation::Read,
            target: normalized_url.into(),
        }
    }

    /// Key for a search; the result limit is part of the target.
    pub fn search(query: &str, max_results: usize) -> Self {
        Self {
            operation: Operation::Search,
            target: format!("{max_results}:{}", normalize_query(query)),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.operation, self.target)
    }
}

/// Parses and normalizes an http(s) URL. The fragment is dropped; scheme and
/// host are lowercased by the parser.
pub fn normalize_url(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    let mut parsed = url::Url::parse(trimmed).map_err(|_| ValidationError::InvalidUrl {
        value: trimmed.to_owned(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ValidationError::InvalidUrl {
            value: trimmed.to_owned(),
        });
    }

    parsed.set_fragment(None);
    Ok(parsed.to_string())
}

/// Trims, lowercases and collapses internal whitespace.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cached value.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedPayload {
    Document(FetchResult),
    Search(SearchResponse),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: CachedPayload,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

/// Thread-safe, read-mostly cache shared by concurrent calls.
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl CacheStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner {
                map: HashMap::new(),
                ttl,
            })),
        }
    }

    /// A cache with zero TTL never stores anything.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Live payload for `key`, or `None` if absent or expired.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedPayload> {
        let store = self.inner.read().await;
        let now = Instant::now();
        store
            .map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.payload.clone())
    }

    /// Stores `payload`, replacing any previous entry for `key`.
    pub async fn put(&self, key: CacheKey, payload: CachedPayload) {
        let mut store = self.inner.write().await;
        if store.ttl == Duration::ZERO {
            return;
        }

        let ttl = store.ttl;
        store.map.insert(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Removes every entry, returning how many were held (expired included).
    pub async fn clear(&self) -> usize {
        let mut store = self.inner.write().await;
        let removed = store.map.len();
        store.map.clear();
        removed
    }

    /// Entries held, including expired ones not yet overwritten.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn ttl(&self) -> Duration {
        self.inner.read().await.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderId;

    fn document(content: &str) -> CachedPayload {
        CachedPayload::Document(FetchResult::success(
            "https://a.test/",
            ProviderId::Reader,
            content,
            None,
            12,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_hit_just_before_ttl_and_miss_after() {
        let cache = CacheStore::new(Duration::from_secs(60));
        let key = CacheKey::read("https://a.test/");
        let original = document("original");
        cache.put(key.clone(), original.clone()).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&key).await, Some(original));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_exactly_at_ttl() {
        let cache = CacheStore::new(Duration::from_secs(10));
        let key = CacheKey::read("https://a.test/");
        cache.put(key.clone(), document("x")).await;

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn overwrite_replaces_payload() {
        let cache = CacheStore::new(Duration::from_secs(60));
        let key = CacheKey::read("https://a.test/");

        let second = document("second");
        cache.put(key.clone(), document("first")).await;
        cache.put(key.clone(), second.clone()).await;

        assert_eq!(cache.get(&key).await, Some(second));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn reads_and_searches_never_collide() {
        let cache = CacheStore::new(Duration::from_secs(60));
        cache.put(CacheKey::read("rust"), document("doc")).await;

        assert!(cache.get(&CacheKey::search("rust", 10)).await.is_none());
        assert_ne!(CacheKey::read("rust"), CacheKey::search("rust", 10));
    }

    #[tokio::test]
    async fn clear_reports_removed_count() {
        let cache = CacheStore::new(Duration::from_secs(60));
        cache.put(CacheKey::read("https://a.test/"), document("a")).await;
        cache.put(CacheKey::read("https://b.test/"), document("b")).await;

        assert_eq!(cache.clear().await, 2);
        assert!(cache.is_empty().await);
        assert_eq!(cache.clear().await, 0);
    }

    #[tokio::test]
    async fn disabled_cache_stores_nothing() {
        let cache = CacheStore::disabled();
        let key = CacheKey::read("https://a.test/");
        cache.put(key.clone(), document("a")).await;

        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[test]
    fn search_keys_normalize_query_text() {
        assert_eq!(
            CacheKey::search("  Rust   Async ", 5),
            CacheKey::search("rust async", 5)
        );
        assert_ne!(CacheKey::search("rust", 5), CacheKey::search("rust", 6));
    }

    #[test]
    fn url_normalization_drops_fragment_and_lowercases_host() {
        assert_eq!(
            normalize_url(" HTTPS://Example.COM/Path?q=1#section ").unwrap(),
            "https://example.com/Path?q=1"
        );
    }

    #[test]
    fn url_normalization_rejects_non_http() {
        assert_eq!(normalize_url("   "), Err(ValidationError::EmptyUrl));
        assert!(matches!(
            normalize_url("ftp://example.com/file"),
            Err(ValidationError::InvalidUrl { .. })
        ));
        assert!(matches!(
            normalize_url("not a url"),
            Err(ValidationError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn cache_mode_flags() {
        assert_eq!(CacheMode::default(), CacheMode::Use);
        assert!(CacheMode::Use.reads() && CacheMode::Use.writes());
        assert!(!CacheMode::Refresh.reads() && CacheMode::Refresh.writes());
        assert!(!CacheMode::Bypass.reads() && !CacheMode::Bypass.writes());
    }
}
