use serde::{Deserialize, Serialize};

use crate::{ProviderId, UtcDateTime};

/// Word count at which content is considered maximally rich.
pub const FULL_QUALITY_WORD_COUNT: usize = 1_000;

/// Counts whitespace-separated words.
pub fn count_words(content: &str) -> usize {
    content.split_whitespace().count()
}

/// Content richness heuristic in `[0, 1]`, saturating at
/// [`FULL_QUALITY_WORD_COUNT`] words.
pub fn quality_from_word_count(word_count: usize) -> f64 {
    (word_count as f64 / FULL_QUALITY_WORD_COUNT as f64).min(1.0)
}

/// Uniform result of a document fetch, whichever provider answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub content: String,
    pub url: String,
    pub title: Option<String>,
    pub provider_used: ProviderId,
    pub success: bool,
    pub error_message: Option<String>,
    pub response_time_ms: u64,
    pub word_count: usize,
    pub quality_score: f64,
    pub timestamp: UtcDateTime,
    /// True when the result was served from the cache.
    #[serde(default)]
    pub cached: bool,
}

impl FetchResult {
    /// Successful fetch. Word count and quality score are derived from `content`.
    pub fn success(
        url: impl Into<String>,
        provider_used: ProviderId,
        content: impl Into<String>,
        title: Option<String>,
        response_time_ms: u64,
    ) -> Self {
        let content = content.into();
        let word_count = count_words(&content);
        Self {
            content,
            url: url.into(),
            title,
            provider_used,
            success: true,
            error_message: None,
            response_time_ms,
            word_count,
            quality_score: quality_from_word_count(word_count),
            timestamp: UtcDateTime::now(),
            cached: false,
        }
    }

    /// Failed fetch carrying a human-readable error message.
    pub fn failure(
        url: impl Into<String>,
        provider_used: ProviderId,
        error_message: impl Into<String>,
        response_time_ms: u64,
    ) -> Self {
        Self {
            content: String::new(),
            url: url.into(),
            title: None,
            provider_used,
            success: false,
            error_message: Some(error_message.into()),
            response_time_ms,
            word_count: 0,
            quality_score: 0.0,
            timestamp: UtcDateTime::now(),
            cached: false,
        }
    }

    /// Overrides the word count and recomputes the derived quality score.
    pub fn with_word_count(mut self, word_count: usize) -> Self {
        self.word_count = word_count;
        self.quality_score = quality_from_word_count(word_count);
        self
    }

    /// Overrides the derived quality score, clamped to `[0, 1]`.
    pub fn with_quality_score(mut self, quality_score: f64) -> Self {
        self.quality_score = if quality_score.is_finite() {
            quality_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub(crate) fn into_cached(mut self) -> Self {
        self.cached = true;
        self.response_time_ms = 0;
        self
    }
}

/// A single ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 1-based rank.
    pub position: usize,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
        position: usize,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            position,
        }
    }
}

/// Uniform result of a search, whichever provider answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub provider_used: ProviderId,
    pub success: bool,
    pub error_message: Option<String>,
    pub response_time_ms: u64,
    pub timestamp: UtcDateTime,
    #[serde(default)]
    pub cached: bool,
}

impl SearchResponse {
    /// Successful search. Results are truncated to `max_results` and
    /// re-ranked 1..=n in their returned order.
    pub fn success(
        query: impl Into<String>,
        provider_used: ProviderId,
        mut results: Vec<SearchResult>,
        max_results: usize,
        response_time_ms: u64,
    ) -> Self {
        results.truncate(max_results);
        for (index, result) in results.iter_mut().enumerate() {
            result.position = index + 1;
        }

        Self {
            query: query.into(),
            results,
            provider_used,
            success: true,
            error_message: None,
            response_time_ms,
            timestamp: UtcDateTime::now(),
            cached: false,
        }
    }

    pub fn failure(
        query: impl Into<String>,
        provider_used: ProviderId,
        error_message: impl Into<String>,
        response_time_ms: u64,
    ) -> Self {
        Self {
            query: query.into(),
            results: Vec::new(),
            provider_used,
            success: false,
            error_message: Some(error_message.into()),
            response_time_ms,
            timestamp: UtcDateTime::now(),
            cached: false,
        }
    }

    pub(crate) fn into_cached(mut self) -> Self {
        self.cached = true;
        self.response_time_ms = 0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_is_zero_for_empty_content() {
        let result = FetchResult::success("https://a.test", ProviderId::Reader, "", None, 5);
        assert_eq!(result.word_count, 0);
        assert_eq!(result.quality_score, 0.0);
    }

    #[test]
    fn quality_saturates_at_one_thousand_words() {
        let content = vec!["word"; 1_500].join(" ");
        let result = FetchResult::success("https://a.test", ProviderId::Reader, content, None, 5);
        assert_eq!(result.word_count, 1_500);
        assert_eq!(result.quality_score, 1.0);

        let exact = result.with_word_count(1_000);
        assert_eq!(exact.quality_score, 1.0);
    }

    #[test]
    fn quality_is_proportional_below_saturation() {
        let result =
            FetchResult::success("https://a.test", ProviderId::Crawler, "hello world", None, 5);
        assert_eq!(result.word_count, 2);
        assert!((result.quality_score - 0.002).abs() < 1e-9);
    }

    #[test]
    fn explicit_quality_override_is_clamped() {
        let result = FetchResult::success("https://a.test", ProviderId::Reader, "x", None, 1)
            .with_quality_score(3.5);
        assert_eq!(result.quality_score, 1.0);

        let result = result.with_quality_score(f64::NAN);
        assert_eq!(result.quality_score, 0.0);
    }

    #[test]
    fn search_response_truncates_and_reranks() {
        let results = vec![
            SearchResult::new("a", "https://a.test", "", 7),
            SearchResult::new("b", "https://b.test", "", 3),
            SearchResult::new("c", "https://c.test", "", 9),
        ];

        let response = SearchResponse::success("q", ProviderId::Reader, results, 2, 10);

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].position, 1);
        assert_eq!(response.results[1].position, 2);
        assert_eq!(response.results[1].title, "b");
    }
}
