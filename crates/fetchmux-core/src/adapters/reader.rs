use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::ReaderConfig;
use crate::data_source::{AdapterFuture, FetchedDocument, ProviderAdapter, ProviderError};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse};
use crate::retry::RetryConfig;
use crate::{ProviderId, SearchResult};

/// Longest slice of an error body quoted in failure messages.
const ERROR_BODY_PREVIEW: usize = 200;

/// Adapter for the hosted document-reader and search API.
///
/// Reads go to `GET {read_base_url}/{url}`, searches to
/// `POST {search_base_url}/` with a JSON body. Usage counts against the
/// budget, so this is the quota-limited provider.
#[derive(Clone)]
pub struct DocumentReaderAdapter {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    read_base_url: String,
    search_base_url: String,
    retry: RetryConfig,
}

impl DocumentReaderAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, config: &ReaderConfig) -> Self {
        Self {
            http_client,
            auth: HttpAuth::from_optional_key(config.api_key.as_deref()),
            read_base_url: config.read_base_url.trim_end_matches('/').to_owned(),
            search_base_url: config.search_base_url.trim_end_matches('/').to_owned(),
            retry: RetryConfig::exponential(config.max_retries),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn decorate(&self, request: HttpRequest, timeout: Duration) -> HttpRequest {
        request
            .with_header("accept", "application/json")
            .with_header("x-timeout", timeout.as_secs().max(1).to_string())
            .with_auth(&self.auth)
            .with_timeout_ms(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    }

    async fn execute_with_retry(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError> {
        let mut attempt = 0_u32;
        loop {
            let error = match self.http_client.execute(request.clone()).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => {
                    let error = status_error(&response);
                    if !(error.retryable() && self.retry.should_retry_status(response.status)) {
                        return Err(error);
                    }
                    error
                }
                Err(http_error) => {
                    let error = ProviderError::transport(format!(
                        "reader transport error: {}",
                        http_error.message()
                    ))
                    .with_retryable(http_error.retryable());
                    if !(error.retryable() && self.retry.retry_on_transport) {
                        return Err(error);
                    }
                    error
                }
            };

            let Some(delay) = self.retry.next_delay(attempt) else {
                return Err(error);
            };
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying reader request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl ProviderAdapter for DocumentReaderAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Reader
    }

    fn quota_limited(&self) -> bool {
        true
    }

    fn fetch<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> AdapterFuture<'a, Result<FetchedDocument, ProviderError>> {
        Box::pin(async move {
            let endpoint = format!("{}/{}", self.read_base_url, url);
            let request = self.decorate(HttpRequest::get(endpoint), timeout);
            let response = self.execute_with_retry(request).await?;
            parse_document(&response.body)
        })
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
        timeout: Duration,
    ) -> AdapterFuture<'a, Result<Vec<SearchResult>, ProviderError>> {
        Box::pin(async move {
            let body = serde_json::json!({ "q": query, "num": max_results });
            let endpoint = format!("{}/", self.search_base_url);
            let request = self.decorate(HttpRequest::post(endpoint).with_json_body(&body), timeout);
            let response = self.execute_with_retry(request).await?;
            parse_hits(&response.body, max_results)
        })
    }
}

fn status_error(response: &HttpResponse) -> ProviderError {
    let preview: String = response.body.trim().chars().take(ERROR_BODY_PREVIEW).collect();
    let message = if preview.is_empty() {
        format!("reader returned status {}", response.status)
    } else {
        format!("reader returned status {}: {preview}", response.status)
    };

    match response.status {
        429 => ProviderError::rate_limited(message),
        status => ProviderError::transport(message)
            .with_retryable(status == 408 || status >= 500),
    }
}

#[derive(Debug, Deserialize)]
struct ReaderDocument {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentBody {
    Wrapped { data: ReaderDocument },
    Bare(ReaderDocument),
}

#[derive(Debug, Deserialize)]
struct ReaderHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchBody {
    Bare(Vec<ReaderHit>),
    Wrapped { data: Vec<ReaderHit> },
    Results { results: Vec<ReaderHit> },
}

/// Accepts `{"data": {...}}`, a bare JSON document, or a plain-text /
/// markdown body with optional `Title:` and `Markdown Content:` markers.
fn parse_document(body: &str) -> Result<FetchedDocument, ProviderError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::empty_content());
    }

    if trimmed.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str::<DocumentBody>(trimmed) {
            let document = match parsed {
                DocumentBody::Wrapped { data } | DocumentBody::Bare(data) => data,
            };
            let content = match (document.content, document.text) {
                (Some(content), _) if !content.trim().is_empty() => content,
                (_, Some(text)) | (Some(text), None) => text,
                (None, None) => {
                    return Err(ProviderError::invalid_response(
                        "reader response has no content field",
                    ))
                }
            };
            return finish_document(content, document.title);
        }
    }

    let (title, content) = split_plain_text(trimmed);
    finish_document(content.to_owned(), title)
}

fn finish_document(content: String, title: Option<String>) -> Result<FetchedDocument, ProviderError> {
    if content.trim().is_empty() {
        return Err(ProviderError::empty_content());
    }
    let title = title
        .map(|title| title.trim().to_owned())
        .filter(|title| !title.is_empty());
    Ok(FetchedDocument::new(content, title))
}

fn split_plain_text(body: &str) -> (Option<String>, &str) {
    let title = body
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("Title:"))
        .map(|title| title.trim().to_owned());

    let content = match body.split_once("Markdown Content:") {
        Some((_, rest)) => rest.trim(),
        None => body,
    };

    (title, content)
}

fn parse_hits(body: &str, max_results: usize) -> Result<Vec<SearchResult>, ProviderError> {
    let parsed: SearchBody = serde_json::from_str(body.trim()).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse reader search response: {e}"))
    })?;

    let hits = match parsed {
        SearchBody::Bare(hits)
        | SearchBody::Wrapped { data: hits }
        | SearchBody::Results { results: hits } => hits,
    };

    Ok(hits
        .into_iter()
        .filter(|hit| !hit.url.trim().is_empty())
        .take(max_results)
        .enumerate()
        .map(|(index, hit)| {
            let snippet = hit.snippet.or(hit.description).unwrap_or_default();
            SearchResult::new(hit.title, hit.url, snippet, index + 1)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::data_source::ProviderErrorKind;
    use crate::http_client::{HttpError, HttpMethod};

    #[derive(Default)]
    struct ScriptedHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> AdapterFuture<'a, Result<HttpResponse, HttpError>> {
            self.requests.lock().unwrap().push(request);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::non_retryable("script exhausted")));
            Box::pin(async move { next })
        }
    }

    fn adapter(client: Arc<ScriptedHttpClient>) -> DocumentReaderAdapter {
        let config = ReaderConfig {
            api_key: Some(String::from("test-key")),
            read_base_url: String::from("https://r.example.test/"),
            search_base_url: String::from("https://s.example.test"),
            ..ReaderConfig::default()
        };
        DocumentReaderAdapter::new(client, &config)
            .with_retry(RetryConfig::fixed(Duration::from_millis(5), 2))
    }

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn reads_json_envelope_with_auth_headers() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok(
            r#"{"code":200,"data":{"title":"Example","content":"hello reader world"}}"#,
        ))]);
        let adapter = adapter(client.clone());

        let document = adapter
            .fetch("https://example.com/post", TIMEOUT)
            .await
            .expect("fetch succeeds");

        assert_eq!(document.content, "hello reader world");
        assert_eq!(document.title.as_deref(), Some("Example"));

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert_eq!(requests[0].url, "https://r.example.test/https://example.com/post");
        assert_eq!(
            requests[0].headers.get("authorization").map(String::as_str),
            Some("Bearer test-key")
        );
        assert_eq!(requests[0].headers.get("x-timeout").map(String::as_str), Some("10"));
        assert_eq!(requests[0].timeout_ms, 10_000);
    }

    #[tokio::test]
    async fn reads_plain_text_body() {
        let body = "Title: Plain Page\n\nURL Source: https://example.com\n\nMarkdown Content:\n# Heading\nsome words here";
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok(body))]);

        let document = adapter(client)
            .fetch("https://example.com", TIMEOUT)
            .await
            .expect("fetch succeeds");

        assert_eq!(document.title.as_deref(), Some("Plain Page"));
        assert_eq!(document.content, "# Heading\nsome words here");
    }

    #[tokio::test]
    async fn blank_body_is_empty_content() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok("   \n"))]);
        let error = adapter(client)
            .fetch("https://example.com", TIMEOUT)
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), ProviderErrorKind::EmptyContent);
    }

    #[tokio::test]
    async fn json_without_content_is_invalid_response() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok(r#"{"data":{"title":"x"}}"#))]);
        let error = adapter(client)
            .fetch("https://example.com", TIMEOUT)
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), ProviderErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let client = ScriptedHttpClient::new(vec![
            Ok(HttpResponse::new(503, "busy")),
            Err(HttpError::new("connection reset")),
            Ok(HttpResponse::ok(r#"{"data":{"content":"third time lucky"}}"#)),
        ]);

        let document = adapter(client.clone())
            .fetch("https://example.com", TIMEOUT)
            .await
            .expect("eventually succeeds");

        assert_eq!(document.content, "third time lucky");
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_rate_limit_reports_rate_limited() {
        let client = ScriptedHttpClient::new(vec![
            Ok(HttpResponse::new(429, "slow down")),
            Ok(HttpResponse::new(429, "slow down")),
            Ok(HttpResponse::new(429, "slow down")),
        ]);

        let error = adapter(client.clone())
            .fetch("https://example.com", TIMEOUT)
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), ProviderErrorKind::RateLimited);
        assert!(error.message().contains("429"));
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::new(404, ""))]);

        let error = adapter(client.clone())
            .fetch("https://example.com/missing", TIMEOUT)
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), ProviderErrorKind::Transport);
        assert_eq!(error.message(), "reader returned status 404");
        assert!(!error.retryable());
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn permanent_transport_errors_are_not_retried() {
        let client = ScriptedHttpClient::new(vec![
            Err(HttpError::non_retryable("invalid header value")),
            Ok(HttpResponse::ok(r#"{"data":{"content":"never reached"}}"#)),
        ]);

        let error = adapter(client.clone())
            .fetch("https://example.com", TIMEOUT)
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), ProviderErrorKind::Transport);
        assert!(!error.retryable());
        assert_eq!(error.message(), "reader transport error: invalid header value");
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_server_errors_stay_retryable() {
        let client = ScriptedHttpClient::new(vec![
            Ok(HttpResponse::new(502, "")),
            Ok(HttpResponse::new(502, "")),
            Ok(HttpResponse::new(502, "")),
        ]);

        let error = adapter(client.clone())
            .fetch("https://example.com", TIMEOUT)
            .await
            .expect_err("must fail");

        assert!(error.retryable());
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn search_posts_query_and_ranks_hits() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok(
            r#"{"data":[
                {"title":"One","url":"https://one.test","description":"first"},
                {"title":"No url","url":""},
                {"title":"Two","url":"https://two.test","snippet":"second"},
                {"title":"Three","url":"https://three.test"}
            ]}"#,
        ))]);

        let hits = adapter(client.clone())
            .search("rust async", 2, TIMEOUT)
            .await
            .expect("search succeeds");

        assert_eq!(
            hits,
            vec![
                SearchResult::new("One", "https://one.test", "first", 1),
                SearchResult::new("Two", "https://two.test", "second", 2),
            ]
        );

        let requests = client.requests();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].url, "https://s.example.test/");
        let body: serde_json::Value =
            serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"q": "rust async", "num": 2}));
    }

    #[tokio::test]
    async fn search_accepts_results_envelope() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok(
            r#"{"results":[{"title":"A","url":"https://a.test","snippet":"s"}]}"#,
        ))]);

        let hits = adapter(client)
            .search("a", 5, TIMEOUT)
            .await
            .expect("search succeeds");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 1);
    }

    #[tokio::test]
    async fn search_rejects_non_json() {
        let client = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok("<html>oops</html>"))]);
        let error = adapter(client)
            .search("a", 5, TIMEOUT)
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), ProviderErrorKind::InvalidResponse);
    }
}
