//! Contract every production adapter honors, whatever its backend.

use std::sync::Arc;
use std::time::Duration;

use fetchmux_core::{
    AdapterFuture, BrowserCrawlAdapter, DocumentReaderAdapter, HttpClient, HttpError,
    HttpMethod, HttpRequest, HttpResponse, Operation, ProviderAdapter, ProviderId, ReaderConfig,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Answers reads with a document and searches with five hits.
struct FakeReaderApi;

impl HttpClient for FakeReaderApi {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> AdapterFuture<'a, Result<HttpResponse, HttpError>> {
        let body = match request.method {
            HttpMethod::Get => String::from(
                r#"{"code":200,"data":{"title":"Contract","content":"hello from the reader"}}"#,
            ),
            _ => {
                let hits = (1..=5)
                    .map(|index| {
                        serde_json::json!({
                            "title": format!("Hit {index}"),
                            "url": format!("https://hits.test/{index}"),
                            "description": format!("about {index}"),
                        })
                    })
                    .collect::<Vec<_>>();
                serde_json::json!({ "data": hits }).to_string()
            }
        };
        Box::pin(async move { Ok(HttpResponse::ok(body)) })
    }
}

struct ProviderCase {
    id: ProviderId,
    adapter: Arc<dyn ProviderAdapter>,
    quota_limited: bool,
    // Keeps the bridge script alive for the crawler case.
    _workspace: Option<tempfile::TempDir>,
}

fn reader_case() -> ProviderCase {
    ProviderCase {
        id: ProviderId::Reader,
        adapter: Arc::new(DocumentReaderAdapter::new(
            Arc::new(FakeReaderApi),
            &ReaderConfig::default(),
        )),
        quota_limited: true,
        _workspace: None,
    }
}

#[cfg(unix)]
const BRIDGE_SCRIPT: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *'"op":"close"'*) exit 0 ;;
    *'"op":"fetch"'*) printf '{"id":%s,"ok":true,"title":"Crawled","content":"hello from the crawler"}\n' "$id" ;;
    *'"op":"search"'*) printf '{"id":%s,"ok":true,"results":[{"title":"A","url":"https://a.test","snippet":"a"},{"title":"B","url":"https://b.test","snippet":"b"},{"title":"C","url":"https://c.test","snippet":"c"},{"title":"D","url":"https://d.test","snippet":"d"}]}\n' "$id" ;;
  esac
done
"#;

#[cfg(unix)]
fn crawler_case() -> ProviderCase {
    let workspace = tempfile::tempdir().expect("temp dir");
    let script = workspace.path().join("bridge.sh");
    std::fs::write(&script, BRIDGE_SCRIPT).expect("write bridge script");

    ProviderCase {
        id: ProviderId::Crawler,
        adapter: Arc::new(BrowserCrawlAdapter::with_command(
            "sh",
            vec![script.display().to_string()],
        )),
        quota_limited: false,
        _workspace: Some(workspace),
    }
}

fn provider_cases() -> Vec<ProviderCase> {
    #[allow(unused_mut)]
    let mut cases = vec![reader_case()];
    #[cfg(unix)]
    cases.push(crawler_case());
    cases
}

#[test]
fn adapters_report_identity_and_capabilities() {
    for case in provider_cases() {
        assert_eq!(case.adapter.id(), case.id);
        assert_eq!(case.adapter.quota_limited(), case.quota_limited, "{}", case.id);
        assert!(case.adapter.capabilities().supports(Operation::Read), "{}", case.id);
        assert!(case.adapter.capabilities().supports(Operation::Search), "{}", case.id);
    }
}

#[tokio::test]
async fn fetch_returns_non_empty_content_for_all_providers() {
    for case in provider_cases() {
        let document = case
            .adapter
            .fetch("https://example.com/article", TIMEOUT)
            .await
            .unwrap_or_else(|error| panic!("{} fetch failed: {error}", case.id));

        assert!(!document.content.trim().is_empty(), "{}", case.id);
        assert!(document.title.is_some(), "{}", case.id);
        case.adapter.close().await;
    }
}

#[tokio::test]
async fn search_respects_limit_and_positions_for_all_providers() {
    for case in provider_cases() {
        let hits = case
            .adapter
            .search("rust async runtime", 3, TIMEOUT)
            .await
            .unwrap_or_else(|error| panic!("{} search failed: {error}", case.id));

        assert_eq!(hits.len(), 3, "{}", case.id);
        for (index, hit) in hits.iter().enumerate() {
            assert_eq!(hit.position, index + 1, "{}", case.id);
            assert!(!hit.url.is_empty(), "{}", case.id);
        }
        case.adapter.close().await;
    }
}

#[tokio::test]
async fn close_is_idempotent_for_all_providers() {
    for case in provider_cases() {
        case.adapter.close().await;
        case.adapter.fetch("https://example.com/", TIMEOUT).await.ok();
        case.adapter.close().await;
        case.adapter.close().await;
    }
}
