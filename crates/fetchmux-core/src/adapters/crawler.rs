use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::CrawlerConfig;
use crate::data_source::{AdapterFuture, FetchedDocument, ProviderAdapter, ProviderError};
use crate::{ProviderId, SearchResult};

/// How long `close` waits for the bridge to exit before killing it.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Adapter for the browser-automation crawler.
///
/// The crawler runs as a child process speaking newline-delimited JSON on
/// stdin/stdout. One process is spawned lazily on first use and reused; calls
/// are serialized through the session lock, and each call's timeout starts
/// once it holds the lock. A call that times out or breaks the protocol
/// discards the process and the next call starts a fresh one.
pub struct BrowserCrawlAdapter {
    command: String,
    args: Vec<String>,
    session: Mutex<Option<BridgeSession>>,
    next_id: AtomicU64,
}

impl BrowserCrawlAdapter {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self::with_command(config.command.clone(), config.args.clone())
    }

    pub fn with_command(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Whether a bridge process is currently held.
    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    async fn call(
        &self,
        command: BridgeCommand<'_>,
        timeout: Duration,
    ) -> Result<BridgeResponse, ProviderError> {
        let mut guard = self.session.lock().await;

        if guard.as_ref().is_some_and(|session| session.in_flight) {
            warn!("discarding crawler bridge left mid-request by a cancelled call");
            *guard = None;
        }
        if guard.is_none() {
            *guard = Some(BridgeSession::spawn(&self.command, &self.args)?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(ProviderError::internal("crawler bridge session missing"));
        };

        let request = BridgeRequest {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            command,
        };

        session.in_flight = true;
        let outcome = tokio::time::timeout(timeout, session.exchange(&request)).await;

        match outcome {
            Ok(Ok(response)) => {
                session.in_flight = false;
                Ok(response)
            }
            Ok(Err(error)) => {
                warn!(error = %error, "crawler bridge protocol failure, dropping session");
                *guard = None;
                Err(error)
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "crawler bridge timed out, dropping session"
                );
                *guard = None;
                Err(ProviderError::timeout(timeout))
            }
        }
    }
}

impl ProviderAdapter for BrowserCrawlAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Crawler
    }

    fn enforces_timeout(&self) -> bool {
        true
    }

    fn fetch<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> AdapterFuture<'a, Result<FetchedDocument, ProviderError>> {
        Box::pin(async move {
            let command = BridgeCommand::Fetch {
                url,
                timeout_ms: millis(timeout),
            };
            let response = self.call(command, timeout).await?.into_result()?;

            let content = response.content.unwrap_or_default();
            if content.trim().is_empty() {
                return Err(ProviderError::empty_content());
            }
            let title = response.title.filter(|title| !title.trim().is_empty());
            Ok(FetchedDocument::new(content, title))
        })
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
        timeout: Duration,
    ) -> AdapterFuture<'a, Result<Vec<SearchResult>, ProviderError>> {
        Box::pin(async move {
            let command = BridgeCommand::Search {
                query,
                max_results,
                timeout_ms: millis(timeout),
            };
            let response = self.call(command, timeout).await?.into_result()?;

            Ok(response
                .results
                .unwrap_or_default()
                .into_iter()
                .filter(|hit| !hit.url.trim().is_empty())
                .take(max_results)
                .enumerate()
                .map(|(index, hit)| SearchResult::new(hit.title, hit.url, hit.snippet, index + 1))
                .collect())
        })
    }

    fn close<'a>(&'a self) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let Some(session) = self.session.lock().await.take() else {
                return;
            };

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            session.shutdown(id).await;
        })
    }
}

struct BridgeSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    /// Set while a request is outstanding; still set on the next call means
    /// the previous one was cancelled mid-exchange.
    in_flight: bool,
}

impl BridgeSession {
    fn spawn(command: &str, args: &[String]) -> Result<Self, ProviderError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::transport(format!("failed to start crawler bridge '{command}': {e}"))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::internal("crawler bridge stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::internal("crawler bridge stdout unavailable"))?;

        info!(command, pid = ?child.id(), "crawler bridge started");

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            in_flight: false,
        })
    }

    async fn exchange(&mut self, request: &BridgeRequest<'_>) -> Result<BridgeResponse, ProviderError> {
        self.send(request).await?;
        self.receive(request.id).await
    }

    async fn send(&mut self, request: &BridgeRequest<'_>) -> Result<(), ProviderError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| ProviderError::internal(format!("failed to encode crawler request: {e}")))?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ProviderError::transport(format!("failed to write to crawler bridge: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ProviderError::transport(format!("failed to write to crawler bridge: {e}")))
    }

    async fn receive(&mut self, id: u64) -> Result<BridgeResponse, ProviderError> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .map_err(|e| {
                    ProviderError::transport(format!("failed to read from crawler bridge: {e}"))
                })?
                .ok_or_else(|| ProviderError::transport("crawler bridge closed its output"))?;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<BridgeResponse>(trimmed) {
                Ok(response) if response.id == id => return Ok(response),
                Ok(response) => {
                    debug!(expected = id, received = response.id, "skipping stale crawler response");
                }
                Err(_) => debug!(line = trimmed, "ignoring non-protocol crawler output"),
            }
        }
    }

    async fn shutdown(self, id: u64) {
        let Self {
            mut child,
            mut stdin,
            ..
        } = self;

        let request = BridgeRequest {
            id,
            command: BridgeCommand::Close,
        };
        if let Ok(mut line) = serde_json::to_string(&request) {
            line.push('\n');
            let _ = stdin.write_all(line.as_bytes()).await;
            let _ = stdin.flush().await;
        }
        drop(stdin);

        match tokio::time::timeout(CLOSE_GRACE, child.wait()).await {
            Ok(Ok(status)) => info!(%status, "crawler bridge stopped"),
            Ok(Err(error)) => warn!(error = %error, "failed to wait for crawler bridge"),
            Err(_) => {
                warn!("crawler bridge ignored close request, killing it");
                let _ = child.kill().await;
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    #[serde(flatten)]
    command: BridgeCommand<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Fetch {
        url: &'a str,
        timeout_ms: u64,
    },
    Search {
        query: &'a str,
        max_results: usize,
        timeout_ms: u64,
    },
    Close,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    results: Option<Vec<BridgeHit>>,
    #[serde(default)]
    error: Option<String>,
}

impl BridgeResponse {
    fn into_result(self) -> Result<Self, ProviderError> {
        if self.ok {
            return Ok(self);
        }
        let reason = self
            .error
            .filter(|error| !error.trim().is_empty())
            .unwrap_or_else(|| String::from("unknown error"));
        Err(ProviderError::transport(format!("crawler reported: {reason}")))
    }
}

#[derive(Debug, Deserialize)]
struct BridgeHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: String,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
