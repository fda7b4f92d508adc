//! Scripted adapters shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fetchmux_core::{
    AdapterFuture, CapabilitySet, FetchConfig, FetchOrchestrator, FetchedDocument,
    ProviderAdapter, ProviderError, ProviderId, SearchResult,
};

/// What a scripted adapter does on one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Content(String),
    Error(ProviderError),
    Hits(Vec<SearchResult>),
    Panic,
    Hang,
}

impl Reply {
    pub fn content(text: &str) -> Self {
        Self::Content(text.to_owned())
    }

    pub fn transport(message: &str) -> Self {
        Self::Error(ProviderError::transport(message))
    }
}

pub struct ScriptedAdapter {
    id: ProviderId,
    quota_limited: bool,
    capabilities: CapabilitySet,
    script: Mutex<VecDeque<Reply>>,
    default_reply: Reply,
    calls: AtomicUsize,
    closed: AtomicBool,
}

impl ScriptedAdapter {
    /// The reader is quota limited, the crawler is not.
    pub fn new(id: ProviderId, default_reply: Reply) -> Self {
        Self {
            id,
            quota_limited: id == ProviderId::Reader,
            capabilities: CapabilitySet::full(),
            script: Mutex::new(VecDeque::new()),
            default_reply,
            calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn answering(id: ProviderId, content: &str) -> Arc<Self> {
        Arc::new(Self::new(id, Reply::content(content)))
    }

    pub fn failing(id: ProviderId, message: &str) -> Arc<Self> {
        Arc::new(Self::new(id, Reply::transport(message)))
    }

    /// Replies consumed in order before falling back to the default reply.
    pub fn with_script(self, replies: Vec<Reply>) -> Self {
        *self.script.lock().unwrap() = replies.into();
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn quota_limited(&self) -> bool {
        self.quota_limited
    }

    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _timeout: Duration,
    ) -> AdapterFuture<'a, Result<FetchedDocument, ProviderError>> {
        Box::pin(async move {
            match self.next_reply() {
                Reply::Content(content) => Ok(FetchedDocument::new(content, Some(url.to_owned()))),
                Reply::Error(error) => Err(error),
                Reply::Hits(_) => Err(ProviderError::invalid_response("search hits for a read")),
                Reply::Panic => panic!("scripted {} adapter blew up", self.id),
                Reply::Hang => std::future::pending().await,
            }
        })
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
        _timeout: Duration,
    ) -> AdapterFuture<'a, Result<Vec<SearchResult>, ProviderError>> {
        Box::pin(async move {
            match self.next_reply() {
                Reply::Hits(hits) => Ok(hits.into_iter().take(max_results).collect()),
                Reply::Content(content) => Ok(vec![SearchResult::new(
                    query,
                    format!("https://{}.test/{}", self.id, query.replace(' ', "-")),
                    content,
                    1,
                )]),
                Reply::Error(error) => Err(error),
                Reply::Panic => panic!("scripted {} adapter blew up", self.id),
                Reply::Hang => std::future::pending().await,
            }
        })
    }

    fn close<'a>(&'a self) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
        })
    }
}

pub fn orchestrator(
    config: FetchConfig,
    reader: &Arc<ScriptedAdapter>,
    crawler: &Arc<ScriptedAdapter>,
) -> FetchOrchestrator {
    FetchOrchestrator::builder()
        .with_config(config)
        .with_adapter(reader.clone())
        .with_adapter(crawler.clone())
        .build()
        .expect("test config is valid")
}

pub fn hits(count: usize) -> Vec<SearchResult> {
    (1..=count)
        .map(|index| {
            SearchResult::new(
                format!("Hit {index}"),
                format!("https://hits.test/{index}"),
                format!("snippet {index}"),
                // positions from a backend are not trusted
                100 + index,
            )
        })
        .collect()
}

pub fn words(count: usize) -> String {
    vec!["word"; count].join(" ")
}
