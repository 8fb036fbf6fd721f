//! Test utilities: mock implementations of the collaborator traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::crawler::{CrawlEvent, CrawlReporter};
use crate::error::CrawlError;
use crate::models::{
    AuthorRecord, ContentRecord, FetchResult, NormalizedUrl, PageRecord, PostingRecord,
    RecordTags, compute_hash,
};
use crate::traits::{Fetcher, PageParser, PostingStore};

/// Rebuild an error so a scripted failure can be returned more than once.
fn replay(error: &CrawlError) -> CrawlError {
    match error {
        CrawlError::InvalidUrl { url, reason } => CrawlError::invalid_url(url.clone(), reason),
        CrawlError::HttpError(m) => CrawlError::HttpError(m.clone()),
        CrawlError::NetworkError(m) => CrawlError::NetworkError(m.clone()),
        CrawlError::Timeout(s) => CrawlError::Timeout(*s),
        CrawlError::Cancelled => CrawlError::Cancelled,
        CrawlError::ParserError(m) => CrawlError::ParserError(m.clone()),
        CrawlError::StoreError(m) => CrawlError::StoreError(m.clone()),
        CrawlError::ConfigError(m) => CrawlError::ConfigError(m.clone()),
        CrawlError::SerializationError(e) => CrawlError::ParserError(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher serving canned bodies by URL.
///
/// Unknown URLs answer with an HTTP 404 error. Every request is recorded.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Result<String, CrawlError>>>>,
    requested: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn with_error(self, url: &str, error: CrawlError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(error));
        self
    }

    /// Sleep before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    /// Requests other than robots.txt lookups.
    pub fn pages_requested(&self) -> Vec<String> {
        self.requested()
            .into_iter()
            .filter(|u| !u.ends_with("/robots.txt"))
            .collect()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &NormalizedUrl, max_bytes: usize) -> Result<FetchResult, CrawlError> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = match self.responses.lock().unwrap().get(url.as_str()) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(e)) => Err(replay(e)),
            None => Err(CrawlError::HttpError(format!("HTTP 404 for {url}"))),
        };

        let body = response?;
        let bytes = body.as_bytes();
        let truncated = bytes.len() > max_bytes;
        Ok(FetchResult::from_bytes(
            &bytes[..bytes.len().min(max_bytes)],
            truncated,
        ))
    }
}

// ---------------------------------------------------------------------------
// MockParser
// ---------------------------------------------------------------------------

/// Mock parser producing one posting per page, authored by the page host.
#[derive(Clone, Default)]
pub struct MockParser {
    pages: Arc<Mutex<Vec<PageRecord>>>,
    error: Arc<Mutex<Option<CrawlError>>>,
    delay: Option<Duration>,
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first submission with `error`.
    pub fn with_error(self, error: CrawlError) -> Self {
        *self.error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Pages submitted so far, in submission order.
    pub fn pages(&self) -> Vec<PageRecord> {
        self.pages.lock().unwrap().clone()
    }
}

impl PageParser for MockParser {
    async fn submit(&self, page: &PageRecord) -> Result<Vec<PostingRecord>, CrawlError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        self.pages.lock().unwrap().push(page.clone());
        Ok(vec![make_test_posting(page)])
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Mock store that records every call as `kind:key`.
#[derive(Clone, Default)]
pub struct MockStore {
    calls: Arc<Mutex<Vec<String>>>,
    author_error: Arc<Mutex<Option<CrawlError>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `save_author` call with `error`.
    pub fn with_author_error(self, error: CrawlError) -> Self {
        *self.author_error.lock().unwrap() = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Source URLs of saved content records.
    pub fn saved_contents(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("content:").map(str::to_string))
            .collect()
    }
}

impl PostingStore for MockStore {
    async fn save_author(&self, author: &AuthorRecord) -> Result<(), CrawlError> {
        if let Some(e) = self.author_error.lock().unwrap().take() {
            return Err(e);
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("author:{}", author.id));
        Ok(())
    }

    async fn save_content(&self, content: &ContentRecord) -> Result<(), CrawlError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("content:{}", content.source_url));
        Ok(())
    }

    async fn save_to_graph(&self, content: &ContentRecord) -> Result<(), CrawlError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("graph:{}", content.source_url));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock crawl reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl CrawlReporter for MockReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let label = match &event {
            CrawlEvent::Started { .. } => "Started",
            CrawlEvent::RobotsDisallowed { .. } => "RobotsDisallowed",
            CrawlEvent::PageFetched { .. } => "PageFetched",
            CrawlEvent::PageIrrelevant { .. } => "PageIrrelevant",
            CrawlEvent::LinksQueued { .. } => "LinksQueued",
            CrawlEvent::PageDispatched { .. } => "PageDispatched",
            CrawlEvent::FetchFailed { .. } => "FetchFailed",
            CrawlEvent::Draining { .. } => "Draining",
            CrawlEvent::Finished { .. } => "Finished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a depth-0 PageRecord for `url` with fixed content.
pub fn make_test_page(url: &str) -> PageRecord {
    let content = "<html><body>test page</body></html>".to_string();
    PageRecord {
        url: NormalizedUrl::parse(url).unwrap(),
        content_hash: compute_hash(&content),
        content,
        matched_keywords: vec![],
        keywords: vec![],
        tags: RecordTags::default(),
        depth: 0,
        fetched_at: Utc::now(),
    }
}

/// The posting MockParser emits for a page.
pub fn make_test_posting(page: &PageRecord) -> PostingRecord {
    let author_id = page.url.host().unwrap_or("unknown").to_string();
    PostingRecord {
        author: AuthorRecord {
            id: author_id.clone(),
            name: author_id.clone(),
            profile_url: None,
            tags: page.tags.clone(),
        },
        content: ContentRecord {
            id: Uuid::new_v4(),
            author_id,
            source_url: page.url.to_string(),
            title: None,
            body: page.content.clone(),
            keywords: page.matched_keywords.clone(),
            tags: page.tags.clone(),
            content_hash: page.content_hash.clone(),
            captured_at: page.fetched_at,
        },
    }
}
