use std::future::Future;

use crate::error::CrawlError;
use crate::models::{AuthorRecord, ContentRecord, FetchResult, NormalizedUrl, PageRecord, PostingRecord};

/// Bounded HTTP GET.
///
/// Implementations must stop reading once `max_bytes` have been received and
/// report that through [`FetchResult::truncated`]; a response body is never
/// buffered past the cap.
pub trait Fetcher: Send + Sync + Clone + 'static {
    fn fetch(
        &self,
        url: &NormalizedUrl,
        max_bytes: usize,
    ) -> impl Future<Output = Result<FetchResult, CrawlError>> + Send;
}

/// Turns an admitted page into zero or more posting+author records.
///
/// Picking a site-appropriate extractor is the implementation's business.
pub trait PageParser: Send + Sync + Clone + 'static {
    fn submit(
        &self,
        page: &PageRecord,
    ) -> impl Future<Output = Result<Vec<PostingRecord>, CrawlError>> + Send;
}

/// Persists extracted records.
pub trait PostingStore: Send + Sync + Clone + 'static {
    fn save_author(
        &self,
        author: &AuthorRecord,
    ) -> impl Future<Output = Result<(), CrawlError>> + Send;

    fn save_content(
        &self,
        content: &ContentRecord,
    ) -> impl Future<Output = Result<(), CrawlError>> + Send;

    /// Forward a content record to the graph backend.
    fn save_to_graph(
        &self,
        content: &ContentRecord,
    ) -> impl Future<Output = Result<(), CrawlError>> + Send;
}
