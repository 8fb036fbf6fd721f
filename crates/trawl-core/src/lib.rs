pub mod crawler;
pub mod dispatch;
pub mod error;
pub mod frontier;
pub mod job;
pub mod links;
pub mod models;
pub mod relevance;
pub mod robots;
pub mod scope;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use crawler::{CrawlEvent, CrawlReport, CrawlReporter, Crawler, StopReason, TracingCrawlReporter};
pub use dispatch::{DispatchStats, Dispatcher};
pub use error::CrawlError;
pub use job::{
    Bound, CrawlConfig, CrawlJobSpec, Credentials, DispatchConfig, DispatchMode,
    FetchFailurePolicy,
};
pub use models::{
    AuthorRecord, ContentRecord, FetchResult, NormalizedUrl, PageRecord, PostingRecord,
    RecordTags, compute_hash,
};
pub use robots::{RobotsChecker, RobotsRules};
pub use scope::{Admission, ScopePolicy};
pub use traits::{Fetcher, PageParser, PostingStore};
