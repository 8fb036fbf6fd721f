use thiserror::Error;

/// Error types surfaced by the crawl engine and its collaborators.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// A seed, blocked entry, or extracted link could not be parsed as an absolute URL.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The server answered, but not with a success status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The run was cancelled while waiting on the network.
    #[error("Cancelled")]
    Cancelled,

    /// The parsing collaborator could not process a page.
    #[error("Parser error: {0}")]
    ParserError(String),

    /// A persistence collaborator call failed.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Missing or contradictory configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CrawlError {
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        CrawlError::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if this error means the page could not be read off the wire.
    ///
    /// These are the failures the fetch-failure policy applies to.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            CrawlError::HttpError(_) | CrawlError::NetworkError(_) | CrawlError::Timeout(_)
        )
    }
}
