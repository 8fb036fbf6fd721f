use std::time::Duration;

use reqwest::{Client, Response};
use trawl_core::error::CrawlError;
use trawl_core::job::Credentials;
use trawl_core::models::{FetchResult, NormalizedUrl};
use trawl_core::traits::Fetcher;

const USER_AGENT: &str = "Trawl/0.1 (+crawler)";

/// HTTP fetcher using reqwest.
///
/// Streams the response body and stops reading once the byte cap passed to
/// [`Fetcher::fetch`] is reached; the remainder of the body is never read.
/// Redirects are followed with reqwest's default policy. Non-2xx statuses are
/// reported as [`CrawlError::HttpError`].
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
    credentials: Option<Credentials>,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, CrawlError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, CrawlError> {
        let timeout_secs = timeout.as_secs();
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs,
            credentials: None,
        })
    }

    /// Send HTTP basic credentials with every request, robots.txt included.
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    fn classify(&self, e: reqwest::Error) -> CrawlError {
        if e.is_timeout() {
            CrawlError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            CrawlError::NetworkError(format!("Connection failed: {e}"))
        } else if e.is_request() {
            CrawlError::NetworkError(e.to_string())
        } else {
            CrawlError::HttpError(e.to_string())
        }
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &NormalizedUrl, max_bytes: usize) -> Result<FetchResult, CrawlError> {
        let mut request = self.client.get(url.as_str());
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let (body, truncated) = self.read_capped(response, max_bytes).await?;
        tracing::debug!(%url, bytes = body.len(), truncated, "Read response body");
        Ok(FetchResult::from_bytes(&body, truncated))
    }
}

impl ReqwestFetcher {
    async fn read_capped(
        &self,
        mut response: Response,
        max_bytes: usize,
    ) -> Result<(Vec<u8>, bool), CrawlError> {
        let declared = response.content_length();
        let mut body = Vec::with_capacity(max_bytes.min(64 * 1024));

        loop {
            if body.len() == max_bytes {
                // Stopped at the cap without seeing the end of the stream.
                let truncated = declared.is_none_or(|len| len > max_bytes as u64);
                return Ok((body, truncated));
            }

            let chunk = response.chunk().await.map_err(|e| {
                if e.is_timeout() {
                    CrawlError::Timeout(self.timeout_secs)
                } else {
                    CrawlError::HttpError(format!("Failed to read response body: {e}"))
                }
            })?;

            let Some(chunk) = chunk else {
                return Ok((body, false));
            };

            let room = max_bytes - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                return Ok((body, true));
            }
            body.extend_from_slice(&chunk);
        }
    }
}
