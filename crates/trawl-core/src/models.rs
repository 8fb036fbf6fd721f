use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;
use uuid::Uuid;

use crate::error::CrawlError;

/// An absolute URL in the form used for dedup and blocklist lookups.
///
/// Fragments and user info are stripped, so two URLs compare equal when their
/// scheme, host, port, path and query agree. Scheme and host case and default
/// ports are already canonicalised by the `url` parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    /// Parse an absolute URL.
    pub fn parse(raw: &str) -> Result<Self, CrawlError> {
        let url = Url::parse(raw.trim()).map_err(|e| CrawlError::invalid_url(raw, e))?;
        Self::from_url(url)
    }

    /// Resolve `href` against this URL (absolute or relative reference).
    pub fn resolve(&self, href: &str) -> Result<Self, CrawlError> {
        let url = self
            .0
            .join(href.trim())
            .map_err(|e| CrawlError::invalid_url(href, e))?;
        Self::from_url(url)
    }

    fn from_url(mut url: Url) -> Result<Self, CrawlError> {
        if !url.has_host() {
            return Err(CrawlError::invalid_url(url.as_str(), "URL has no host"));
        }
        url.set_fragment(None);
        // Infallible once the URL has a host.
        let _ = url.set_username("");
        let _ = url.set_password(None);
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn is_http(&self) -> bool {
        matches!(self.scheme(), "http" | "https")
    }

    /// `scheme://host[:port]`, the unit robots rules apply to.
    pub fn origin_key(&self) -> String {
        self.0.origin().ascii_serialization()
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for NormalizedUrl {
    type Error = CrawlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NormalizedUrl> for String {
    fn from(value: NormalizedUrl) -> Self {
        value.0.into()
    }
}

/// Bytes read for one URL, possibly cut short at the configured cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub content: String,
    /// Byte length of `content`; never more than the cap the fetch ran with.
    pub content_length: usize,
    /// True when the body was longer than the cap and the rest was not read.
    pub truncated: bool,
}

impl FetchResult {
    /// Build a result from raw body bytes, decoding lossily as UTF-8.
    ///
    /// A truncated body is cut back to the last complete character, and the
    /// decoded text never grows past `bytes.len()`.
    pub fn from_bytes(bytes: &[u8], truncated: bool) -> Self {
        if !truncated {
            let content = String::from_utf8_lossy(bytes).into_owned();
            return Self {
                content_length: content.len(),
                content,
                truncated,
            };
        }

        let mut content = String::from_utf8_lossy(complete_prefix(bytes)).into_owned();
        // Replacement characters for invalid bytes are wider than the bytes.
        if content.len() > bytes.len() {
            let mut end = bytes.len();
            while !content.is_char_boundary(end) {
                end -= 1;
            }
            content.truncate(end);
        }

        Self {
            content_length: content.len(),
            content,
            truncated,
        }
    }
}

/// `bytes` without a trailing multi-byte character that was cut short.
fn complete_prefix(bytes: &[u8]) -> &[u8] {
    match std::str::from_utf8(bytes) {
        Err(e) if e.error_len().is_none() => &bytes[..e.valid_up_to()],
        _ => bytes,
    }
}

/// Opaque tenant/scope values copied onto every record a crawl emits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTags {
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub scope: String,
}

/// A fetched, admitted page: the unit handed to the parsing collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub url: NormalizedUrl,
    pub content: String,
    /// Configured keywords that occur in the page as whole words.
    pub matched_keywords: Vec<String>,
    /// The full configured keyword list, for parsers that do their own matching.
    pub keywords: Vec<String>,
    pub tags: RecordTags,
    /// Link distance from the seed (seed = 0).
    pub depth: u32,
    /// SHA-256 of `content`
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
}

/// Author half of an extracted posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: String,
    pub name: String,
    pub profile_url: Option<String>,
    pub tags: RecordTags,
}

/// Content half of an extracted posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: Uuid,
    pub author_id: String,
    pub source_url: String,
    pub title: Option<String>,
    pub body: String,
    pub keywords: Vec<String>,
    pub tags: RecordTags,
    pub content_hash: String,
    pub captured_at: DateTime<Utc>,
}

/// One posting+author pair produced by the parsing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingRecord {
    pub author: AuthorRecord,
    pub content: ContentRecord,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
