use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CrawlError;
use crate::models::{NormalizedUrl, RecordTags};

/// A page or depth budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Unlimited,
    AtMost(usize),
}

impl Bound {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Bound::Unlimited)
    }

    /// True once `count` has used up the budget.
    pub fn is_reached(&self, count: usize) -> bool {
        match self {
            Bound::Unlimited => false,
            Bound::AtMost(max) => count >= *max,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Unlimited => f.write_str("unlimited"),
            Bound::AtMost(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Bound {
    type Err = String;

    /// Accepts a non-negative count, `-1`, or `unlimited`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") || s == "-1" {
            return Ok(Bound::Unlimited);
        }
        s.parse::<usize>()
            .map(Bound::AtMost)
            .map_err(|_| format!("Invalid bound '{s}': expected a count, -1 or 'unlimited'"))
    }
}

impl Serialize for Bound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Bound::Unlimited => serializer.serialize_str("unlimited"),
            Bound::AtMost(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

impl<'de> Deserialize<'de> for Bound {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(-1) => Ok(Bound::Unlimited),
            Raw::Count(n) => usize::try_from(n)
                .map(Bound::AtMost)
                .map_err(|_| serde::de::Error::custom(format!("Invalid bound {n}"))),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// HTTP Basic credentials applied to every request of one crawl job.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_max_pages() -> Bound {
    Bound::AtMost(100)
}

fn default_max_depth() -> Bound {
    Bound::AtMost(5)
}

/// Fully resolved parameters for one crawl run. Immutable once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJobSpec {
    pub seed_url: String,
    #[serde(default)]
    pub blocked_urls: Vec<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: Bound,
    #[serde(default = "default_max_depth")]
    pub max_depth: Bound,
    #[serde(default)]
    pub stay_on_domain: bool,
    #[serde(default)]
    pub stay_below_given_path: bool,
    #[serde(default)]
    pub only_relevant_pages: bool,
    /// Log blocked candidates at warn level instead of debug.
    #[serde(default)]
    pub warn_on_rejected: bool,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: RecordTags,
}

impl CrawlJobSpec {
    pub fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            blocked_urls: Vec::new(),
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            stay_on_domain: false,
            stay_below_given_path: false,
            only_relevant_pages: false,
            warn_on_rejected: false,
            credentials: None,
            keywords: Vec::new(),
            tags: RecordTags::default(),
        }
    }

    pub fn with_max_pages(mut self, max_pages: Bound) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Bound) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_stay_on_domain(mut self, stay: bool) -> Self {
        self.stay_on_domain = stay;
        self
    }

    pub fn with_stay_below_given_path(mut self, stay: bool) -> Self {
        self.stay_below_given_path = stay;
        self
    }

    pub fn with_only_relevant_pages(mut self, only: bool) -> Self {
        self.only_relevant_pages = only;
        self
    }

    pub fn with_warn_on_rejected(mut self, warn: bool) -> Self {
        self.warn_on_rejected = warn;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_blocked_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_tags(mut self, tenant: impl Into<String>, scope: impl Into<String>) -> Self {
        self.tags = RecordTags {
            tenant: tenant.into(),
            scope: scope.into(),
        };
        self
    }

    /// Parse the seed. A malformed seed aborts the job before it starts.
    pub fn seed(&self) -> Result<NormalizedUrl, CrawlError> {
        let seed = NormalizedUrl::parse(&self.seed_url)?;
        if !seed.is_http() {
            return Err(CrawlError::invalid_url(
                &self.seed_url,
                format!("scheme '{}' is not crawlable (only http/https)", seed.scheme()),
            ));
        }
        Ok(seed)
    }

    /// Whether links must stay on the seed host.
    ///
    /// Staying below the seed path implies staying on its host, and an
    /// unlimited page or depth budget is never allowed to leave the seed domain.
    pub fn confined_to_domain(&self) -> bool {
        self.stay_on_domain
            || self.stay_below_given_path
            || self.max_pages.is_unlimited()
            || self.max_depth.is_unlimited()
    }

    /// Normalized blocklist. Entries that do not parse cannot match any
    /// normalized candidate and are dropped with a warning.
    pub fn blocklist(&self) -> HashSet<NormalizedUrl> {
        self.blocked_urls
            .iter()
            .filter_map(|raw| match NormalizedUrl::parse(raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring malformed blocked URL");
                    None
                }
            })
            .collect()
    }
}

/// What the crawl loop does when a page fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchFailurePolicy {
    /// Stop the whole run at the first failed page fetch.
    #[default]
    Abort,
    /// Drop the failed URL and continue with the rest of the frontier.
    Skip,
}

/// How qualifying pages are handed to the parser and stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Parse and persist on the crawl task before fetching the next URL.
    #[default]
    Inline,
    /// Hand pages to background tasks, at most `workers` in flight.
    Pooled { workers: usize },
}

/// Dispatch settings.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    /// Also forward content records to the graph store.
    pub save_to_graph: bool,
}

impl DispatchConfig {
    pub fn pooled(workers: usize) -> Self {
        Self {
            mode: DispatchMode::Pooled { workers },
            save_to_graph: false,
        }
    }

    pub fn with_graph(mut self, save_to_graph: bool) -> Self {
        self.save_to_graph = save_to_graph;
        self
    }
}

/// Engine tuning that is not part of the job itself.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Byte cap for page bodies.
    pub max_content_bytes: usize,
    /// Byte cap for robots.txt bodies.
    pub robots_max_bytes: usize,
    /// Token that introduces a disallowed path in robots.txt.
    pub disallow_marker: String,
    pub respect_robots: bool,
    /// Maximum number of origins whose robots rules are cached during a run.
    pub robots_cache_capacity: u64,
    pub on_fetch_error: FetchFailurePolicy,
    pub dispatch: DispatchConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_content_bytes: 1024 * 1024,
            robots_max_bytes: 64 * 1024,
            disallow_marker: "Disallow:".to_string(),
            respect_robots: true,
            robots_cache_capacity: 1024,
            on_fetch_error: FetchFailurePolicy::Abort,
            dispatch: DispatchConfig::default(),
        }
    }
}

impl CrawlConfig {
    pub fn with_max_content_bytes(mut self, bytes: usize) -> Self {
        self.max_content_bytes = bytes;
        self
    }

    pub fn with_robots_max_bytes(mut self, bytes: usize) -> Self {
        self.robots_max_bytes = bytes;
        self
    }

    pub fn with_disallow_marker(mut self, marker: impl Into<String>) -> Self {
        self.disallow_marker = marker.into();
        self
    }

    pub fn with_respect_robots(mut self, respect: bool) -> Self {
        self.respect_robots = respect;
        self
    }

    pub fn with_fetch_failure_policy(mut self, policy: FetchFailurePolicy) -> Self {
        self.on_fetch_error = policy;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.max_content_bytes == 0 {
            return Err(CrawlError::ConfigError(
                "max_content_bytes must be at least 1".into(),
            ));
        }
        if self.disallow_marker.trim().is_empty() {
            return Err(CrawlError::ConfigError(
                "disallow_marker must not be empty".into(),
            ));
        }
        if let DispatchMode::Pooled { workers: 0 } = self.dispatch.mode {
            return Err(CrawlError::ConfigError(
                "pooled dispatch needs at least 1 worker".into(),
            ));
        }
        Ok(())
    }
}
