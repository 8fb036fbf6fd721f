//! Minimal robots.txt compliance.
//!
//! Only the disallow marker is honoured: each occurrence is followed by one
//! whitespace-delimited path prefix, and any URL whose path starts with one of
//! those prefixes is refused. User-agent groups, `Allow:`, wildcards and
//! `Crawl-delay` are not interpreted. A robots.txt that cannot be fetched
//! leaves the site crawlable.

use std::sync::Arc;

use moka::future::Cache;

use crate::job::CrawlConfig;
use crate::models::NormalizedUrl;
use crate::traits::Fetcher;

/// Disallowed path prefixes for one origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    disallowed: Vec<String>,
}

impl RobotsRules {
    /// Rules that refuse nothing.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn parse(body: &str, marker: &str) -> Self {
        let disallowed = body
            .match_indices(marker)
            .filter_map(|(idx, _)| {
                let rest = &body[idx + marker.len()..];
                // An empty directive disallows nothing; don't borrow a token
                // from the next line.
                rest.lines().next()?.split_whitespace().next()
            })
            .map(str::to_string)
            .collect();
        Self { disallowed }
    }

    pub fn is_allowed(&self, path: &str) -> bool {
        !self.disallowed.iter().any(|prefix| path.starts_with(prefix))
    }

    pub fn disallowed(&self) -> &[String] {
        &self.disallowed
    }
}

/// Answers "may I fetch this URL", fetching each origin's robots.txt once per run.
#[derive(Clone)]
pub struct RobotsChecker<F: Fetcher> {
    fetcher: F,
    marker: String,
    max_bytes: usize,
    cache: Cache<String, Arc<RobotsRules>>,
}

impl<F: Fetcher> RobotsChecker<F> {
    pub fn new(fetcher: F, config: &CrawlConfig) -> Self {
        Self {
            fetcher,
            marker: config.disallow_marker.clone(),
            max_bytes: config.robots_max_bytes,
            cache: Cache::new(config.robots_cache_capacity),
        }
    }

    pub async fn is_allowed(&self, url: &NormalizedUrl) -> bool {
        let origin = url.origin_key();
        let rules = self
            .cache
            .get_with(origin.clone(), async {
                Arc::new(self.load(&origin).await)
            })
            .await;

        let allowed = rules.is_allowed(url.path());
        if !allowed {
            tracing::debug!(url = %url, "Disallowed by robots.txt");
        }
        allowed
    }

    async fn load(&self, origin: &str) -> RobotsRules {
        let robots_url = match NormalizedUrl::parse(&format!("{origin}/robots.txt")) {
            Ok(u) => u,
            Err(e) => {
                tracing::debug!(%origin, error = %e, "Cannot derive robots.txt URL; treating site as crawl-safe");
                return RobotsRules::allow_all();
            }
        };

        match self.fetcher.fetch(&robots_url, self.max_bytes).await {
            Ok(result) => {
                let rules = RobotsRules::parse(&result.content, &self.marker);
                tracing::debug!(
                    url = %robots_url,
                    disallowed = rules.disallowed.len(),
                    "Loaded robots.txt"
                );
                rules
            }
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "robots.txt unavailable; treating site as crawl-safe");
                RobotsRules::allow_all()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrawlError;
    use crate::testutil::MockFetcher;

    const ROBOTS: &str = "User-agent: *\nDisallow: /private/\nDisallow: /tmp\nDisallow:\nAllow: /private/open\n";

    fn url(s: &str) -> NormalizedUrl {
        NormalizedUrl::parse(s).unwrap()
    }

    #[test]
    fn parse_collects_disallow_prefixes() {
        let rules = RobotsRules::parse(ROBOTS, "Disallow:");
        assert_eq!(rules.disallowed(), &["/private/".to_string(), "/tmp".to_string()]);
    }

    #[test]
    fn prefix_matching() {
        let rules = RobotsRules::parse(ROBOTS, "Disallow:");
        assert!(!rules.is_allowed("/private/data.html"));
        assert!(!rules.is_allowed("/tmpfiles/x"));
        assert!(rules.is_allowed("/public/"));
        // Allow: is not interpreted.
        assert!(!rules.is_allowed("/private/open"));
    }

    #[test]
    fn disallow_root_blocks_everything() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /\n", "Disallow:");
        assert!(!rules.is_allowed("/"));
        assert!(!rules.is_allowed("/anything"));
    }

    #[test]
    fn custom_marker() {
        let rules = RobotsRules::parse("disallow: /a\nDisallow: /b\n", "disallow:");
        assert!(!rules.is_allowed("/a"));
        assert!(rules.is_allowed("/b"));
    }

    #[tokio::test]
    async fn checker_applies_fetched_rules() {
        let fetcher = MockFetcher::new().with_page("http://example.com/robots.txt", ROBOTS);
        let checker = RobotsChecker::new(fetcher, &CrawlConfig::default());

        assert!(checker.is_allowed(&url("http://example.com/news/")).await);
        assert!(!checker.is_allowed(&url("http://example.com/private/x")).await);
    }

    #[tokio::test]
    async fn fetch_failure_is_fail_open() {
        let fetcher = MockFetcher::new().with_error(
            "http://example.com/robots.txt",
            CrawlError::NetworkError("connection refused".into()),
        );
        let checker = RobotsChecker::new(fetcher, &CrawlConfig::default());

        assert!(checker.is_allowed(&url("http://example.com/private/x")).await);
    }

    #[tokio::test]
    async fn robots_fetched_once_per_origin() {
        let fetcher = MockFetcher::new()
            .with_page("http://example.com/robots.txt", ROBOTS)
            .with_page("http://example.com:8080/robots.txt", "");
        let checker = RobotsChecker::new(fetcher.clone(), &CrawlConfig::default());

        checker.is_allowed(&url("http://example.com/a")).await;
        checker.is_allowed(&url("http://example.com/b")).await;
        checker.is_allowed(&url("http://example.com:8080/private/x")).await;

        assert_eq!(
            fetcher.requested(),
            vec![
                "http://example.com/robots.txt".to_string(),
                "http://example.com:8080/robots.txt".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn robots_read_is_capped() {
        let fetcher = MockFetcher::new().with_page(
            "http://example.com/robots.txt",
            "Disallow: /a\nDisallow: /b\n",
        );
        let config = CrawlConfig::default().with_robots_max_bytes(12);
        let checker = RobotsChecker::new(fetcher, &config);

        assert!(!checker.is_allowed(&url("http://example.com/a")).await);
        // The second directive lies past the byte cap.
        assert!(checker.is_allowed(&url("http://example.com/b")).await);
    }
}
