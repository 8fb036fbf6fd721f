use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::dispatch::{DispatchStats, Dispatcher};
use crate::error::CrawlError;
use crate::frontier::Frontier;
use crate::job::{CrawlConfig, CrawlJobSpec, FetchFailurePolicy};
use crate::links::extract_links;
use crate::models::{NormalizedUrl, PageRecord, compute_hash};
use crate::relevance::RelevanceFilter;
use crate::robots::RobotsChecker;
use crate::scope::ScopePolicy;
use crate::traits::{Fetcher, PageParser, PostingStore};

/// Why a crawl run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Every discovered URL was visited.
    Exhausted,
    /// The page budget was used up.
    BudgetReached,
    /// A page fetch failed under [`FetchFailurePolicy::Abort`].
    FetchFailed { url: String, error: String },
    Cancelled,
}

/// Per-run totals returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub run_id: Uuid,
    pub seed: NormalizedUrl,
    pub stop_reason: StopReason,
    pub pages_fetched: usize,
    pub relevant_pages: usize,
    pub robots_skipped: usize,
    pub fetch_failures: usize,
    pub links_enqueued: usize,
    pub dispatch: DispatchStats,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Events emitted by the crawl loop for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    Started {
        run_id: Uuid,
        seed: &'a NormalizedUrl,
    },
    RobotsDisallowed {
        url: &'a NormalizedUrl,
    },
    PageFetched {
        url: &'a NormalizedUrl,
        depth: u32,
        bytes: usize,
        truncated: bool,
        pages_fetched: usize,
        pending: usize,
    },
    PageIrrelevant {
        url: &'a NormalizedUrl,
    },
    LinksQueued {
        url: &'a NormalizedUrl,
        discovered: usize,
        enqueued: usize,
    },
    PageDispatched {
        url: &'a NormalizedUrl,
        matched_keywords: &'a [String],
    },
    FetchFailed {
        url: &'a NormalizedUrl,
        error: &'a CrawlError,
        fatal: bool,
    },
    Draining {
        in_flight: usize,
    },
    Finished {
        report: &'a CrawlReport,
    },
}

/// Trait for receiving crawl events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::Started { run_id, seed } => {
                tracing::info!(%run_id, %seed, "Crawl started");
            }
            CrawlEvent::RobotsDisallowed { url } => {
                tracing::info!(%url, "Skipping URL disallowed by robots.txt");
            }
            CrawlEvent::PageFetched {
                url,
                depth,
                bytes,
                truncated,
                pages_fetched,
                pending,
            } => {
                tracing::info!(%url, depth, bytes, truncated, pages_fetched, pending, "Fetched page");
            }
            CrawlEvent::PageIrrelevant { url } => {
                tracing::debug!(%url, "No keyword match; not following links");
            }
            CrawlEvent::LinksQueued {
                url,
                discovered,
                enqueued,
            } => {
                tracing::debug!(%url, discovered, enqueued, "Queued links");
            }
            CrawlEvent::PageDispatched {
                url,
                matched_keywords,
            } => {
                tracing::debug!(%url, ?matched_keywords, "Dispatched page");
            }
            CrawlEvent::FetchFailed { url, error, fatal } => {
                if fatal {
                    tracing::error!(%url, %error, "Fetch failed; stopping crawl");
                } else {
                    tracing::warn!(%url, %error, "Fetch failed; skipping URL");
                }
            }
            CrawlEvent::Draining { in_flight } => {
                tracing::debug!(in_flight, "Waiting for dispatch to drain");
            }
            CrawlEvent::Finished { report } => {
                tracing::info!(
                    run_id = %report.run_id,
                    pages_scanned = report.pages_fetched,
                    relevant_pages = report.relevant_pages,
                    records_saved = report.dispatch.contents_saved,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    stop_reason = ?report.stop_reason,
                    "Crawl finished"
                );
            }
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    pages_fetched: usize,
    relevant_pages: usize,
    robots_skipped: usize,
    fetch_failures: usize,
    links_enqueued: usize,
}

/// Single-task crawl engine.
///
/// One URL is fetched, filtered, expanded and dispatched at a time. Generic
/// over the fetcher and both collaborators so tests can run without a network.
pub struct Crawler<F, P, S>
where
    F: Fetcher,
    P: PageParser,
    S: PostingStore,
{
    spec: CrawlJobSpec,
    config: CrawlConfig,
    fetcher: F,
    parser: P,
    store: S,
}

impl<F, P, S> Crawler<F, P, S>
where
    F: Fetcher,
    P: PageParser,
    S: PostingStore,
{
    pub fn new(spec: CrawlJobSpec, config: CrawlConfig, fetcher: F, parser: P, store: S) -> Self {
        Self {
            spec,
            config,
            fetcher,
            parser,
            store,
        }
    }

    /// Crawl from the seed until the frontier is exhausted, the page budget is
    /// spent, a page fetch fails fatally, or `cancel` fires.
    ///
    /// Only a malformed seed or unusable configuration is returned as an
    /// error; every other ending is described by [`CrawlReport::stop_reason`].
    pub async fn run<R: CrawlReporter>(
        &self,
        cancel: CancellationToken,
        reporter: &R,
    ) -> Result<CrawlReport, CrawlError> {
        self.config.validate()?;
        let seed = self.spec.seed()?;
        let relevance = RelevanceFilter::new(&self.spec.keywords)?;
        let blocked = self.spec.blocklist();
        let scope = ScopePolicy::new(&seed, &self.spec, blocked.clone());
        let robots = RobotsChecker::new(self.fetcher.clone(), &self.config);
        let dispatcher = Dispatcher::new(
            self.parser.clone(),
            self.store.clone(),
            &self.config.dispatch,
        );

        let mut frontier = Frontier::new(blocked);
        frontier.push(seed.clone(), 0);

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut tally = Tally::default();

        reporter.report(CrawlEvent::Started {
            run_id,
            seed: &seed,
        });

        let stop_reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if self.spec.max_pages.is_reached(tally.pages_fetched) {
                break StopReason::BudgetReached;
            }
            let Some(entry) = frontier.pop() else {
                break StopReason::Exhausted;
            };

            if self.config.respect_robots {
                let allowed = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break StopReason::Cancelled,
                    allowed = robots.is_allowed(&entry.url) => allowed,
                };
                if !allowed {
                    tally.robots_skipped += 1;
                    reporter.report(CrawlEvent::RobotsDisallowed { url: &entry.url });
                    continue;
                }
            }

            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => break StopReason::Cancelled,
                result = self.fetcher.fetch(&entry.url, self.config.max_content_bytes) => result,
            };

            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    tally.fetch_failures += 1;
                    let fatal = self.config.on_fetch_error == FetchFailurePolicy::Abort;
                    reporter.report(CrawlEvent::FetchFailed {
                        url: &entry.url,
                        error: &e,
                        fatal,
                    });
                    if fatal {
                        break StopReason::FetchFailed {
                            url: entry.url.to_string(),
                            error: e.to_string(),
                        };
                    }
                    continue;
                }
            };

            tally.pages_fetched += 1;
            reporter.report(CrawlEvent::PageFetched {
                url: &entry.url,
                depth: entry.depth,
                bytes: page.content_length,
                truncated: page.truncated,
                pages_fetched: tally.pages_fetched,
                pending: frontier.pending_len(),
            });

            let lowered = page.content.to_lowercase();
            if self.spec.only_relevant_pages && !relevance.is_relevant(&lowered) {
                reporter.report(CrawlEvent::PageIrrelevant { url: &entry.url });
                continue;
            }
            tally.relevant_pages += 1;

            if !self.spec.max_depth.is_reached(entry.depth as usize) {
                let links = extract_links(&entry.url, &page.content);
                let discovered = links.len();
                let mut enqueued = 0;
                for link in links {
                    if scope.admit(&link) && frontier.push(link, entry.depth + 1) {
                        enqueued += 1;
                    }
                }
                tally.links_enqueued += enqueued;
                reporter.report(CrawlEvent::LinksQueued {
                    url: &entry.url,
                    discovered,
                    enqueued,
                });
            }

            let record = PageRecord {
                matched_keywords: relevance.matched_keywords(&lowered),
                keywords: self.spec.keywords.clone(),
                tags: self.spec.tags.clone(),
                depth: entry.depth,
                content_hash: compute_hash(&page.content),
                fetched_at: Utc::now(),
                content: page.content,
                url: entry.url,
            };
            reporter.report(CrawlEvent::PageDispatched {
                url: &record.url,
                matched_keywords: &record.matched_keywords,
            });
            dispatcher.dispatch(record).await;
        };

        reporter.report(CrawlEvent::Draining {
            in_flight: dispatcher.in_flight(),
        });
        let dispatch = dispatcher.drain().await;

        let report = CrawlReport {
            run_id,
            seed,
            stop_reason,
            pages_fetched: tally.pages_fetched,
            relevant_pages: tally.relevant_pages,
            robots_skipped: tally.robots_skipped,
            fetch_failures: tally.fetch_failures,
            links_enqueued: tally.links_enqueued,
            dispatch,
            started_at,
            elapsed: clock.elapsed(),
        };
        reporter.report(CrawlEvent::Finished { report: &report });

        Ok(report)
    }
}
