//! Hand-off of admitted pages to the parser and the persistence collaborators.
//!
//! Each page goes through: parse → for every posting, save author → save
//! content → (optionally) save to graph. Failures are logged and counted; the
//! engine never retries or rolls back on a collaborator error.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use crate::job::{DispatchConfig, DispatchMode};
use crate::models::{PageRecord, PostingRecord};
use crate::traits::{PageParser, PostingStore};

/// Totals for one run's dispatch side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub pages_dispatched: u64,
    pub parse_failures: u64,
    pub records_extracted: u64,
    pub authors_saved: u64,
    pub contents_saved: u64,
    pub graph_saved: u64,
    pub store_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    pages_dispatched: AtomicU64,
    parse_failures: AtomicU64,
    records_extracted: AtomicU64,
    authors_saved: AtomicU64,
    contents_saved: AtomicU64,
    graph_saved: AtomicU64,
    store_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            pages_dispatched: self.pages_dispatched.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            records_extracted: self.records_extracted.load(Ordering::Relaxed),
            authors_saved: self.authors_saved.load(Ordering::Relaxed),
            contents_saved: self.contents_saved.load(Ordering::Relaxed),
            graph_saved: self.graph_saved.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

/// Bounded background execution for pooled dispatch.
struct Pool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
}

/// Runs page hand-offs inline or on a bounded set of background tasks.
///
/// In pooled mode at most `workers` pages are in flight; `dispatch` waits for
/// a free slot, which pushes back on the crawl loop. [`drain`](Self::drain)
/// waits for every spawned hand-off, so a run never reports completion with
/// work still outstanding.
pub struct Dispatcher<P, S>
where
    P: PageParser,
    S: PostingStore,
{
    parser: P,
    store: S,
    save_to_graph: bool,
    pool: Option<Pool>,
    counters: Arc<Counters>,
}

impl<P, S> Dispatcher<P, S>
where
    P: PageParser,
    S: PostingStore,
{
    pub fn new(parser: P, store: S, config: &DispatchConfig) -> Self {
        let pool = match config.mode {
            DispatchMode::Inline => None,
            DispatchMode::Pooled { workers } => Some(Pool {
                permits: Arc::new(Semaphore::new(workers.max(1))),
                tracker: TaskTracker::new(),
            }),
        };

        Self {
            parser,
            store,
            save_to_graph: config.save_to_graph,
            pool,
            counters: Arc::new(Counters::default()),
        }
    }

    pub async fn dispatch(&self, page: PageRecord) {
        Counters::bump(&self.counters.pages_dispatched);

        let Some(pool) = &self.pool else {
            handle_page(&self.parser, &self.store, self.save_to_graph, &self.counters, &page)
                .await;
            return;
        };

        let permit = match Arc::clone(&pool.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // The semaphore is never closed; run inline rather than drop the page.
                handle_page(&self.parser, &self.store, self.save_to_graph, &self.counters, &page)
                    .await;
                return;
            }
        };

        let parser = self.parser.clone();
        let store = self.store.clone();
        let counters = Arc::clone(&self.counters);
        let save_to_graph = self.save_to_graph;
        pool.tracker.spawn(async move {
            let _permit = permit;
            handle_page(&parser, &store, save_to_graph, &counters, &page).await;
        });
    }

    /// Number of hand-offs currently running in the background.
    pub fn in_flight(&self) -> usize {
        self.pool.as_ref().map_or(0, |pool| pool.tracker.len())
    }

    /// Wait for all outstanding hand-offs and return the totals.
    pub async fn drain(&self) -> DispatchStats {
        if let Some(pool) = &self.pool {
            pool.tracker.close();
            pool.tracker.wait().await;
        }
        self.counters.snapshot()
    }
}

async fn handle_page<P, S>(
    parser: &P,
    store: &S,
    save_to_graph: bool,
    counters: &Counters,
    page: &PageRecord,
) where
    P: PageParser,
    S: PostingStore,
{
    let records = match parser.submit(page).await {
        Ok(records) => records,
        Err(e) => {
            Counters::bump(&counters.parse_failures);
            tracing::warn!(url = %page.url, error = %e, "Parser rejected page");
            return;
        }
    };

    tracing::debug!(url = %page.url, records = records.len(), "Parsed page");
    for record in &records {
        Counters::bump(&counters.records_extracted);
        persist(store, save_to_graph, counters, record).await;
    }
}

/// Author first, then content, then graph. A failed step skips the rest of
/// that record.
async fn persist<S: PostingStore>(
    store: &S,
    save_to_graph: bool,
    counters: &Counters,
    record: &PostingRecord,
) {
    if let Err(e) = store.save_author(&record.author).await {
        Counters::bump(&counters.store_failures);
        tracing::warn!(author = %record.author.id, error = %e, "Failed to save author");
        return;
    }
    Counters::bump(&counters.authors_saved);

    if let Err(e) = store.save_content(&record.content).await {
        Counters::bump(&counters.store_failures);
        tracing::warn!(content_id = %record.content.id, error = %e, "Failed to save content");
        return;
    }
    Counters::bump(&counters.contents_saved);

    if save_to_graph {
        match store.save_to_graph(&record.content).await {
            Ok(()) => Counters::bump(&counters.graph_saved),
            Err(e) => {
                Counters::bump(&counters.store_failures);
                tracing::warn!(content_id = %record.content.id, error = %e, "Failed to save content to graph");
            }
        }
    }
}
