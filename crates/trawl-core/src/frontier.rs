//! Work queue and dedup bookkeeping for one crawl run.

use std::collections::{HashSet, VecDeque};

use crate::models::NormalizedUrl;

/// A URL waiting to be fetched, with its link distance from the seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: NormalizedUrl,
    pub depth: u32,
}

/// FIFO of pending URLs plus the set of every URL ever enqueued.
///
/// `known` only grows: a URL is enqueued at most once per run, and a blocked
/// URL is never enqueued. Owned by the crawl loop alone.
#[derive(Debug, Default)]
pub struct Frontier {
    pending: VecDeque<FrontierEntry>,
    known: HashSet<NormalizedUrl>,
    blocked: HashSet<NormalizedUrl>,
}

impl Frontier {
    pub fn new(blocked: HashSet<NormalizedUrl>) -> Self {
        Self {
            pending: VecDeque::new(),
            known: HashSet::new(),
            blocked,
        }
    }

    /// Enqueue a URL unless it is blocked or already known. Returns whether it was added.
    pub fn push(&mut self, url: NormalizedUrl, depth: u32) -> bool {
        if self.blocked.contains(&url) || self.known.contains(&url) {
            return false;
        }
        self.known.insert(url.clone());
        self.pending.push_back(FrontierEntry { url, depth });
        true
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.pending.pop_front()
    }

    pub fn is_known(&self, url: &NormalizedUrl) -> bool {
        self.known.contains(url)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }
}
