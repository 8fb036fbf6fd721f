//! Decides whether a discovered link may enter the frontier.

use std::collections::HashSet;
use std::fmt;

use crate::job::CrawlJobSpec;
use crate::models::NormalizedUrl;

/// Outcome of evaluating one candidate link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Listed in the job's blocked URLs. Takes priority over every other rule.
    Blocked,
    /// Not `http`/`https`.
    UnsupportedScheme,
    /// On a different host than the seed while the crawl is domain-confined.
    OffDomain,
    /// On the seed host but outside the seed path.
    OutsidePath,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Admission::Admitted => "admitted",
            Admission::Blocked => "blocked",
            Admission::UnsupportedScheme => "unsupported scheme",
            Admission::OffDomain => "off domain",
            Admission::OutsidePath => "outside seed path",
        };
        f.write_str(s)
    }
}

/// Scope rules for one crawl run, anchored on the seed URL.
///
/// Precedence:
/// 1. `stay_below_given_path`: same host as the seed and path prefixed by the
///    seed path.
/// 2. otherwise, when the crawl is domain-confined (`stay_on_domain`, or an
///    unlimited page/depth budget): same host as the seed.
/// 3. otherwise any `http`/`https` URL.
///
/// The blocklist is consulted first and rejects regardless of 1-3.
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    seed_host: Option<String>,
    seed_path: String,
    below_path: bool,
    on_domain: bool,
    blocked: HashSet<NormalizedUrl>,
    warn_on_rejected: bool,
}

impl ScopePolicy {
    pub fn new(seed: &NormalizedUrl, spec: &CrawlJobSpec, blocked: HashSet<NormalizedUrl>) -> Self {
        Self {
            seed_host: seed.host().map(str::to_string),
            seed_path: seed.path().to_string(),
            below_path: spec.stay_below_given_path,
            on_domain: spec.confined_to_domain(),
            blocked,
            warn_on_rejected: spec.warn_on_rejected,
        }
    }

    /// True when the candidate may be enqueued.
    pub fn admit(&self, candidate: &NormalizedUrl) -> bool {
        let verdict = self.evaluate(candidate);
        match verdict {
            Admission::Admitted => {}
            Admission::Blocked if self.warn_on_rejected => {
                tracing::warn!(url = %candidate, "Rejected blocked URL");
            }
            other => {
                tracing::debug!(url = %candidate, reason = %other, "Rejected link");
            }
        }
        verdict.is_admitted()
    }

    /// Evaluate without logging.
    pub fn evaluate(&self, candidate: &NormalizedUrl) -> Admission {
        if self.blocked.contains(candidate) {
            return Admission::Blocked;
        }
        if !candidate.is_http() {
            return Admission::UnsupportedScheme;
        }
        if (self.below_path || self.on_domain) && !self.same_host(candidate) {
            return Admission::OffDomain;
        }
        if self.below_path && !candidate.path().starts_with(&self.seed_path) {
            return Admission::OutsidePath;
        }
        Admission::Admitted
    }

    fn same_host(&self, candidate: &NormalizedUrl) -> bool {
        match (&self.seed_host, candidate.host()) {
            (Some(seed), Some(host)) => seed.eq_ignore_ascii_case(host),
            _ => false,
        }
    }
}
