//! Least-recently-used selection strategy

use super::CandidateStrategy;
use crate::models::ProxyRecord;

/// Picks the candidate with the oldest `last_used_at`; never-used candidates
/// come first.
#[derive(Default)]
pub struct LeastRecentlyUsedStrategy;

impl LeastRecentlyUsedStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl CandidateStrategy for LeastRecentlyUsedStrategy {
    fn pick<'a>(&self, _key: &str, candidates: &'a [ProxyRecord]) -> Option<&'a ProxyRecord> {
        // Option<DateTime> orders None before Some, so never-used candidates
        // win; ties resolve to the lowest id.
        candidates.iter().min_by_key(|r| (r.last_used_at, r.id))
    }

    fn name(&self) -> &'static str {
        "least_recently_used"
    }
}
