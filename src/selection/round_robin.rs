//! Round-robin selection strategy

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use super::CandidateStrategy;
use crate::models::ProxyRecord;

/// Cycles through the candidate list with one monotonically increasing cursor
/// per operation key.
///
/// Uses atomic operations for lock-free cursor tracking.
#[derive(Default)]
pub struct RoundRobinStrategy {
    cursors: DashMap<String, AtomicUsize>,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CandidateStrategy for RoundRobinStrategy {
    fn pick<'a>(&self, key: &str, candidates: &'a [ProxyRecord]) -> Option<&'a ProxyRecord> {
        if candidates.is_empty() {
            return None;
        }

        let cursor = self
            .cursors
            .entry(key.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
        let idx = cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();

        candidates.get(idx)
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
