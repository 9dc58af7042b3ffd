//! Best-reputation selection strategy

use std::cmp::Ordering;

use super::CandidateStrategy;
use crate::models::ProxyRecord;

/// Picks the highest reputation score; ties broken by lowest average
/// response time (no measurement sorts last), then by lowest id.
#[derive(Default)]
pub struct BestReputationStrategy;

impl BestReputationStrategy {
    pub fn new() -> Self {
        Self
    }

    fn compare(a: &ProxyRecord, b: &ProxyRecord) -> Ordering {
        b.reputation_score
            .cmp(&a.reputation_score)
            .then_with(|| {
                let a_ms = a.avg_response_time_ms.unwrap_or(f64::INFINITY);
                let b_ms = b.avg_response_time_ms.unwrap_or(f64::INFINITY);
                a_ms.total_cmp(&b_ms)
            })
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl CandidateStrategy for BestReputationStrategy {
    fn pick<'a>(&self, _key: &str, candidates: &'a [ProxyRecord]) -> Option<&'a ProxyRecord> {
        candidates.iter().min_by(|a, b| Self::compare(a, b))
    }

    fn name(&self) -> &'static str {
        "best_reputation"
    }
}
