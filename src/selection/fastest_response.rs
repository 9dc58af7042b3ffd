//! Fastest-response selection strategy

use super::CandidateStrategy;
use crate::models::ProxyRecord;

/// Picks the candidate with the lowest measured average response time.
/// Candidates without a measurement are treated as worst-case.
#[derive(Default)]
pub struct FastestResponseStrategy;

impl FastestResponseStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl CandidateStrategy for FastestResponseStrategy {
    fn pick<'a>(&self, _key: &str, candidates: &'a [ProxyRecord]) -> Option<&'a ProxyRecord> {
        candidates.iter().min_by(|a, b| {
            let a_ms = a.avg_response_time_ms.unwrap_or(f64::INFINITY);
            let b_ms = b.avg_response_time_ms.unwrap_or(f64::INFINITY);
            a_ms.total_cmp(&b_ms).then_with(|| a.id.cmp(&b.id))
        })
    }

    fn name(&self) -> &'static str {
        "fastest_response"
    }
}
