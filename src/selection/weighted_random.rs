//! Reputation-weighted random selection strategy

use rand::Rng;

use super::CandidateStrategy;
use crate::models::ProxyRecord;

/// Minimum sampling weight so that score-0 candidates can still recover
/// through occasional selection.
const FLOOR_WEIGHT: i64 = 1;

/// Draws a candidate with probability proportional to its reputation score.
#[derive(Default)]
pub struct WeightedRandomStrategy;

impl WeightedRandomStrategy {
    pub fn new() -> Self {
        Self
    }

    fn weight(record: &ProxyRecord) -> i64 {
        (record.reputation_score as i64).max(FLOOR_WEIGHT)
    }
}

impl CandidateStrategy for WeightedRandomStrategy {
    fn pick<'a>(&self, _key: &str, candidates: &'a [ProxyRecord]) -> Option<&'a ProxyRecord> {
        if candidates.is_empty() {
            return None;
        }

        let total: i64 = candidates.iter().map(Self::weight).sum();
        let mut draw = rand::thread_rng().gen_range(0..total);

        for candidate in candidates {
            draw -= Self::weight(candidate);
            if draw < 0 {
                return Some(candidate);
            }
        }

        // Unreachable: draw < total and total is the sum of all weights
        candidates.last()
    }

    fn name(&self) -> &'static str {
        "weighted_random"
    }
}
