//! Uniform random selection strategy

use rand::seq::SliceRandom;

use super::CandidateStrategy;
use crate::models::ProxyRecord;

/// Picks a candidate uniformly at random.
#[derive(Default)]
pub struct RandomStrategy;

impl RandomStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl CandidateStrategy for RandomStrategy {
    fn pick<'a>(&self, _key: &str, candidates: &'a [ProxyRecord]) -> Option<&'a ProxyRecord> {
        let mut rng = rand::thread_rng();
        candidates.choose(&mut rng)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support;

    #[test]
    fn test_empty_candidates() {
        let strategy = RandomStrategy::new();
        assert!(strategy.pick("GENERAL", &[]).is_none());
    }

    #[test]
    fn test_selection_stays_in_bounds() {
        let strategy = RandomStrategy::new();
        let candidates: Vec<_> = (1..=3).map(test_support::record).collect();

        for _ in 0..50 {
            let picked = strategy.pick("GENERAL", &candidates).unwrap();
            assert!((1..=3).contains(&picked.id));
        }
    }

    #[test]
    fn test_single_candidate() {
        let strategy = RandomStrategy::new();
        let candidates = vec![test_support::record(7)];
        assert_eq!(strategy.pick("GENERAL", &candidates).unwrap().id, 7);
    }
}
