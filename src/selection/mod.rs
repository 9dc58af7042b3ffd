//! Proxy selection strategies
//!
//! This module provides the load-balancing strategies applied to a filtered,
//! id-ordered candidate set. Strategies are resolved into concrete values
//! once at configuration time, never re-parsed from a string per call.

mod best_reputation;
mod fastest_response;
mod least_recently_used;
mod random;
mod round_robin;
mod selector;
mod weighted_random;

pub use best_reputation::BestReputationStrategy;
pub use fastest_response::FastestResponseStrategy;
pub use least_recently_used::LeastRecentlyUsedStrategy;
pub use random::RandomStrategy;
pub use round_robin::RoundRobinStrategy;
pub use selector::{RelaxationStep, Selection, Selector, SelectorConfig};
pub use weighted_random::WeightedRandomStrategy;

use serde::{Deserialize, Serialize};

use crate::models::ProxyRecord;

/// Strategy identifiers for proxy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    RoundRobin,
    LeastRecentlyUsed,
    WeightedRandom,
    BestReputation,
    FastestResponse,
    Random,
}

impl StrategyKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "round_robin" | "roundrobin" | "round-robin" => Some(Self::RoundRobin),
            "least_recently_used" | "lru" => Some(Self::LeastRecentlyUsed),
            "weighted_random" | "weighted" => Some(Self::WeightedRandom),
            "best_reputation" | "best" => Some(Self::BestReputation),
            "fastest_response" | "fastest" => Some(Self::FastestResponse),
            "random" => Some(Self::Random),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::LeastRecentlyUsed => "least_recently_used",
            Self::WeightedRandom => "weighted_random",
            Self::BestReputation => "best_reputation",
            Self::FastestResponse => "fastest_response",
            Self::Random => "random",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for proxy selection strategies
///
/// `pick` operates on an id-ordered candidate list that has already passed
/// the operation policy filter. The `key` identifies the operation so that
/// stateful strategies (round-robin) keep one cursor per operation class.
pub trait CandidateStrategy: Send + Sync {
    /// Pick one candidate, or None when the list is empty.
    fn pick<'a>(&self, key: &str, candidates: &'a [ProxyRecord]) -> Option<&'a ProxyRecord>;

    /// Get the strategy name
    fn name(&self) -> &'static str;
}

/// All strategies, constructed once at startup.
#[derive(Default)]
pub struct StrategySet {
    round_robin: RoundRobinStrategy,
    least_recently_used: LeastRecentlyUsedStrategy,
    weighted_random: WeightedRandomStrategy,
    best_reputation: BestReputationStrategy,
    fastest_response: FastestResponseStrategy,
    random: RandomStrategy,
}

impl StrategySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: StrategyKind) -> &dyn CandidateStrategy {
        match kind {
            StrategyKind::RoundRobin => &self.round_robin,
            StrategyKind::LeastRecentlyUsed => &self.least_recently_used,
            StrategyKind::WeightedRandom => &self.weighted_random,
            StrategyKind::BestReputation => &self.best_reputation,
            StrategyKind::FastestResponse => &self.fastest_response,
            StrategyKind::Random => &self.random,
        }
    }
}
