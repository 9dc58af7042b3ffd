//! Candidate selection with policy filtering and progressive relaxation
//!
//! The selector builds a filter from the operation's policy, queries the
//! store, and — when the candidate set comes back empty — relaxes the
//! constraints one step at a time in a configured order before giving up.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PoolError, Result};
use crate::models::{OperationPolicy, OperationType, ProxyRecord};
use crate::selection::{StrategyKind, StrategySet};
use crate::store::{ProxyFilter, ProxyStore};

/// One constraint-relaxation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxationStep {
    /// Stop requiring the candidate's country to match the request
    DropCountryMatch,
    /// Widen the allowed proxy types to any
    AnyProxyType,
    /// Lower the minimum reputation to the configured floor
    LowerReputation,
}

impl RelaxationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelaxationStep::DropCountryMatch => "drop_country_match",
            RelaxationStep::AnyProxyType => "any_proxy_type",
            RelaxationStep::LowerReputation => "lower_reputation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "drop_country_match" | "country" => Some(RelaxationStep::DropCountryMatch),
            "any_proxy_type" | "proxy_type" => Some(RelaxationStep::AnyProxyType),
            "lower_reputation" | "reputation" => Some(RelaxationStep::LowerReputation),
            _ => None,
        }
    }
}

/// Selector configuration
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Order in which constraints are relaxed when no candidate matches.
    /// Default: country match, then proxy type, then reputation floor.
    pub relaxation_order: Vec<RelaxationStep>,
    /// Reputation lower bound applied by the `LowerReputation` step
    pub reputation_floor: i32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            relaxation_order: vec![
                RelaxationStep::DropCountryMatch,
                RelaxationStep::AnyProxyType,
                RelaxationStep::LowerReputation,
            ],
            reputation_floor: 0,
        }
    }
}

/// One query attempt in a selection plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub filter: ProxyFilter,
    /// Relaxations applied so far, in the order they fired
    pub relaxations: Vec<RelaxationStep>,
}

/// Result of a successful selection
#[derive(Debug, Clone)]
pub struct Selection {
    pub record: ProxyRecord,
    /// Relaxation steps that had to fire before a candidate was found
    pub relaxations: Vec<RelaxationStep>,
    pub strategy: &'static str,
}

/// Policy-driven proxy selector
pub struct Selector {
    store: Arc<dyn ProxyStore>,
    strategies: StrategySet,
    config: SelectorConfig,
}

impl Selector {
    pub fn new(store: Arc<dyn ProxyStore>, config: SelectorConfig) -> Self {
        Self {
            store,
            strategies: StrategySet::new(),
            config,
        }
    }

    /// Build the ordered list of filters to try: the strict policy filter
    /// first, then one additional entry per relaxation step that actually
    /// loosens the filter. No-op steps (e.g. dropping a country match that
    /// was never required) produce no entry.
    pub fn plan(&self, policy: &OperationPolicy, country_code: Option<&str>) -> Vec<PlanStep> {
        let base = ProxyFilter {
            active: Some(true),
            proxy_types: policy.allowed_proxy_types.clone(),
            min_reputation: Some(policy.min_reputation),
            country_code: if policy.require_country_match {
                country_code.map(str::to_string)
            } else {
                None
            },
        };

        let mut steps = vec![PlanStep {
            filter: base.clone(),
            relaxations: Vec::new(),
        }];

        let mut current = base;
        let mut applied = Vec::new();
        for &step in &self.config.relaxation_order {
            let mut relaxed = current.clone();
            match step {
                RelaxationStep::DropCountryMatch => relaxed.country_code = None,
                RelaxationStep::AnyProxyType => relaxed.proxy_types.clear(),
                RelaxationStep::LowerReputation => {
                    relaxed.min_reputation = Some(self.config.reputation_floor)
                }
            }

            if relaxed == current {
                continue;
            }

            applied.push(step);
            steps.push(PlanStep {
                filter: relaxed.clone(),
                relaxations: applied.clone(),
            });
            current = relaxed;
        }

        steps
    }

    /// Select one proxy for the operation, relaxing constraints as needed.
    pub async fn select(
        &self,
        operation: OperationType,
        policy: &OperationPolicy,
        country_code: Option<&str>,
        strategy: StrategyKind,
    ) -> Result<Selection> {
        for step in self.plan(policy, country_code) {
            let candidates = self.store.query(&step.filter).await?;
            if candidates.is_empty() {
                continue;
            }

            if let Some(last) = step.relaxations.last() {
                warn!(
                    operation = %operation,
                    relaxation = last.as_str(),
                    candidates = candidates.len(),
                    "Constraint relaxation fired during proxy selection"
                );
            }

            let strategy_impl = self.strategies.get(strategy);
            let record = strategy_impl
                .pick(operation.as_str(), &candidates)
                .ok_or(PoolError::NoProxyAvailable)?
                .clone();

            debug!(
                operation = %operation,
                proxy_id = record.id,
                strategy = strategy_impl.name(),
                "Selected proxy"
            );

            return Ok(Selection {
                record,
                relaxations: step.relaxations,
                strategy: strategy_impl.name(),
            });
        }

        warn!(operation = %operation, "No proxy available after exhausting all relaxation steps");
        Err(PoolError::NoProxyAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewProxy, PolicyTable, ProxyProtocol, ProxyType};
    use crate::store::MemoryStore;

    async fn seed(
        store: &MemoryStore,
        host: &str,
        country: &str,
        score: i32,
        proxy_type: ProxyType,
        active: bool,
    ) -> i64 {
        store
            .upsert(&NewProxy {
                host: host.to_string(),
                port: 1080,
                provider: "test".to_string(),
                protocol: ProxyProtocol::Socks5,
                country_code: Some(country.to_string()),
                proxy_type: Some(proxy_type),
                username: None,
                secret: None,
            })
            .await
            .unwrap();

        let record = store
            .all()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.host == host)
            .unwrap();
        store
            .apply_update(record.id, &|r| {
                r.reputation_score = score;
                r.active = active;
            })
            .await
            .unwrap();
        record.id
    }

    fn login_policy() -> OperationPolicy {
        PolicyTable::default().get(OperationType::Login)
    }

    #[tokio::test]
    async fn test_policy_filtering_scenario() {
        let store = Arc::new(MemoryStore::new());
        // A(US, rep 80), B(US, rep 40), C(GB, rep 90) - all active residential
        let a = seed(&store, "10.0.0.1", "US", 80, ProxyType::Residential, true).await;
        seed(&store, "10.0.0.2", "US", 40, ProxyType::Residential, true).await;
        seed(&store, "10.0.0.3", "GB", 90, ProxyType::Residential, true).await;

        let selector = Selector::new(store, SelectorConfig::default());
        let selection = selector
            .select(
                OperationType::Login,
                &login_policy(),
                Some("US"),
                StrategyKind::BestReputation,
            )
            .await
            .unwrap();

        // B fails the reputation filter, C fails the country filter
        assert_eq!(selection.record.id, a);
        assert!(selection.relaxations.is_empty());
    }

    #[tokio::test]
    async fn test_relaxation_fires_in_order() {
        let store = Arc::new(MemoryStore::new());
        // Only qualifying proxy is in GB; the country constraint must be
        // dropped before it becomes visible.
        seed(&store, "10.0.0.1", "GB", 90, ProxyType::Residential, true).await;

        let selector = Selector::new(store.clone(), SelectorConfig::default());
        let selection = selector
            .select(
                OperationType::Login,
                &login_policy(),
                Some("US"),
                StrategyKind::BestReputation,
            )
            .await
            .unwrap();

        assert_eq!(selection.relaxations, vec![RelaxationStep::DropCountryMatch]);
    }

    #[tokio::test]
    async fn test_reputation_floor_is_last_resort() {
        let store = Arc::new(MemoryStore::new());
        // Wrong country, wrong type, low reputation: every step must fire.
        seed(&store, "10.0.0.1", "GB", 10, ProxyType::Free, true).await;

        let selector = Selector::new(store, SelectorConfig::default());
        let selection = selector
            .select(
                OperationType::Login,
                &login_policy(),
                Some("US"),
                StrategyKind::BestReputation,
            )
            .await
            .unwrap();

        assert_eq!(
            selection.relaxations,
            vec![
                RelaxationStep::DropCountryMatch,
                RelaxationStep::AnyProxyType,
                RelaxationStep::LowerReputation,
            ]
        );
    }

    #[tokio::test]
    async fn test_no_proxy_available_after_exhaustion() {
        let store = Arc::new(MemoryStore::new());
        // Only an inactive proxy exists; no relaxation step touches `active`.
        seed(&store, "10.0.0.1", "US", 90, ProxyType::Residential, false).await;

        let selector = Selector::new(store, SelectorConfig::default());
        let err = selector
            .select(
                OperationType::Login,
                &login_policy(),
                Some("US"),
                StrategyKind::BestReputation,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PoolError::NoProxyAvailable));
    }

    #[tokio::test]
    async fn test_plan_follows_configured_order() {
        let store = Arc::new(MemoryStore::new());
        let config = SelectorConfig {
            relaxation_order: vec![
                RelaxationStep::LowerReputation,
                RelaxationStep::DropCountryMatch,
                RelaxationStep::AnyProxyType,
            ],
            reputation_floor: 0,
        };
        let selector = Selector::new(store, config);

        let plan = selector.plan(&login_policy(), Some("US"));
        assert_eq!(plan.len(), 4);
        assert!(plan[0].relaxations.is_empty());
        assert_eq!(plan[1].relaxations, vec![RelaxationStep::LowerReputation]);
        assert_eq!(
            plan[3].relaxations,
            vec![
                RelaxationStep::LowerReputation,
                RelaxationStep::DropCountryMatch,
                RelaxationStep::AnyProxyType,
            ]
        );

        // Reputation was relaxed first, so the first relaxed filter keeps the
        // country constraint.
        assert_eq!(plan[1].filter.country_code.as_deref(), Some("US"));
        assert_eq!(plan[1].filter.min_reputation, Some(0));
    }

    #[tokio::test]
    async fn test_plan_skips_noop_steps() {
        let store = Arc::new(MemoryStore::new());
        let selector = Selector::new(store, SelectorConfig::default());

        // No country supplied: DropCountryMatch has nothing to drop.
        let plan = selector.plan(&login_policy(), None);
        assert!(plan
            .iter()
            .all(|s| !s.relaxations.contains(&RelaxationStep::DropCountryMatch)));

        // TESTING policy already allows any type at reputation 0: only the
        // strict filter remains.
        let policy = PolicyTable::default().get(OperationType::Testing);
        let plan = selector.plan(&policy, None);
        assert_eq!(plan.len(), 1);
    }
}
