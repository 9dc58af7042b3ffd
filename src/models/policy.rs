use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::ProxyType;
use crate::selection::StrategyKind;

/// Operation category performed through a selected proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    AccountCreation,
    Verification,
    Login,
    OtpRetrieval,
    MessageSend,
    BulkOperation,
    Testing,
    General,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::AccountCreation => "ACCOUNT_CREATION",
            OperationType::Verification => "VERIFICATION",
            OperationType::Login => "LOGIN",
            OperationType::OtpRetrieval => "OTP_RETRIEVAL",
            OperationType::MessageSend => "MESSAGE_SEND",
            OperationType::BulkOperation => "BULK_OPERATION",
            OperationType::Testing => "TESTING",
            OperationType::General => "GENERAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ACCOUNT_CREATION" => Some(OperationType::AccountCreation),
            "VERIFICATION" => Some(OperationType::Verification),
            "LOGIN" => Some(OperationType::Login),
            "OTP_RETRIEVAL" => Some(OperationType::OtpRetrieval),
            "MESSAGE_SEND" => Some(OperationType::MessageSend),
            "BULK_OPERATION" => Some(OperationType::BulkOperation),
            "TESTING" => Some(OperationType::Testing),
            "GENERAL" => Some(OperationType::General),
            _ => None,
        }
    }

    pub fn all() -> [OperationType; 8] {
        [
            OperationType::AccountCreation,
            OperationType::Verification,
            OperationType::Login,
            OperationType::OtpRetrieval,
            OperationType::MessageSend,
            OperationType::BulkOperation,
            OperationType::Testing,
            OperationType::General,
        ]
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Eligibility rules for one operation category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationPolicy {
    /// Minimum reputation score a candidate must carry
    #[serde(default)]
    pub min_reputation: i32,
    /// Allowed proxy types (empty = any)
    #[serde(default)]
    pub allowed_proxy_types: Vec<ProxyType>,
    /// Require the candidate's country to match the requested one
    #[serde(default)]
    pub require_country_match: bool,
    /// Strategy applied when no override is given
    #[serde(default)]
    pub default_strategy: StrategyKind,
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self {
            min_reputation: 30,
            allowed_proxy_types: Vec::new(),
            require_country_match: false,
            default_strategy: StrategyKind::RoundRobin,
        }
    }
}

/// Static mapping from operation category to eligibility rules.
///
/// Read-only on the selection path; an administrator may swap the whole table
/// at runtime (see `ProxyPool::reload_policies`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyTable {
    policies: HashMap<OperationType, OperationPolicy>,
}

impl PolicyTable {
    /// Look up the policy for an operation, falling back to GENERAL and then
    /// to built-in defaults when the table is partial.
    pub fn get(&self, operation: OperationType) -> OperationPolicy {
        if let Some(policy) = self.policies.get(&operation) {
            return policy.clone();
        }
        self.policies
            .get(&OperationType::General)
            .cloned()
            .unwrap_or_default()
    }

    pub fn insert(&mut self, operation: OperationType, policy: OperationPolicy) {
        self.policies.insert(operation, policy);
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        use ProxyType::{Datacenter, Mobile, Residential};

        let mut policies = HashMap::new();

        policies.insert(
            OperationType::AccountCreation,
            OperationPolicy {
                min_reputation: 70,
                allowed_proxy_types: vec![Residential, Mobile],
                require_country_match: true,
                default_strategy: StrategyKind::BestReputation,
            },
        );
        policies.insert(
            OperationType::Verification,
            OperationPolicy {
                min_reputation: 60,
                allowed_proxy_types: vec![Residential, Mobile],
                require_country_match: true,
                default_strategy: StrategyKind::BestReputation,
            },
        );
        policies.insert(
            OperationType::Login,
            OperationPolicy {
                min_reputation: 50,
                allowed_proxy_types: vec![Residential, Mobile, Datacenter],
                require_country_match: true,
                default_strategy: StrategyKind::BestReputation,
            },
        );
        policies.insert(
            OperationType::OtpRetrieval,
            OperationPolicy {
                min_reputation: 65,
                allowed_proxy_types: vec![Residential, Mobile],
                require_country_match: true,
                default_strategy: StrategyKind::FastestResponse,
            },
        );
        policies.insert(
            OperationType::MessageSend,
            OperationPolicy {
                min_reputation: 55,
                allowed_proxy_types: vec![Residential, Mobile],
                require_country_match: true,
                default_strategy: StrategyKind::LeastRecentlyUsed,
            },
        );
        policies.insert(
            OperationType::BulkOperation,
            OperationPolicy {
                min_reputation: 40,
                allowed_proxy_types: Vec::new(),
                require_country_match: false,
                default_strategy: StrategyKind::RoundRobin,
            },
        );
        policies.insert(
            OperationType::Testing,
            OperationPolicy {
                min_reputation: 0,
                allowed_proxy_types: Vec::new(),
                require_country_match: false,
                default_strategy: StrategyKind::Random,
            },
        );
        policies.insert(
            OperationType::General,
            OperationPolicy {
                min_reputation: 30,
                allowed_proxy_types: Vec::new(),
                require_country_match: false,
                default_strategy: StrategyKind::WeightedRandom,
            },
        );

        Self { policies }
    }
}
