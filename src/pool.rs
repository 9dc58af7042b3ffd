//! Proxy pool facade
//!
//! `ProxyPool` ties the store, the credential vault, and the selector
//! together behind the consumer-facing and administrative API. It is
//! explicitly constructed with its collaborators at startup; nothing here is
//! a process-wide singleton.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::error::{PoolError, Result};
use crate::models::{
    IngestReport, NewProxy, OperationType, PolicyTable, PoolSnapshot, ProxyHandle, ProxyProtocol,
    ProxyRecord, ProxyType, RawProxyEntry,
};
use crate::reputation;
use crate::selection::{Selection, Selector, SelectorConfig, StrategyKind};
use crate::store::ProxyStore;
use crate::vault::CredentialVault;

/// Error marker recorded on a proxy whose stored credentials can no longer
/// be decrypted (e.g. after a vault key rotation).
const DECRYPT_FAILURE_FLAG: &str = "credential decrypt failed; needs administrative attention";

/// Proxy pool manager
pub struct ProxyPool {
    store: Arc<dyn ProxyStore>,
    vault: Arc<dyn CredentialVault>,
    selector: Selector,
    policies: RwLock<PolicyTable>,
    /// Pool-level strategy override set by `set_strategy`; takes precedence
    /// over the per-operation policy default.
    strategy_override: RwLock<Option<StrategyKind>>,
}

impl ProxyPool {
    pub fn new(store: Arc<dyn ProxyStore>, vault: Arc<dyn CredentialVault>) -> Self {
        Self::with_config(store, vault, SelectorConfig::default(), PolicyTable::default())
    }

    pub fn with_config(
        store: Arc<dyn ProxyStore>,
        vault: Arc<dyn CredentialVault>,
        selector_config: SelectorConfig,
        policies: PolicyTable,
    ) -> Self {
        let selector = Selector::new(store.clone(), selector_config);
        Self {
            store,
            vault,
            selector,
            policies: RwLock::new(policies),
            strategy_override: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn ProxyStore> {
        &self.store
    }

    // ---- Consumer-facing API ----

    /// Select a proxy for the operation and hand back connection parameters.
    pub async fn select_proxy(
        &self,
        operation: OperationType,
        country_code: Option<&str>,
    ) -> Result<ProxyHandle> {
        self.select_proxy_with(operation, country_code, None).await
    }

    /// Select with an explicit per-call strategy override.
    pub async fn select_proxy_with(
        &self,
        operation: OperationType,
        country_code: Option<&str>,
        strategy_override: Option<StrategyKind>,
    ) -> Result<ProxyHandle> {
        let policy = self.policies.read().get(operation);
        let strategy = strategy_override
            .or(*self.strategy_override.read())
            .unwrap_or(policy.default_strategy);

        let Selection { record, .. } = self
            .selector
            .select(operation, &policy, country_code, strategy)
            .await?;

        let handle = self.build_handle(&record).await?;

        self.store
            .apply_update(record.id, &|r| r.last_used_at = Some(Utc::now()))
            .await?;

        Ok(handle)
    }

    /// Report the outcome of an operation performed through a proxy.
    ///
    /// The update is durably applied before this returns, so an immediate
    /// re-selection sees the freshest state.
    pub async fn report_outcome(
        &self,
        proxy_id: i64,
        success: bool,
        response_time_ms: Option<f64>,
    ) -> Result<ProxyRecord> {
        self.store
            .apply_update(proxy_id, &move |r| {
                reputation::apply_outcome(r, success, response_time_ms);
            })
            .await
    }

    /// Record a health-probe outcome; same reputation path as
    /// `report_outcome`, plus the health-check timestamp.
    pub async fn record_probe(
        &self,
        proxy_id: i64,
        success: bool,
        response_time_ms: Option<f64>,
    ) -> Result<ProxyRecord> {
        self.store
            .apply_update(proxy_id, &move |r| {
                reputation::apply_outcome(r, success, response_time_ms);
                r.last_health_check_at = Some(Utc::now());
            })
            .await
    }

    /// Decrypt a record's credentials into a connection handle.
    ///
    /// A decrypt failure deactivates and flags the record rather than being
    /// treated as a network failure.
    pub async fn build_handle(&self, record: &ProxyRecord) -> Result<ProxyHandle> {
        let protocol = record
            .protocol_enum()
            .ok_or_else(|| PoolError::UnsupportedProtocol(record.protocol.clone()))?;

        let port = u16::try_from(record.port)
            .map_err(|_| PoolError::InvalidEntry(format!("port out of range: {}", record.port)))?;

        let password = match &record.secret {
            Some(blob) => match self.vault.decrypt(blob) {
                Ok(plaintext) => Some(plaintext),
                Err(e) => {
                    error!(id = record.id, error = %e, "Credential decrypt failed, flagging proxy");
                    self.store
                        .apply_update(record.id, &|r| {
                            r.active = false;
                            r.last_error = Some(DECRYPT_FAILURE_FLAG.to_string());
                        })
                        .await?;
                    return Err(PoolError::CredentialDecrypt { id: record.id });
                }
            },
            None => None,
        };

        Ok(ProxyHandle {
            id: record.id,
            host: record.host.clone(),
            port,
            protocol,
            username: record.username.clone(),
            password,
        })
    }

    // ---- Administrative surface ----

    /// Ingest a batch of raw proxy listings from one provider.
    ///
    /// Malformed entries are skipped and counted; a partial ingestion is not
    /// an error. Secrets are encrypted before the store ever sees them.
    pub async fn ingest(&self, provider: &str, entries: &[RawProxyEntry]) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for entry in entries {
            let new_proxy = match self.validate(provider, entry) {
                Ok(p) => p,
                Err(e) => {
                    warn!(host = %entry.host, port = entry.port, error = %e, "Skipping malformed proxy entry");
                    report.record(crate::models::UpsertOutcome::Skipped);
                    continue;
                }
            };

            let outcome = self.store.upsert(&new_proxy).await?;
            report.record(outcome);
        }

        info!(
            provider,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            "Ingested proxy batch"
        );
        Ok(report)
    }

    fn validate(&self, provider: &str, entry: &RawProxyEntry) -> Result<NewProxy> {
        if entry.host.trim().is_empty() {
            return Err(PoolError::InvalidEntry("missing host".to_string()));
        }
        if entry.port == 0 {
            return Err(PoolError::InvalidEntry("port out of range".to_string()));
        }
        let protocol = ProxyProtocol::from_str(&entry.protocol)
            .ok_or_else(|| PoolError::UnsupportedProtocol(entry.protocol.clone()))?;

        let proxy_type = match &entry.proxy_type {
            Some(s) => Some(
                ProxyType::from_str(s)
                    .ok_or_else(|| PoolError::InvalidEntry(format!("unknown proxy type: {}", s)))?,
            ),
            None => None,
        };

        let secret = match &entry.secret {
            Some(plaintext) => Some(
                self.vault
                    .encrypt(plaintext)
                    .map_err(|e| PoolError::CredentialEncrypt(e.to_string()))?,
            ),
            None => None,
        };

        Ok(NewProxy {
            host: entry.host.trim().to_string(),
            port: entry.port as i32,
            provider: provider.to_string(),
            protocol,
            country_code: entry.country_code.clone(),
            proxy_type,
            username: entry.username.clone(),
            secret,
        })
    }

    /// Take a proxy out of rotation.
    pub async fn deactivate(&self, proxy_id: i64, reason: &str) -> Result<ProxyRecord> {
        let reason = reason.to_string();
        let record = self
            .store
            .apply_update(proxy_id, &move |r| {
                r.active = false;
                r.last_error = Some(reason.clone());
            })
            .await?;
        info!(id = proxy_id, "Deactivated proxy");
        Ok(record)
    }

    /// Put a proxy back into rotation, resetting its failure streak.
    pub async fn reactivate(&self, proxy_id: i64) -> Result<ProxyRecord> {
        let record = self
            .store
            .apply_update(proxy_id, &|r| {
                r.active = true;
                r.consecutive_failures = 0;
                r.last_error = None;
            })
            .await?;
        info!(id = proxy_id, "Reactivated proxy");
        Ok(record)
    }

    /// Permanently remove a proxy record.
    pub async fn purge(&self, proxy_id: i64) -> Result<bool> {
        self.store.purge(proxy_id).await
    }

    /// Set the pool-level default strategy, overriding per-policy defaults.
    pub fn set_strategy(&self, strategy: StrategyKind) {
        info!(strategy = strategy.as_str(), "Default strategy changed");
        *self.strategy_override.write() = Some(strategy);
    }

    /// Clear the pool-level strategy override, restoring policy defaults.
    pub fn clear_strategy(&self) {
        *self.strategy_override.write() = None;
    }

    pub fn default_strategy(&self) -> Option<StrategyKind> {
        *self.strategy_override.read()
    }

    /// Replace the operation policy table (administrative hot reload).
    pub fn reload_policies(&self, policies: PolicyTable) {
        info!(entries = policies.len(), "Operation policy table reloaded");
        *self.policies.write() = policies;
    }

    /// Aggregate statistics over the whole pool.
    pub async fn snapshot(&self) -> Result<PoolSnapshot> {
        let records = self.store.all().await?;

        let mut snapshot = PoolSnapshot {
            total: records.len(),
            ..Default::default()
        };

        let mut rate_sum = 0.0;
        let mut rated = 0usize;
        for record in &records {
            if record.active {
                snapshot.active += 1;
            }
            if let Some(ref country) = record.country_code {
                *snapshot.by_country.entry(country.clone()).or_insert(0) += 1;
            }
            *snapshot
                .by_type
                .entry(record.proxy_type.clone())
                .or_insert(0) += 1;
            if record.has_history() {
                rate_sum += record.success_rate;
                rated += 1;
            }
        }
        if rated > 0 {
            snapshot.avg_success_rate = rate_sum / rated as f64;
        }

        Ok(snapshot)
    }
}
