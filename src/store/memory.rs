//! In-memory proxy store
//!
//! DashMap-backed store used for tests and single-process deployments.
//! Per-record atomicity comes from the map's entry locking; there is no
//! pool-wide lock on the selection path.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::error::{PoolError, Result};
use crate::models::{NewProxy, ProxyRecord, ProxyType, UpsertOutcome};
use crate::store::{Mutation, ProxyFilter, ProxyStore};

type IdentityKey = (String, i32, String);

/// DashMap-backed implementation of [`ProxyStore`]
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<i64, ProxyRecord>,
    identity: DashMap<IdentityKey, i64>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            identity: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    fn identity_key(entry: &NewProxy) -> IdentityKey {
        (entry.host.clone(), entry.port, entry.provider.clone())
    }

    fn fresh_record(&self, id: i64, entry: &NewProxy) -> ProxyRecord {
        let now = Utc::now();
        ProxyRecord {
            id,
            host: entry.host.clone(),
            port: entry.port,
            provider: entry.provider.clone(),
            protocol: entry.protocol.as_str().to_string(),
            username: entry.username.clone(),
            secret: entry.secret.clone(),
            country_code: entry.country_code.clone(),
            proxy_type: entry.proxy_type.unwrap_or(ProxyType::Datacenter).as_str().to_string(),
            reputation_score: 50,
            success_rate: 0.0,
            avg_response_time_ms: None,
            consecutive_failures: 0,
            total_uses: 0,
            active: true,
            last_error: None,
            last_used_at: None,
            last_health_check_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

#[async_trait]
impl ProxyStore for MemoryStore {
    async fn get(&self, id: i64) -> Result<Option<ProxyRecord>> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn query(&self, filter: &ProxyFilter) -> Result<Vec<ProxyRecord>> {
        let mut matches: Vec<ProxyRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.clone())
            .collect();
        matches.sort_by_key(|r| r.id);
        Ok(matches)
    }

    async fn all(&self) -> Result<Vec<ProxyRecord>> {
        self.query(&ProxyFilter::default()).await
    }

    async fn upsert(&self, entry: &NewProxy) -> Result<UpsertOutcome> {
        use dashmap::mapref::entry::Entry;

        match self.identity.entry(Self::identity_key(entry)) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                let mut record = self
                    .records
                    .get_mut(&id)
                    .ok_or(PoolError::ProxyNotFound { id })?;

                // Refresh transport fields only; quality metrics accumulate
                // across repeated ingestions of the same endpoint.
                record.protocol = entry.protocol.as_str().to_string();
                if entry.username.is_some() {
                    record.username = entry.username.clone();
                }
                if entry.secret.is_some() {
                    record.secret = entry.secret.clone();
                }
                if entry.country_code.is_some() {
                    record.country_code = entry.country_code.clone();
                }
                if let Some(pt) = entry.proxy_type {
                    record.proxy_type = pt.as_str().to_string();
                }
                record.updated_at = Utc::now();
                record.version += 1;

                Ok(UpsertOutcome::Updated)
            }
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                self.records.insert(id, self.fresh_record(id, entry));
                slot.insert(id);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn apply_update(&self, id: i64, mutate: Mutation<'_>) -> Result<ProxyRecord> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(PoolError::ProxyNotFound { id })?;

        mutate(&mut record);
        record.updated_at = Utc::now();
        record.version += 1;

        Ok(record.clone())
    }

    async fn purge(&self, id: i64) -> Result<bool> {
        match self.records.remove(&id) {
            Some((_, record)) => {
                self.identity
                    .remove(&(record.host, record.port, record.provider));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyProtocol;
    use std::sync::Arc;

    fn entry(host: &str, port: u16) -> NewProxy {
        NewProxy {
            host: host.to_string(),
            port: port as i32,
            provider: "prov-a".to_string(),
            protocol: ProxyProtocol::Socks5,
            country_code: None,
            proxy_type: None,
            username: None,
            secret: None,
        }
    }

    #[tokio::test]
    async fn test_insert_applies_defaults() {
        let store = MemoryStore::new();
        let outcome = store.upsert(&entry("1.2.3.4", 1080)).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let records = store.all().await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.proxy_type, "datacenter");
        assert_eq!(record.reputation_score, 50);
        assert!(record.active);
        assert_eq!(record.total_uses, 0);
    }

    #[tokio::test]
    async fn test_upsert_same_identity_is_idempotent_and_non_destructive() {
        let store = MemoryStore::new();
        store.upsert(&entry("1.2.3.4", 1080)).await.unwrap();

        let id = store.all().await.unwrap()[0].id;

        // Accumulate some quality history
        store
            .apply_update(id, &|r| {
                r.total_uses = 42;
                r.success_rate = 0.9;
                r.reputation_score = 80;
            })
            .await
            .unwrap();

        let mut second = entry("1.2.3.4", 1080);
        second.country_code = Some("US".to_string());
        let outcome = store.upsert(&second).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let records = store.all().await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.total_uses, 42);
        assert_eq!(record.reputation_score, 80);
        assert_eq!(record.country_code.as_deref(), Some("US"));
    }

    #[tokio::test]
    async fn test_same_endpoint_different_provider_inserts_new_row() {
        let store = MemoryStore::new();
        store.upsert(&entry("1.2.3.4", 1080)).await.unwrap();

        let mut other = entry("1.2.3.4", 1080);
        other.provider = "prov-b".to_string();
        let outcome = store.upsert(&other).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(store.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_query_is_ordered_by_ascending_id() {
        let store = MemoryStore::new();
        for port in [1084, 1081, 1083, 1082] {
            store.upsert(&entry("1.2.3.4", port)).await.unwrap();
        }

        let records = store.all().await.unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = MemoryStore::new();
        store.upsert(&entry("1.2.3.4", 1080)).await.unwrap();
        store.upsert(&entry("1.2.3.5", 1080)).await.unwrap();

        let ids: Vec<i64> = store.all().await.unwrap().iter().map(|r| r.id).collect();
        store
            .apply_update(ids[0], &|r| {
                r.reputation_score = 90;
                r.country_code = Some("US".to_string());
            })
            .await
            .unwrap();
        store
            .apply_update(ids[1], &|r| r.active = false)
            .await
            .unwrap();

        let filter = ProxyFilter {
            active: Some(true),
            min_reputation: Some(80),
            country_code: Some("US".to_string()),
            ..Default::default()
        };
        let records = store.query(&filter).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_apply_update_unknown_id() {
        let store = MemoryStore::new();
        let err = store.apply_update(99, &|_| {}).await.unwrap_err();
        assert!(matches!(err, PoolError::ProxyNotFound { id: 99 }));
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_lose_writes() {
        let store = Arc::new(MemoryStore::new());
        store.upsert(&entry("1.2.3.4", 1080)).await.unwrap();
        let id = store.all().await.unwrap()[0].id;

        let mut tasks = Vec::new();
        for _ in 0..100 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .apply_update(id, &|r| r.total_uses += 1)
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.total_uses, 100);
        assert_eq!(record.version, 100);
    }

    #[tokio::test]
    async fn test_purge_removes_identity() {
        let store = MemoryStore::new();
        store.upsert(&entry("1.2.3.4", 1080)).await.unwrap();
        let id = store.all().await.unwrap()[0].id;

        assert!(store.purge(id).await.unwrap());
        assert!(!store.purge(id).await.unwrap());

        // Re-ingesting the purged endpoint inserts a fresh row
        let outcome = store.upsert(&entry("1.2.3.4", 1080)).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
    }
}
