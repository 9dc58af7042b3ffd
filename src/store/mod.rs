//! Proxy store
//!
//! Durable collection of proxy records behind a backend-agnostic trait.
//! Queries return candidates in ascending-id order so that selection
//! strategies are the only source of variability; updates are atomic per
//! record, never pool-wide.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewProxy, ProxyRecord, ProxyType, UpsertOutcome};

/// Record-level mutation applied under the store's per-record atomicity
/// guarantee.
pub type Mutation<'a> = &'a (dyn Fn(&mut ProxyRecord) + Send + Sync);

/// Candidate filter for selection queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyFilter {
    pub active: Option<bool>,
    /// Allowed proxy types (empty = any)
    pub proxy_types: Vec<ProxyType>,
    pub min_reputation: Option<i32>,
    pub country_code: Option<String>,
}

impl ProxyFilter {
    /// Evaluate the filter against one record.
    pub fn matches(&self, record: &ProxyRecord) -> bool {
        if let Some(active) = self.active {
            if record.active != active {
                return false;
            }
        }

        if !self.proxy_types.is_empty() {
            match record.proxy_type_enum() {
                Some(pt) if self.proxy_types.contains(&pt) => {}
                _ => return false,
            }
        }

        if let Some(min) = self.min_reputation {
            if record.reputation_score < min {
                return false;
            }
        }

        if let Some(ref country) = self.country_code {
            if record.country_code.as_deref() != Some(country.as_str()) {
                return false;
            }
        }

        true
    }
}

/// Backend-agnostic proxy persistence contract
#[async_trait]
pub trait ProxyStore: Send + Sync {
    /// Fetch a single record by id.
    async fn get(&self, id: i64) -> Result<Option<ProxyRecord>>;

    /// Fetch records matching the filter, ordered by ascending id.
    async fn query(&self, filter: &ProxyFilter) -> Result<Vec<ProxyRecord>>;

    /// Fetch every record, ordered by ascending id.
    async fn all(&self) -> Result<Vec<ProxyRecord>>;

    /// Insert a new record or update the transport fields of the existing one
    /// with the same `(host, port, provider)` identity. Accumulated quality
    /// metrics are never reset by an update.
    async fn upsert(&self, entry: &NewProxy) -> Result<UpsertOutcome>;

    /// Atomically read-modify-write a single record. Returns the record as
    /// stored after the mutation, or `ProxyNotFound`.
    async fn apply_update(&self, id: i64, mutate: Mutation<'_>) -> Result<ProxyRecord>;

    /// Permanently remove a record. Returns false when the id was unknown.
    async fn purge(&self, id: i64) -> Result<bool>;
}
