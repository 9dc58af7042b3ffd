//! PostgreSQL proxy store
//!
//! sqlx-backed implementation of [`ProxyStore`]. Identity deduplication is
//! enforced by a unique index on `(host, port, provider)`; per-record update
//! atomicity uses optimistic compare-and-set on the `version` column with
//! bounded retries.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, warn};

use crate::error::{PoolError, Result};
use crate::models::{NewProxy, ProxyRecord, UpsertOutcome};
use crate::store::{Mutation, ProxyFilter, ProxyStore};

const COLUMNS: &str = "id, host, port, provider, protocol, username, secret, \
                       country_code, proxy_type, reputation_score, success_rate, \
                       avg_response_time_ms, consecutive_failures, total_uses, \
                       active, last_error, last_used_at, last_health_check_at, \
                       created_at, updated_at, version";

/// Maximum CAS attempts for a single record update before surfacing
/// `UpdateContention`.
const MAX_UPDATE_ATTEMPTS: u32 = 5;

/// sqlx-backed implementation of [`ProxyStore`]
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database and run schema migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(|e| PoolError::DatabaseConnection(e.to_string()))?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply schema migrations (idempotent).
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS proxies (
                id BIGSERIAL PRIMARY KEY,
                host VARCHAR NOT NULL,
                port INTEGER NOT NULL,
                provider VARCHAR NOT NULL,
                protocol VARCHAR NOT NULL,
                username VARCHAR,
                secret TEXT,
                country_code VARCHAR,
                proxy_type VARCHAR NOT NULL DEFAULT 'datacenter',
                reputation_score INTEGER NOT NULL DEFAULT 50,
                success_rate DOUBLE PRECISION NOT NULL DEFAULT 0,
                avg_response_time_ms DOUBLE PRECISION,
                consecutive_failures INTEGER NOT NULL DEFAULT 0,
                total_uses BIGINT NOT NULL DEFAULT 0,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                last_error TEXT,
                last_used_at TIMESTAMPTZ,
                last_health_check_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                version BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_proxies_identity \
             ON proxies (host, port, provider)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_proxies_selection \
             ON proxies (active, proxy_type, reputation_score)",
        )
        .execute(&self.pool)
        .await?;

        info!("Proxy store migrations complete");
        Ok(())
    }
}

#[async_trait]
impl ProxyStore for PostgresStore {
    async fn get(&self, id: i64) -> Result<Option<ProxyRecord>> {
        let record = sqlx::query_as::<_, ProxyRecord>(&format!(
            "SELECT {COLUMNS} FROM proxies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn query(&self, filter: &ProxyFilter) -> Result<Vec<ProxyRecord>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COLUMNS} FROM proxies WHERE 1=1"
        ));

        if let Some(active) = filter.active {
            query.push(" AND active = ").push_bind(active);
        }
        if !filter.proxy_types.is_empty() {
            let types: Vec<String> = filter
                .proxy_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect();
            query.push(" AND proxy_type = ANY(").push_bind(types).push(")");
        }
        if let Some(min) = filter.min_reputation {
            query.push(" AND reputation_score >= ").push_bind(min);
        }
        if let Some(ref country) = filter.country_code {
            query.push(" AND country_code = ").push_bind(country.clone());
        }

        query.push(" ORDER BY id ASC");

        let records: Vec<ProxyRecord> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(records)
    }

    async fn all(&self) -> Result<Vec<ProxyRecord>> {
        let records = sqlx::query_as::<_, ProxyRecord>(&format!(
            "SELECT {COLUMNS} FROM proxies ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn upsert(&self, entry: &NewProxy) -> Result<UpsertOutcome> {
        // `xmax = 0` distinguishes a fresh insert from a conflict update.
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO proxies (host, port, provider, protocol, username, secret,
                                 country_code, proxy_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, 'datacenter'))
            ON CONFLICT (host, port, provider) DO UPDATE
            SET protocol = EXCLUDED.protocol,
                username = COALESCE(EXCLUDED.username, proxies.username),
                secret = COALESCE(EXCLUDED.secret, proxies.secret),
                country_code = COALESCE(EXCLUDED.country_code, proxies.country_code),
                proxy_type = COALESCE($8, proxies.proxy_type),
                updated_at = NOW(),
                version = proxies.version + 1
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&entry.host)
        .bind(entry.port)
        .bind(&entry.provider)
        .bind(entry.protocol.as_str())
        .bind(&entry.username)
        .bind(&entry.secret)
        .bind(&entry.country_code)
        .bind(entry.proxy_type.map(|t| t.as_str()))
        .fetch_one(&self.pool)
        .await?;

        if inserted {
            debug!(host = %entry.host, port = entry.port, provider = %entry.provider, "Inserted proxy");
            Ok(UpsertOutcome::Inserted)
        } else {
            debug!(host = %entry.host, port = entry.port, provider = %entry.provider, "Updated proxy");
            Ok(UpsertOutcome::Updated)
        }
    }

    async fn apply_update(&self, id: i64, mutate: Mutation<'_>) -> Result<ProxyRecord> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut record = self
                .get(id)
                .await?
                .ok_or(PoolError::ProxyNotFound { id })?;

            let expected_version = record.version;
            mutate(&mut record);
            record.updated_at = Utc::now();
            record.version = expected_version + 1;

            let result = sqlx::query(
                r#"
                UPDATE proxies
                SET protocol = $3, username = $4, secret = $5, country_code = $6,
                    proxy_type = $7, reputation_score = $8, success_rate = $9,
                    avg_response_time_ms = $10, consecutive_failures = $11,
                    total_uses = $12, active = $13, last_error = $14,
                    last_used_at = $15, last_health_check_at = $16,
                    updated_at = $17, version = $18
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(id)
            .bind(expected_version)
            .bind(&record.protocol)
            .bind(&record.username)
            .bind(&record.secret)
            .bind(&record.country_code)
            .bind(&record.proxy_type)
            .bind(record.reputation_score)
            .bind(record.success_rate)
            .bind(record.avg_response_time_ms)
            .bind(record.consecutive_failures)
            .bind(record.total_uses)
            .bind(record.active)
            .bind(&record.last_error)
            .bind(record.last_used_at)
            .bind(record.last_health_check_at)
            .bind(record.updated_at)
            .bind(record.version)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                return Ok(record);
            }

            // Lost the CAS race; back off briefly and retry against the
            // freshest state.
            warn!(id, attempt, "Update contention on proxy record, retrying");
            tokio::time::sleep(Duration::from_millis(10 * attempt as u64)).await;
        }

        Err(PoolError::UpdateContention {
            id,
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }

    async fn purge(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM proxies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected() > 0;
        if purged {
            info!(id, "Purged proxy");
        }

        Ok(purged)
    }
}
