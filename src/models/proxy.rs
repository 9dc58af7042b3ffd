use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Proxy protocol type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Socks5,
    Socks4,
    Http,
}

impl ProxyProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Socks5 => "socks5",
            ProxyProtocol::Socks4 => "socks4",
            ProxyProtocol::Http => "http",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "socks5" => Some(ProxyProtocol::Socks5),
            "socks4" => Some(ProxyProtocol::Socks4),
            "http" => Some(ProxyProtocol::Http),
            _ => None,
        }
    }

    pub fn is_socks(&self) -> bool {
        matches!(self, ProxyProtocol::Socks4 | ProxyProtocol::Socks5)
    }
}

impl std::fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Proxy classification by origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    Residential,
    #[default]
    Datacenter,
    Mobile,
    Free,
}

impl ProxyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyType::Residential => "residential",
            ProxyType::Datacenter => "datacenter",
            ProxyType::Mobile => "mobile",
            ProxyType::Free => "free",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "residential" => Some(ProxyType::Residential),
            "datacenter" => Some(ProxyType::Datacenter),
            "mobile" => Some(ProxyType::Mobile),
            "free" => Some(ProxyType::Free),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProxyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Proxy pool record
///
/// Protocol and type are stored as lowercase strings (as persisted in the DB);
/// use the `_enum` accessors for typed access.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProxyRecord {
    pub id: i64,
    pub host: String,
    pub port: i32,
    pub provider: String,
    pub protocol: String,
    #[serde(skip_serializing)]
    pub username: Option<String>,
    /// Encrypted credential blob; never holds plaintext.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub country_code: Option<String>,
    pub proxy_type: String,
    pub reputation_score: i32,
    pub success_rate: f64,
    pub avg_response_time_ms: Option<f64>,
    pub consecutive_failures: i32,
    pub total_uses: i64,
    pub active: bool,
    #[serde(skip_serializing)]
    pub last_error: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_health_check_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped on every applied update.
    #[serde(skip_serializing)]
    pub version: i64,
}

impl ProxyRecord {
    /// Get the protocol enum
    pub fn protocol_enum(&self) -> Option<ProxyProtocol> {
        ProxyProtocol::from_str(&self.protocol)
    }

    /// Get the proxy type enum
    pub fn proxy_type_enum(&self) -> Option<ProxyType> {
        ProxyType::from_str(&self.proxy_type)
    }

    /// Proxy endpoint as host:port
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True once at least one outcome has been recorded.
    pub fn has_history(&self) -> bool {
        self.total_uses > 0
    }
}

/// Raw proxy listing entry as handed over by an ingestion adapter.
///
/// Only host, port, and protocol are mandatory; everything else is defaulted
/// at insertion time.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProxyEntry {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub country_code: Option<String>,
    pub proxy_type: Option<String>,
    pub username: Option<String>,
    /// Plaintext secret; encrypted by the pool before it reaches the store.
    pub secret: Option<String>,
}

/// Validated entry ready for storage; `secret` is already encrypted.
#[derive(Debug, Clone)]
pub struct NewProxy {
    pub host: String,
    pub port: i32,
    pub provider: String,
    pub protocol: ProxyProtocol,
    pub country_code: Option<String>,
    pub proxy_type: Option<ProxyType>,
    pub username: Option<String>,
    pub secret: Option<String>,
}

/// Outcome of a single upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Skipped,
}

/// Aggregate result of one ingestion batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl IngestReport {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Connection parameters handed to a consumer after selection.
///
/// The password is decrypted on demand and lives only in this handle.
#[derive(Debug, Clone)]
pub struct ProxyHandle {
    pub id: i64,
    pub host: String,
    pub port: u16,
    pub protocol: ProxyProtocol,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyHandle {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Aggregate pool statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolSnapshot {
    pub total: usize,
    pub active: usize,
    pub by_country: std::collections::HashMap<String, usize>,
    pub by_type: std::collections::HashMap<String, usize>,
    pub avg_success_rate: f64,
}
