use thiserror::Error;

/// Unified error type for the Warden pool manager
#[derive(Error, Debug)]
pub enum PoolError {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database connection failed: {0}")]
    DatabaseConnection(String),

    // Selection errors
    #[error("No proxy available after exhausting all relaxation steps")]
    NoProxyAvailable,

    #[error("Proxy not found: {id}")]
    ProxyNotFound { id: i64 },

    // Ingestion errors
    #[error("Invalid proxy entry: {0}")]
    InvalidEntry(String),

    #[error("Unsupported proxy protocol: {0}")]
    UnsupportedProtocol(String),

    // Credential errors
    #[error("Failed to decrypt credentials for proxy {id}")]
    CredentialDecrypt { id: i64 },

    #[error("Failed to encrypt credentials: {0}")]
    CredentialEncrypt(String),

    // Store errors
    #[error("Update contention on proxy {id} after {attempts} attempts")]
    UpdateContention { id: i64, attempts: u32 },

    // Probe errors
    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Operation timed out")]
    Timeout,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Warden operations
pub type Result<T> = std::result::Result<T, PoolError>;

impl PoolError {
    /// True for errors that only affect a single outcome report or probe,
    /// never the pool as a whole.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PoolError::UpdateContention { .. } | PoolError::ProbeFailed(_) | PoolError::Timeout
        )
    }

    /// True when the failed operation referenced a record that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PoolError::ProxyNotFound { .. })
    }
}
