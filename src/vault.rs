//! Credential vault seam
//!
//! Proxy secrets are persisted only as opaque encrypted blobs. The pool does
//! not assume any particular cryptographic primitive; it is handed an
//! implementation of [`CredentialVault`] at construction time.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{PoolError, Result};

/// Injected encryption capability for stored proxy credentials.
pub trait CredentialVault: Send + Sync {
    /// Encrypt a plaintext secret into an opaque blob.
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Decrypt a previously produced blob back into plaintext.
    fn decrypt(&self, blob: &str) -> Result<String>;
}

/// Base64 obfuscation vault for local development and tests.
///
/// Not encryption; production deployments inject a real vault.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevVault;

impl CredentialVault for DevVault {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(BASE64.encode(plaintext.as_bytes()))
    }

    fn decrypt(&self, blob: &str) -> Result<String> {
        let bytes = BASE64
            .decode(blob)
            .map_err(|e| PoolError::Internal(format!("vault: invalid blob: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| PoolError::Internal(format!("vault: invalid utf-8: {}", e)))
    }
}
