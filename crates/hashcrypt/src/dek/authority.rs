//! The key authority seam: the external service that generates and wraps
//! data keys.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors reported by a [`KeyAuthority`] implementation.
#[derive(Debug, Error)]
pub enum KeyAuthorityError {
    /// Network, authorisation or invalid key id failure.
    #[error("key authority request failed: {0}")]
    Request(String),

    /// The authority answered but omitted a required part of the key.
    #[error("key authority response is missing {0}")]
    MissingField(&'static str),
}

/// A freshly generated data key.
pub struct GeneratedDataKey {
    /// Plaintext key bytes, zeroed when dropped.
    pub plaintext_key: Zeroizing<Vec<u8>>,
    /// The same key wrapped under the master key; opaque to this service.
    pub wrapped_key: Vec<u8>,
}

impl std::fmt::Debug for GeneratedDataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedDataKey")
            .field("plaintext_key", &"[REDACTED]")
            .field("wrapped_key_len", &self.wrapped_key.len())
            .finish()
    }
}

/// Source of data keys.
///
/// Implementations must be safe to call from many tasks; the lifecycle
/// manager serialises rotation so at most one request is in flight per
/// manager.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyAuthority: Send + Sync {
    /// Generate a new data key protected by the master key `key_id`.
    async fn generate_data_key(&self, key_id: &str)
        -> Result<GeneratedDataKey, KeyAuthorityError>;
}
