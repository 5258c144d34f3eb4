//! Salted, deterministic digests used as searchable pseudonyms.

use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

/// Errors produced while configuring the hasher.
#[derive(Debug, Error)]
pub enum DigestError {
    /// The configured algorithm name is not recognised.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Digest algorithm applied to `salt || value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256, 64 hex characters.
    Sha256,
    /// SHA-512, 128 hex characters.
    Sha512,
    /// Hashing is switched off; [`SaltedHasher::hash`] always returns `None`.
    Disabled,
}

impl HashAlgorithm {
    /// Parse a configuration name: `SHA-256`, `SHA-512`, or the disable
    /// sentinels `drop` / `dropField`.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::UnsupportedAlgorithm`] for any other name.
    pub fn from_name(name: &str) -> Result<Self, DigestError> {
        match name {
            "SHA-256" => Ok(Self::Sha256),
            "SHA-512" => Ok(Self::Sha512),
            "drop" | "dropField" => Ok(Self::Disabled),
            other => Err(DigestError::UnsupportedAlgorithm(other.to_owned())),
        }
    }

    /// Length of the hex digest, or `None` when disabled.
    pub fn hex_len(self) -> Option<usize> {
        match self {
            Self::Sha256 => Some(64),
            Self::Sha512 => Some(128),
            Self::Disabled => None,
        }
    }
}

/// Immutable salted hasher.
///
/// Each call to [`SaltedHasher::hash`] builds a fresh digest state, so the
/// hasher is safe to share between threads and results never depend on call
/// order.
#[derive(Clone)]
pub struct SaltedHasher {
    algorithm: HashAlgorithm,
    salt: Vec<u8>,
}

impl SaltedHasher {
    /// Create a hasher for `algorithm` with the given `salt`.
    pub fn new(algorithm: HashAlgorithm, salt: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm,
            salt: salt.into(),
        }
    }

    /// The configured algorithm.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Lowercase hex of `digest(salt || value)`, or `None` when hashing is disabled.
    pub fn hash(&self, value: &[u8]) -> Option<String> {
        match self.algorithm {
            HashAlgorithm::Sha256 => Some(salted_hex::<Sha256>(&self.salt, value)),
            HashAlgorithm::Sha512 => Some(salted_hex::<Sha512>(&self.salt, value)),
            HashAlgorithm::Disabled => None,
        }
    }
}

impl std::fmt::Debug for SaltedHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaltedHasher")
            .field("algorithm", &self.algorithm)
            .field("salt", &"[REDACTED]")
            .finish()
    }
}

fn salted_hex<D: Digest>(salt: &[u8], value: &[u8]) -> String {
    let mut hasher = D::new();
    hasher.update(salt);
    hasher.update(value);
    hex::encode(hasher.finalize())
}
