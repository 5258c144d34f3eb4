//! [`EnvelopeCryptor`]: the public face of the core.
//!
//! Composes the key lifecycle, the symmetric transform and the salted hasher
//! into text-in, text-out operations.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::crypto::{cipher, CipherError, SaltedHasher};
use crate::dek::{DekError, KeyLifecycleManager};

/// Errors produced by [`EnvelopeCryptor`].
#[derive(Debug, Error)]
pub enum CryptorError {
    /// Key acquisition or rotation failed, or a batch was too large.
    #[error(transparent)]
    Key(#[from] DekError),

    /// Sealing failed. Unreachable with key material that passed validation.
    #[error("encryption failed: {0}")]
    Encryption(#[source] CipherError),

    /// The envelope has the wrong shape or its padding did not validate.
    #[error("decryption failed: {0}")]
    Decryption(#[source] CipherError),

    /// The ciphertext text is not valid base64.
    #[error("decryption failed: ciphertext is not valid base64")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The decrypted bytes are not UTF-8.
    #[error("decryption failed: plaintext is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl CryptorError {
    /// `true` for errors caused by a bad ciphertext supplied by the caller.
    pub fn is_decryption(&self) -> bool {
        matches!(
            self,
            Self::Decryption(_) | Self::InvalidBase64(_) | Self::InvalidUtf8(_)
        )
    }
}

/// Result of sealing several values under one data key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBatch {
    /// Base64 envelopes, in input order.
    pub ciphertexts: Vec<String>,
    /// Context of the key every envelope in the batch was sealed under.
    pub decryption_context: String,
}

/// Encrypts, decrypts and hashes field values.
///
/// Cheap to clone; clones share the same key lifecycle and hasher.
#[derive(Debug, Clone)]
pub struct EnvelopeCryptor {
    keys: Arc<KeyLifecycleManager>,
    hasher: Arc<SaltedHasher>,
}

impl EnvelopeCryptor {
    pub fn new(keys: Arc<KeyLifecycleManager>, hasher: Arc<SaltedHasher>) -> Self {
        Self { keys, hasher }
    }

    pub fn keys(&self) -> &KeyLifecycleManager {
        &self.keys
    }

    pub fn hasher(&self) -> &SaltedHasher {
        &self.hasher
    }

    /// Encrypt UTF-8 text and return the base64 envelope.
    ///
    /// Consumes one use of the current data key, rotating first if it is
    /// exhausted. The empty string is encrypted like any other value.
    ///
    /// # Errors
    ///
    /// Returns [`CryptorError::Key`] if a due rotation fails.
    pub async fn encrypt_to_text(&self, plaintext: &str) -> Result<String, CryptorError> {
        self.encrypt_bytes(plaintext.as_bytes()).await
    }

    /// Encrypt arbitrary bytes and return the base64 envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CryptorError::Key`] if a due rotation fails.
    pub async fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<String, CryptorError> {
        let lease = self.keys.current_key_for_encryption().await?;
        seal_to_text(lease.key().as_bytes(), plaintext)
    }

    /// Encrypt every value in `plaintexts` under the same data key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptorError::Key`] if the batch is larger than the rotation
    /// period or a due rotation fails.
    pub async fn encrypt_batch(&self, plaintexts: &[&str]) -> Result<SealedBatch, CryptorError> {
        let lease = self
            .keys
            .reserve_for_encryption(plaintexts.len() as u64)
            .await?;
        let ciphertexts = plaintexts
            .iter()
            .map(|p| seal_to_text(lease.key().as_bytes(), p.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SealedBatch {
            ciphertexts,
            decryption_context: lease.into_decryption_context(),
        })
    }

    /// Decrypt a base64 envelope produced under the active data key.
    ///
    /// Envelopes sealed under a rotated-out key cannot be opened here; their
    /// data key has to be unwrapped from the decryption context out of band.
    ///
    /// # Errors
    ///
    /// Returns a decryption error (see [`CryptorError::is_decryption`]) for
    /// invalid base64, a malformed envelope, bad padding, or non-UTF-8 output.
    pub async fn decrypt_from_text(&self, ciphertext: &str) -> Result<String, CryptorError> {
        let bytes = self.decrypt_bytes(ciphertext).await?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Decrypt a base64 envelope to raw bytes.
    ///
    /// # Errors
    ///
    /// Same as [`EnvelopeCryptor::decrypt_from_text`], minus the UTF-8 check.
    pub async fn decrypt_bytes(&self, ciphertext: &str) -> Result<Vec<u8>, CryptorError> {
        let envelope = STANDARD.decode(ciphertext)?;
        let key = self.keys.current_key_for_decryption().await;
        cipher::open(key.as_bytes(), &envelope).map_err(CryptorError::Decryption)
    }

    /// Salted hex digest of `value`, or `None` when hashing is disabled.
    pub fn hash(&self, value: &str) -> Option<String> {
        self.hasher.hash(value.as_bytes())
    }

    /// Decryption context of the live data key.
    pub async fn decryption_context(&self) -> String {
        self.keys.decryption_context().await
    }
}

fn seal_to_text(key: &[u8], plaintext: &[u8]) -> Result<String, CryptorError> {
    let envelope = cipher::seal(key, plaintext).map_err(CryptorError::Encryption)?;
    Ok(STANDARD.encode(envelope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::HashAlgorithm;
    use crate::dek::testing::SequentialAuthority;
    use crate::dek::RotationPolicy;

    async fn cryptor(period: u64) -> EnvelopeCryptor {
        let keys = KeyLifecycleManager::initialize(
            Arc::new(SequentialAuthority::default()),
            "59d9d135-21ee-48d0-9322-d7243983f246",
            RotationPolicy::new(period).unwrap(),
        )
        .await
        .unwrap();
        EnvelopeCryptor::new(
            Arc::new(keys),
            Arc::new(SaltedHasher::new(HashAlgorithm::Sha256, "salt123")),
        )
    }

    #[tokio::test]
    async fn round_trip_text() {
        let c = cryptor(5).await;
        for value in ["1234567891", "Sum Ting Wong", "ünïcødé ✓", ""] {
            let ct = c.encrypt_to_text(value).await.unwrap();
            assert_eq!(c.decrypt_from_text(&ct).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn round_trip_long_value() {
        let c = cryptor(5).await;
        let value = "abascaakwjbawkdjabwkdjabwkdjbawkdjbawkjdbawkdjabwdkajwdbkawjbdakwjdbakwj\
                     dbawkjdbawkjdbawkdjabwkdajwbd___________awkdjabwddddddddddddddddddddddd\
                     dddddawdawd12301923102931029dj1092dj1029jd";
        let ct = c.encrypt_to_text(value).await.unwrap();
        assert_eq!(c.decrypt_from_text(&ct).await.unwrap(), value);
    }

    #[tokio::test]
    async fn round_trip_binary_with_nulls() {
        let c = cryptor(5).await;
        let value = [0u8, 1, 0, 2, 0, 0, 255];
        let ct = c.encrypt_bytes(&value).await.unwrap();
        assert_eq!(c.decrypt_bytes(&ct).await.unwrap(), value);
    }

    #[tokio::test]
    async fn same_plaintext_different_ciphertext() {
        let c = cryptor(5).await;
        let a = c.encrypt_to_text("1234567891").await.unwrap();
        let b = c.encrypt_to_text("1234567891").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn example_scenario() {
        let c = cryptor(5).await;
        assert_eq!(
            c.hash("1234567891").unwrap(),
            "405d29f0dcea8f1c01e45c8cb5d431ef8308697b115f9a1d061244c27b5fdc1a"
        );

        let initial = c.decryption_context().await;
        for _ in 0..5 {
            let ct = c.encrypt_to_text("1234567891").await.unwrap();
            assert_eq!(c.decrypt_from_text(&ct).await.unwrap(), "1234567891");
            assert_eq!(c.decryption_context().await, initial);
        }

        c.encrypt_to_text("1234567891").await.unwrap();
        assert_ne!(c.decryption_context().await, initial);
        assert!(c
            .decryption_context()
            .await
            .ends_with(":59d9d135-21ee-48d0-9322-d7243983f246"));
    }

    #[tokio::test]
    async fn hash_does_not_touch_key_lifecycle() {
        let c = cryptor(1).await;
        for _ in 0..10 {
            c.hash("x");
        }
        assert_eq!(c.keys().status().await.uses, 0);
    }

    #[tokio::test]
    async fn hash_of_empty_string_is_defined() {
        let c = cryptor(5).await;
        assert_eq!(c.hash("").unwrap().len(), 64);
    }

    #[tokio::test]
    async fn batch_shares_one_key_and_context() {
        let c = cryptor(4).await;
        c.encrypt_to_text("warm up").await.unwrap();
        c.encrypt_to_text("warm up").await.unwrap();
        let before = c.decryption_context().await;

        let batch = c.encrypt_batch(&["a", "b", "c"]).await.unwrap();
        assert_eq!(batch.ciphertexts.len(), 3);
        assert_ne!(batch.decryption_context, before);
        assert_eq!(batch.decryption_context, c.decryption_context().await);
        for (ct, expected) in batch.ciphertexts.iter().zip(["a", "b", "c"]) {
            assert_eq!(c.decrypt_from_text(ct).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn invalid_base64_is_a_decryption_error() {
        let c = cryptor(5).await;
        let err = c.decrypt_from_text("not base64!!").await.unwrap_err();
        assert!(err.is_decryption());
    }

    #[tokio::test]
    async fn malformed_envelope_is_a_decryption_error() {
        let c = cryptor(5).await;
        let short = STANDARD.encode([0u8; 20]);
        let err = c.decrypt_from_text(&short).await.unwrap_err();
        assert!(matches!(err, CryptorError::Decryption(CipherError::Truncated(20))));

        let ragged = STANDARD.encode([0u8; 40]);
        let err = c.decrypt_from_text(&ragged).await.unwrap_err();
        assert!(matches!(err, CryptorError::Decryption(CipherError::Malformed(24))));
    }

    #[tokio::test]
    async fn ciphertext_from_rotated_key_does_not_decrypt() {
        let c = cryptor(1).await;
        let ct = c.encrypt_to_text("1234567891").await.unwrap();
        c.encrypt_to_text("rotate").await.unwrap();
        match c.decrypt_from_text(&ct).await {
            Ok(pt) => assert_ne!(pt, "1234567891"),
            Err(e) => assert!(e.is_decryption()),
        }
    }

    #[tokio::test]
    async fn independent_instances_hash_identically() {
        let a = cryptor(5).await;
        let b = cryptor(5).await;
        assert_eq!(a.hash("Sum Ting Wong"), b.hash("Sum Ting Wong"));
    }
}
