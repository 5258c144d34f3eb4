//! Live key material and the rotation policy.

use std::num::NonZeroU64;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::DekError;
use crate::crypto::KEY_LEN;

/// Fixed-size buffer holding exactly [`KEY_LEN`] plaintext key bytes.
///
/// Cloned into call stacks for the duration of one operation. The memory is
/// overwritten with zeroes when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKeyBytes([u8; KEY_LEN]);

impl DataKeyBytes {
    /// Copy `bytes` into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DekError::InvalidLength`] if `bytes` is not [`KEY_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DekError> {
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| DekError::InvalidLength(bytes.len()))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for DataKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("DataKeyBytes([REDACTED])")
    }
}

/// One generation of key material: the plaintext data key, its wrapped form
/// and the id of the master key that wrapped it.
#[derive(Debug)]
pub struct KeyMaterial {
    key: DataKeyBytes,
    wrapped_key: Vec<u8>,
    key_id: String,
}

impl KeyMaterial {
    /// # Errors
    ///
    /// Returns [`DekError::InvalidLength`] if `plaintext_key` does not match
    /// the cipher key size.
    pub fn new(
        plaintext_key: &[u8],
        wrapped_key: Vec<u8>,
        key_id: impl Into<String>,
    ) -> Result<Self, DekError> {
        Ok(Self {
            key: DataKeyBytes::from_slice(plaintext_key)?,
            wrapped_key,
            key_id: key_id.into(),
        })
    }

    pub fn key(&self) -> &DataKeyBytes {
        &self.key
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// `base64(wrapped_key) + ":" + key_id`.
    ///
    /// Enough for an authorised party to unwrap the data key through the key
    /// authority and open ciphertexts produced under it.
    pub fn decryption_context(&self) -> String {
        format!("{}:{}", STANDARD.encode(&self.wrapped_key), self.key_id)
    }
}

/// Maximum number of encryptions served by one data key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    period: NonZeroU64,
}

impl RotationPolicy {
    /// # Errors
    ///
    /// Returns [`DekError::InvalidPeriod`] when `period` is zero.
    pub fn new(period: u64) -> Result<Self, DekError> {
        NonZeroU64::new(period)
            .map(|period| Self { period })
            .ok_or(DekError::InvalidPeriod)
    }

    pub fn period(&self) -> u64 {
        self.period.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_key_length() {
        assert!(matches!(
            KeyMaterial::new(&[0u8; 32], vec![1], "k"),
            Err(DekError::InvalidLength(32))
        ));
    }

    #[test]
    fn decryption_context_format() {
        let m = KeyMaterial::new(&[0x42u8; KEY_LEN], b"blob".to_vec(), "alias/pii").unwrap();
        assert_eq!(m.decryption_context(), "YmxvYg==:alias/pii");
        assert_eq!(m.key_id(), "alias/pii");
    }

    #[test]
    fn data_key_redacted_in_debug() {
        let key = DataKeyBytes::from_slice(&[0xFFu8; KEY_LEN]).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("255"));
    }

    #[test]
    fn zero_period_rejected() {
        assert!(matches!(RotationPolicy::new(0), Err(DekError::InvalidPeriod)));
        assert_eq!(RotationPolicy::new(5).unwrap().period(), 5);
    }
}
