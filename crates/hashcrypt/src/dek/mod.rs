//! Data key acquisition, rotation policy and lifecycle.
//!
//! # Lifecycle
//!
//! 1. At startup, [`KeyLifecycleManager::initialize`] asks the
//!    [`KeyAuthority`] for a fresh data key (plaintext + wrapped blob).
//! 2. Every encryption consumes one use of the current key. Once a key has
//!    been used `period` times, the next encryption first acquires a
//!    replacement and only then proceeds.
//! 3. Replaced keys are dropped and zeroed. Ciphertexts sealed under them can
//!    only be opened by unwrapping the blob recorded in their decryption
//!    context through the key authority.
//!
//! # Security invariants
//!
//! - The plaintext data key is **never** written to disk, logged, or included
//!   in traces.
//! - A key is never used more than `period` times. If rotation fails the
//!   exhausted key stays in place but encryption is refused until a later
//!   rotation succeeds.

pub mod authority;
pub mod lifecycle;
pub mod material;

pub use authority::{GeneratedDataKey, KeyAuthority, KeyAuthorityError};
#[cfg(test)]
pub use authority::MockKeyAuthority;
pub use lifecycle::{KeyLease, KeyLifecycleManager, KeyStatus};
pub use material::{DataKeyBytes, KeyMaterial, RotationPolicy};

use thiserror::Error;

use crate::crypto::KEY_LEN;

/// Errors produced by the data key layer.
#[derive(Debug, Error)]
pub enum DekError {
    /// The key authority could not be reached or refused the request.
    #[error("failed to acquire data key for {key_id}: {source}")]
    KeyAcquisition {
        /// Master key id the request was made for.
        key_id: String,
        #[source]
        source: KeyAuthorityError,
    },

    /// The key authority returned key material of the wrong size.
    #[error("data key has invalid length: expected {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),

    /// A rotation period of zero was requested.
    #[error("rotation period must be greater than zero")]
    InvalidPeriod,

    /// A single batch asked for more uses than one key may serve.
    #[error("batch of {requested} encryptions exceeds rotation period {period}")]
    BatchExceedsPeriod { requested: u64, period: u64 },
}
