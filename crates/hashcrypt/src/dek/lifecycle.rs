//! [`KeyLifecycleManager`]: owns the live data key and enforces the rotation
//! budget.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{DataKeyBytes, DekError, KeyAuthority, KeyMaterial, RotationPolicy};

/// Key material handed out for a reserved number of encryptions.
///
/// The decryption context is captured together with the key, so it always
/// names the key these encryptions actually used.
#[derive(Debug)]
pub struct KeyLease {
    key: DataKeyBytes,
    decryption_context: String,
}

impl KeyLease {
    pub fn key(&self) -> &DataKeyBytes {
        &self.key
    }

    pub fn decryption_context(&self) -> &str {
        &self.decryption_context
    }

    pub fn into_decryption_context(self) -> String {
        self.decryption_context
    }
}

/// Point-in-time view of the manager, safe to expose in health output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStatus {
    pub key_id: String,
    pub uses: u64,
    pub period: u64,
    pub rotations: u64,
    pub last_rotation_failed: bool,
}

/// Key material and its use counter, always replaced together.
struct KeyState {
    material: KeyMaterial,
    uses: u64,
    rotations: u64,
    last_rotation_failed: bool,
}

impl KeyState {
    fn fresh(material: KeyMaterial) -> Self {
        Self {
            material,
            uses: 0,
            rotations: 0,
            last_rotation_failed: false,
        }
    }

    fn lease(&self) -> KeyLease {
        KeyLease {
            key: self.material.key().clone(),
            decryption_context: self.material.decryption_context(),
        }
    }
}

/// Guarantees that no data key serves more than `period` encryptions.
///
/// All state sits behind one async mutex. "Check counter, maybe rotate, read
/// key, consume uses" runs as a single critical section, and the key
/// authority round trip happens inside it, so concurrent callers can neither
/// overshoot the budget nor trigger duplicate rotations.
pub struct KeyLifecycleManager {
    authority: Arc<dyn KeyAuthority>,
    key_id: String,
    policy: RotationPolicy,
    state: Mutex<KeyState>,
}

impl KeyLifecycleManager {
    /// Acquire the first data key for `key_id` and start with a zero counter.
    ///
    /// # Errors
    ///
    /// Returns [`DekError::KeyAcquisition`] if the key authority fails, and
    /// [`DekError::InvalidLength`] if it returns a key of the wrong size.
    pub async fn initialize(
        authority: Arc<dyn KeyAuthority>,
        key_id: impl Into<String>,
        policy: RotationPolicy,
    ) -> Result<Self, DekError> {
        let key_id = key_id.into();
        let material = acquire(authority.as_ref(), &key_id).await?;
        info!(key_id = %key_id, period = policy.period(), "initial data key acquired");
        Ok(Self {
            authority,
            key_id,
            policy,
            state: Mutex::new(KeyState::fresh(material)),
        })
    }

    /// Build a manager around a fixed key and the nil key id.
    ///
    /// **Test only.** The key never rotates to anything else: every
    /// "rotation" hands back the same bytes.
    #[cfg(test)]
    pub fn with_fixed_key(key: [u8; crate::crypto::KEY_LEN], policy: RotationPolicy) -> Self {
        use async_trait::async_trait;
        use zeroize::Zeroizing;

        use super::{GeneratedDataKey, KeyAuthorityError};

        const NIL_KEY_ID: &str = "00000000-0000-0000-0000-000000000000";

        struct FixedKey([u8; crate::crypto::KEY_LEN]);

        #[async_trait]
        impl KeyAuthority for FixedKey {
            async fn generate_data_key(
                &self,
                _key_id: &str,
            ) -> Result<GeneratedDataKey, KeyAuthorityError> {
                Ok(GeneratedDataKey {
                    plaintext_key: Zeroizing::new(self.0.to_vec()),
                    wrapped_key: self.0.to_vec(),
                })
            }
        }

        let material = KeyMaterial::new(&key, key.to_vec(), NIL_KEY_ID)
            .unwrap_or_else(|_| unreachable!("fixed key has the cipher key size"));
        Self {
            authority: Arc::new(FixedKey(key)),
            key_id: NIL_KEY_ID.to_owned(),
            policy,
            state: Mutex::new(KeyState::fresh(material)),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    /// Return the key for exactly one encryption, rotating first if the
    /// current key has already served `period` encryptions.
    ///
    /// Callers must perform exactly one encryption with the returned key.
    ///
    /// # Errors
    ///
    /// Returns [`DekError::KeyAcquisition`] if a due rotation fails. The
    /// previous key and counter are kept, so a later call retries.
    pub async fn current_key_for_encryption(&self) -> Result<KeyLease, DekError> {
        self.reserve_for_encryption(1).await
    }

    /// Reserve `uses` encryptions under a single key.
    ///
    /// Rotates first when the current key cannot serve the whole batch. A
    /// batch of zero returns the current key without consuming anything.
    ///
    /// # Errors
    ///
    /// Returns [`DekError::BatchExceedsPeriod`] if `uses` is larger than the
    /// rotation period, or [`DekError::KeyAcquisition`] if a due rotation
    /// fails.
    pub async fn reserve_for_encryption(&self, uses: u64) -> Result<KeyLease, DekError> {
        let period = self.policy.period();
        if uses > period {
            return Err(DekError::BatchExceedsPeriod {
                requested: uses,
                period,
            });
        }

        let mut state = self.state.lock().await;
        if state.uses + uses > period {
            self.rotate_locked(&mut state).await?;
        }
        state.uses += uses;
        Ok(state.lease())
    }

    /// Return the current key without touching the counter. Decryption never
    /// drives rotation.
    pub async fn current_key_for_decryption(&self) -> DataKeyBytes {
        self.state.lock().await.material.key().clone()
    }

    /// Decryption context of the live key material.
    pub async fn decryption_context(&self) -> String {
        self.state.lock().await.material.decryption_context()
    }

    /// Replace the current key immediately, regardless of its counter.
    ///
    /// Returns the new decryption context.
    ///
    /// # Errors
    ///
    /// Returns [`DekError::KeyAcquisition`] if the key authority fails; the
    /// previous key stays in place.
    pub async fn rotate(&self) -> Result<String, DekError> {
        let mut state = self.state.lock().await;
        self.rotate_locked(&mut state).await?;
        Ok(state.material.decryption_context())
    }

    pub async fn status(&self) -> KeyStatus {
        let state = self.state.lock().await;
        KeyStatus {
            key_id: self.key_id.clone(),
            uses: state.uses,
            period: self.policy.period(),
            rotations: state.rotations,
            last_rotation_failed: state.last_rotation_failed,
        }
    }

    async fn rotate_locked(&self, state: &mut KeyState) -> Result<(), DekError> {
        match acquire(self.authority.as_ref(), &self.key_id).await {
            Ok(material) => {
                state.material = material;
                state.uses = 0;
                state.rotations += 1;
                state.last_rotation_failed = false;
                info!(key_id = %self.key_id, rotations = state.rotations, "data key rotated");
                Ok(())
            }
            Err(e) => {
                state.last_rotation_failed = true;
                warn!(key_id = %self.key_id, error = %e, "data key rotation failed; keeping previous key");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for KeyLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLifecycleManager")
            .field("key_id", &self.key_id)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

async fn acquire(authority: &dyn KeyAuthority, key_id: &str) -> Result<KeyMaterial, DekError> {
    let generated = authority
        .generate_data_key(key_id)
        .await
        .map_err(|source| DekError::KeyAcquisition {
            key_id: key_id.to_owned(),
            source,
        })?;
    KeyMaterial::new(&generated.plaintext_key, generated.wrapped_key, key_id)
}
